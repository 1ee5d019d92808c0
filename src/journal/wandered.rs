//! 日志句柄
//!
//! 持有日志头/尾的内存副本。修改只发生在内存里并标记为脏，
//! `sync` 才写回磁盘；`close` 不会隐式刷写。

use super::{
    format::{JournalFooter, JournalHeader},
    walk::{self, Transaction},
};
use crate::{
    block::{BlockDev, BlockDevice},
    error::{Error, ErrorKind, Result},
    layout::{self, BlockKind, JournalArea},
};
use alloc::{vec, vec::Vec};
use log::*;

/// 日志状态
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JournalState {
    /// 没有待重放的事务
    Empty,
    /// 至少有一个事务待重放
    Pending,
}

/// wandered 日志
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Journal {
    pub(super) area: JournalArea,
    pub(super) block_size: u32,
    pub(super) header: JournalHeader,
    pub(super) footer: JournalFooter,
    pub(super) dirty: bool,
}

impl Journal {
    /// 从设备读取日志头和日志尾
    pub fn open<D: BlockDevice>(bdev: &mut BlockDev<D>, area: JournalArea) -> Result<Self> {
        let block_size = bdev.block_size();
        layout::check_block_size(block_size)?;
        let mut buf = vec![0u8; block_size as usize];

        bdev.read_block(area.header, &mut buf)?;
        let header = JournalHeader::decode(&buf);
        bdev.read_block(area.footer, &mut buf)?;
        let footer = JournalFooter::decode(&buf);

        info!(
            "[journal] opened: last committed {}, last flushed {}",
            header.last_committed, footer.last_flushed
        );

        Ok(Self {
            area,
            block_size,
            header,
            footer,
            dirty: false,
        })
    }

    /// 创建一个空日志，需要 `sync` 才会落盘
    pub fn create(area: JournalArea, block_size: u32) -> Self {
        Self {
            area,
            block_size,
            header: JournalHeader::default(),
            footer: JournalFooter::default(),
            dirty: true,
        }
    }

    /// 日志头
    pub fn header(&self) -> &JournalHeader {
        &self.header
    }

    /// 日志尾
    pub fn footer(&self) -> &JournalFooter {
        &self.footer
    }

    /// 日志头/尾所在位置
    pub fn area(&self) -> JournalArea {
        self.area
    }

    /// 块大小
    pub fn block_size(&self) -> u32 {
        self.block_size
    }

    /// 内存中的头/尾是否尚未写回
    pub fn is_dirty(&self) -> bool {
        self.dirty
    }

    /// 当前状态
    pub fn state(&self) -> JournalState {
        if self.header.last_committed == self.footer.last_flushed {
            JournalState::Empty
        } else {
            JournalState::Pending
        }
    }

    /// 是否没有待重放的事务
    pub fn is_empty(&self) -> bool {
        self.state() == JournalState::Empty
    }

    /// 待重放事务，按从旧到新排列
    pub fn pending<D: BlockDevice>(&self, bdev: &mut BlockDev<D>) -> Result<Vec<Transaction>> {
        walk::pending(bdev, self.header.last_committed, self.footer.last_flushed)
    }

    /// 从最新事务开始的事务链游标
    pub fn transactions(&self) -> walk::TxWalk {
        walk::TxWalk::new(self.header.last_committed, self.footer.last_flushed)
    }

    /// 把日志头和日志尾指针都清零
    ///
    /// 之后任何崩溃都不会再把旧事务当成待重放事务。
    pub fn invalidate(&mut self) {
        self.header.last_committed = 0;
        self.footer.last_flushed = 0;
        self.dirty = true;
        info!("[journal] invalidated");
    }

    /// 写回日志头和日志尾
    ///
    /// 不脏时不做任何写入。两块都写成功后才清除脏标记。
    pub fn sync<D: BlockDevice>(&mut self, bdev: &mut BlockDev<D>) -> Result<()> {
        if !self.dirty {
            return Ok(());
        }
        layout::check_block_size(self.block_size)?;
        if bdev.block_size() != self.block_size {
            return Err(Error::new(
                ErrorKind::InvalidInput,
                "Journal block size differs from device",
            ));
        }

        let mut buf = vec![0u8; self.block_size as usize];
        self.header.encode(&mut buf);
        bdev.write_block(self.area.header, &buf)?;
        self.footer.encode(&mut buf);
        bdev.write_block(self.area.footer, &buf)?;

        self.dirty = false;
        debug!(
            "[journal] synced: last committed {}, last flushed {}",
            self.header.last_committed, self.footer.last_flushed
        );
        Ok(())
    }

    /// 释放句柄，不刷写
    pub fn close(self) {
        if self.dirty {
            warn!("[journal] closed with unsynced header/footer");
        }
    }

    /// 日志头/尾布局
    pub fn layout(&self) -> JournalLayout {
        JournalLayout {
            area: self.area,
            next: 0,
        }
    }

    /// 待重放事务占用的块（事务头、日志记录、wandered 块）
    pub fn tx_layout(&self) -> walk::TxLayout {
        walk::TxLayout::new(self.header.last_committed, self.footer.last_flushed)
    }
}

/// 日志固定块布局游标，可 `clone` 后重新遍历
#[derive(Debug, Clone)]
pub struct JournalLayout {
    area: JournalArea,
    next: u8,
}

impl Iterator for JournalLayout {
    type Item = (u64, BlockKind);

    fn next(&mut self) -> Option<Self::Item> {
        let item = match self.next {
            0 => (self.area.header, BlockKind::JournalHeader),
            1 => (self.area.footer, BlockKind::JournalFooter),
            _ => return None,
        };
        self.next += 1;
        Some(item)
    }
}
