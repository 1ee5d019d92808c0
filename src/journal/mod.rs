//! wandered 日志
//!
//! 日志只观察已经提交的、不可变的事务；写事务的一方不在本模块内。
//!
//! # 磁盘结构
//!
//! ```text
//!  jheader.last_committed ─┐          jfooter.last_flushed ─┐
//!                          ▼                                ▼
//!                       ┌─────┐  prev_tx  ┌─────┐  prev_tx  ┌─────┐
//!                       │ TxH │ ────────► │ TxH │ ────────► │ TxH │
//!                       └──┬──┘           └─────┘           └─────┘
//!                 next_log │  ▲
//!                          ▼  │ next_log (回到 TxH 结束)
//!                       ┌─────┐ ──► ┌─────┐
//!                       │ LGR │     │ LGR │  { original ← wandered } ...
//!                       └─────┘     └─────┘
//! ```
//!
//! # 状态
//!
//! - **empty**：`last_committed == last_flushed`
//! - **pending**：至少一个事务未重放
//!
//! 重放按从旧到新的顺序把每个 wandered 块复制到它的 original 位置，
//! 每完成一个事务就把日志尾推进到该事务。
//!
//! # 子模块
//!
//! - [`format`] - 磁盘格式编解码
//! - [`walk`] - 事务链/日志记录链游标
//! - [`check`] - 结构检查与截断修复
//! - [`pack`] - 导出/导入
//! - [`print`] - 文本转储

pub mod check;
pub mod format;
pub mod pack;
pub mod print;
pub mod replay;
pub mod walk;

mod wandered;

use crate::error::{Error, ErrorKind, Result};
use core::fmt;

pub use check::{BadTransaction, JournalCheck};
pub use format::{JournalFooter, JournalHeader, LogRecord, Snapshot, TxHeader, WanderEntry};
pub use replay::{ReplayProgress, ReplayReport};
pub use walk::{LogWalk, Transaction, TxLayout, TxWalk};
pub use wandered::{Journal, JournalLayout, JournalState};

/// 日志结构错误
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JournalError {
    /// 块的魔数不对
    BadMagic(u64),
    /// 指针指向设备范围之外（或块 0）
    OutOfRange(u64),
    /// 指针链成环
    Cycle(u64),
    /// 导出流格式错误
    BadStream,
}

impl fmt::Display for JournalError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            JournalError::BadMagic(blk) => write!(f, "bad magic in block {}", blk),
            JournalError::OutOfRange(blk) => write!(f, "block {} out of range", blk),
            JournalError::Cycle(blk) => write!(f, "chain loops at block {}", blk),
            JournalError::BadStream => write!(f, "bad pack stream"),
        }
    }
}

/// 日志实现类别
///
/// 目前只有 wandered 日志一种。
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u16)]
pub enum JournalKind {
    /// wandered 日志
    Wandered = 0,
}

impl JournalKind {
    /// 按磁盘上记录的 ID 查找
    pub fn from_id(id: u16) -> Result<Self> {
        match id {
            0 => Ok(JournalKind::Wandered),
            _ => Err(Error::new(ErrorKind::Unsupported, "Unknown journal kind")),
        }
    }

    /// 磁盘 ID
    pub fn id(self) -> u16 {
        self as u16
    }
}

#[cfg(test)]
pub(crate) mod testutil {
    //! 在内存设备上手工构造事务

    use super::format::*;
    use crate::block::{BlockDev, MockDevice};
    use alloc::vec;

    /// 写一个事务：事务头在 `txh`，日志记录依次链接，最后一个指回事务头
    pub(crate) fn write_tx(
        bdev: &mut BlockDev<MockDevice>,
        txh: u64,
        prev: u64,
        id: u64,
        logs: &[(u64, &[(u64, u64)])],
    ) {
        write_tx_with(bdev, txh, prev, id, logs, Snapshot::default());
    }

    pub(crate) fn write_tx_with(
        bdev: &mut BlockDev<MockDevice>,
        txh: u64,
        prev: u64,
        id: u64,
        logs: &[(u64, &[(u64, u64)])],
        snapshot: Snapshot,
    ) {
        let bs = bdev.block_size() as usize;
        let mut buf = vec![0u8; bs];

        let header = TxHeader {
            id,
            total: logs.len() as u32 + 1,
            prev_tx: prev,
            next_log: logs.first().map_or(txh, |l| l.0),
            snapshot,
        };
        header.encode(&mut buf);
        bdev.write_block(txh, &buf).unwrap();

        for (i, (blk, entries)) in logs.iter().enumerate() {
            let lgr = LogRecord {
                id,
                total: logs.len() as u32,
                serial: i as u32,
                next_log: logs.get(i + 1).map_or(txh, |l| l.0),
                entries: entries
                    .iter()
                    .map(|&(original, wandered)| WanderEntry { original, wandered })
                    .collect(),
            };
            lgr.encode(&mut buf);
            bdev.write_block(*blk, &buf).unwrap();
        }
    }

    /// 改写某个日志记录的 `next_log`
    pub(crate) fn set_log_next(bdev: &mut BlockDev<MockDevice>, blk: u64, next: u64) {
        let mut buf = vec![0u8; bdev.block_size() as usize];
        bdev.read_block(blk, &mut buf).unwrap();
        let mut lgr = LogRecord::decode(&buf, blk).unwrap();
        lgr.next_log = next;
        lgr.encode(&mut buf);
        bdev.write_block(blk, &buf).unwrap();
    }

    /// 用 `byte` 填满一个块
    pub(crate) fn fill_block(bdev: &mut BlockDev<MockDevice>, blk: u64, byte: u8) {
        let buf = vec![byte; bdev.block_size() as usize];
        bdev.write_block(blk, &buf).unwrap();
    }

    /// 直接设置磁盘上的日志头/尾指针
    pub(crate) fn set_pointers(
        bdev: &mut BlockDev<MockDevice>,
        area: crate::layout::JournalArea,
        last_committed: u64,
        last_flushed: u64,
    ) {
        let mut buf = vec![0u8; bdev.block_size() as usize];
        JournalHeader { last_committed }.encode(&mut buf);
        bdev.write_block(area.header, &buf).unwrap();
        JournalFooter {
            last_flushed,
            snapshot: Snapshot::default(),
        }
        .encode(&mut buf);
        bdev.write_block(area.footer, &buf).unwrap();
    }
}
