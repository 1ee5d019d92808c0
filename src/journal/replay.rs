//! 日志重放
//!
//! 事务按从旧到新、条目按日志顺序重放：较新的事务可能覆盖较旧事务写过的
//! 同一个 original 块，顺序颠倒会悄悄写坏数据。
//!
//! 重放过程中的失败不回滚已写出的块。wandered 块的复制是幂等的，
//! 日志尾保持重放前的位置，之后可以从头再重放一次。

use super::{
    walk::{LogWalk, Transaction},
    Journal, JournalError,
};
use crate::{
    block::{BlockDev, BlockDevice},
    error::Result,
    superblock::{OidAllocator, SuperblockAccess},
};
use alloc::vec;
use log::*;

/// 重放进度，每复制一个块回调一次
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReplayProgress {
    /// 当前事务 ID
    pub tx_id: u64,
    /// 当前事务头地址
    pub tx_addr: u64,
    /// 复制来源
    pub wandered: u64,
    /// 复制目标
    pub original: u64,
    /// 到目前为止复制的块数
    pub blocks: u64,
}

/// 重放结果
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ReplayReport {
    /// 重放的事务数
    pub transactions: u64,
    /// 复制的块数
    pub blocks: u64,
}

impl Journal {
    /// 重放全部待重放事务
    ///
    /// 完成后日志头/尾已写回，`last_flushed` 等于最后一个重放事务的地址，
    /// 最终的计数快照已推送到超级块和对象 ID 分配器。日志为空时不做任何写入。
    pub fn replay<D, S, O>(
        &mut self,
        bdev: &mut BlockDev<D>,
        sb: &mut S,
        oids: &mut O,
    ) -> Result<ReplayReport>
    where
        D: BlockDevice,
        S: SuperblockAccess,
        O: OidAllocator,
    {
        self.replay_with(bdev, sb, oids, |_| {})
    }

    /// 带进度回调的重放
    ///
    /// 回调只用于显示，不能中止重放。
    pub fn replay_with<D, S, O, F>(
        &mut self,
        bdev: &mut BlockDev<D>,
        sb: &mut S,
        oids: &mut O,
        mut progress: F,
    ) -> Result<ReplayReport>
    where
        D: BlockDevice,
        S: SuperblockAccess,
        O: OidAllocator,
        F: FnMut(&ReplayProgress),
    {
        if self.is_empty() {
            return Ok(ReplayReport::default());
        }

        let list = self.pending(bdev)?;
        let saved_footer = self.footer;
        let saved_dirty = self.dirty;

        let mut report = ReplayReport::default();
        for tx in &list {
            if let Err(e) = self.replay_tx(bdev, tx, &mut report, &mut progress) {
                error!("[journal] replay of tx {} at block {} failed: {}", tx.header.id, tx.addr, e);
                self.footer = saved_footer;
                self.dirty = saved_dirty;
                return Err(e);
            }

            self.footer.last_flushed = tx.addr;
            self.footer.snapshot = tx.header.snapshot;
            self.dirty = true;
            report.transactions += 1;
        }

        if let Err(e) = self.sync(bdev).and_then(|_| bdev.sync()) {
            self.footer = saved_footer;
            self.dirty = saved_dirty;
            return Err(e);
        }

        let snap = self.footer.snapshot;
        sb.set_free_blocks(snap.free_blocks);
        sb.set_used_oids(snap.used_oids);
        sb.set_next_oid(snap.next_oid);
        oids.set_next(snap.next_oid);
        oids.set_used(snap.used_oids);

        info!(
            "[journal] replayed {} transactions, {} blocks",
            report.transactions, report.blocks
        );
        Ok(report)
    }

    fn replay_tx<D, F>(
        &self,
        bdev: &mut BlockDev<D>,
        tx: &Transaction,
        report: &mut ReplayReport,
        progress: &mut F,
    ) -> Result<()>
    where
        D: BlockDevice,
        F: FnMut(&ReplayProgress),
    {
        let len = bdev.device_length();
        let mut buf = vec![0u8; bdev.block_size() as usize];
        let mut logs = LogWalk::new(tx);

        while let Some((_, lgr)) = logs.advance(bdev)? {
            for entry in &lgr.entries {
                for blk in [entry.wandered, entry.original] {
                    if blk == 0 || blk >= len {
                        return Err(JournalError::OutOfRange(blk).into());
                    }
                }

                bdev.read_block(entry.wandered, &mut buf)?;
                bdev.write_block(entry.original, &buf)?;
                report.blocks += 1;

                debug!(
                    "[journal] tx {}: block {} -> {}",
                    tx.header.id, entry.wandered, entry.original
                );
                progress(&ReplayProgress {
                    tx_id: tx.header.id,
                    tx_addr: tx.addr,
                    wandered: entry.wandered,
                    original: entry.original,
                    blocks: report.blocks,
                });
            }
        }
        Ok(())
    }

    /// 激活路径：重放后使日志失效并写回
    ///
    /// 重放失败时返回错误，调用方必须拒绝继续挂载。
    pub fn recover<D, S, O>(
        &mut self,
        bdev: &mut BlockDev<D>,
        sb: &mut S,
        oids: &mut O,
    ) -> Result<ReplayReport>
    where
        D: BlockDevice,
        S: SuperblockAccess,
        O: OidAllocator,
    {
        let report = self.replay(bdev, sb, oids)?;
        if self.header.last_committed != 0 || self.footer.last_flushed != 0 {
            self.invalidate();
        }
        self.sync(bdev)?;
        Ok(report)
    }
}
