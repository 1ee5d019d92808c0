//! 日志结构检查
//!
//! 维护三张位图：整个日志占用的块、当前事务引用的 original 块，
//! 以及更早的待重放事务会覆盖的 original 块。后者不允许再被较新事务的
//! 事务头、日志记录或 wandered 块使用，否则重放旧事务时会先把它们覆盖掉。
//! 发现第一个有问题的事务后，把提交点截断到它之前的那个事务：
//! 宁可丢弃较新的可疑事务，也不丢弃较旧的正常事务。

use super::{
    walk::{LogWalk, Transaction, TxWalk},
    Journal,
};
use crate::{
    bitmap::Bitmap,
    block::{BlockDev, BlockDevice},
    check::{CheckMode, RepairFlags},
    error::{Error, ErrorKind, Result},
};
use alloc::vec::Vec;
use log::*;

/// 第一个有问题的事务
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BadTransaction {
    /// 事务头地址
    pub addr: u64,
    /// 事务 ID，事务头本身无法解析时为 `None`
    pub id: Option<u64>,
    /// 出问题的块
    pub block: u64,
    /// 原因
    pub reason: &'static str,
}

/// 检查结果
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct JournalCheck {
    /// 检查结论
    pub flags: RepairFlags,
    /// 通过检查的待重放事务数
    pub valid: u64,
    /// 第一个有问题的事务
    pub bad: Option<BadTransaction>,
    /// 截断后的提交点（事务头地址）
    pub commit_point: u64,
}

/// 单个违规：`(出问题的块, 原因)`
type Violation = (u64, &'static str);

struct Checker<'a> {
    fixed: &'a Bitmap,
    len: u64,
    /// 日志自身占用的块（事务头、日志记录、wandered）
    claimed: Bitmap,
    /// 当前事务引用的 original
    originals: Bitmap,
    /// 之前已通过检查的事务引用的 original
    overwritten: Bitmap,
}

impl<'a> Checker<'a> {
    fn new(fixed: &'a Bitmap, len: u64) -> Result<Self> {
        Ok(Self {
            fixed,
            len,
            claimed: Bitmap::new(len)?,
            originals: Bitmap::new(len)?,
            overwritten: Bitmap::new(len)?,
        })
    }

    fn in_range(&self, blk: u64) -> bool {
        blk != 0 && blk < self.len
    }

    /// 认领一个日志结构块
    fn claim(&mut self, blk: u64, what: &'static str) -> core::result::Result<(), Violation> {
        if !self.in_range(blk) {
            return Err((blk, what));
        }
        if self.fixed.test(blk) {
            return Err((blk, "Journal block overlaps fixed metadata"));
        }
        if self.claimed.test(blk) {
            return Err((blk, "Journal block referenced twice"));
        }
        if self.overwritten.test(blk) {
            return Err((blk, "Journal block overwritten by earlier transaction"));
        }
        self.claimed.mark(blk).map_err(|_| (blk, what))
    }

    /// 检查一个事务；I/O 错误通过外层 `Result` 返回
    fn tx<D: BlockDevice>(
        &mut self,
        bdev: &mut BlockDev<D>,
        tx: &Transaction,
    ) -> Result<core::result::Result<(), Violation>> {
        if let Err(v) = self.claim(tx.addr, "Transaction header out of range") {
            return Ok(Err(v));
        }

        let mut seen = Vec::new();
        let verdict = self.logs(bdev, tx, &mut seen);
        for &blk in &seen {
            self.originals.clear(blk)?;
        }

        let verdict = match verdict? {
            Ok(()) => seen
                .iter()
                .find(|&&blk| self.claimed.test(blk))
                .map_or(Ok(()), |&blk| Err((blk, "Original block overlaps journal block"))),
            v => v,
        };
        if verdict.is_ok() {
            for &blk in &seen {
                self.overwritten.mark(blk)?;
            }
        }
        Ok(verdict)
    }

    fn logs<D: BlockDevice>(
        &mut self,
        bdev: &mut BlockDev<D>,
        tx: &Transaction,
        seen: &mut Vec<u64>,
    ) -> Result<core::result::Result<(), Violation>> {
        let mut walk = LogWalk::new(tx);
        loop {
            let (blk, lgr) = match walk.advance(bdev) {
                Ok(Some(item)) => item,
                Ok(None) => return Ok(Ok(())),
                Err(e) => return structural(e),
            };
            if let Err(v) = self.claim(blk, "Log record out of range") {
                return Ok(Err(v));
            }

            for entry in &lgr.entries {
                if let Err(v) = self.claim(entry.wandered, "Wandered block out of range") {
                    return Ok(Err(v));
                }
                let original = entry.original;
                if !self.in_range(original) {
                    return Ok(Err((original, "Original block out of range")));
                }
                if self.originals.test(original) {
                    return Ok(Err((original, "Original block repeats in transaction")));
                }
                self.originals.mark(original)?;
                seen.push(original);
            }
        }
    }
}

/// 结构错误变成违规，I/O 等其他错误照常返回
fn structural<T>(e: Error) -> Result<core::result::Result<T, Violation>> {
    match (e.kind(), e.block()) {
        (ErrorKind::Corrupted, Some(blk)) => Ok(Err((blk, e.message()))),
        _ => Err(e),
    }
}

impl Journal {
    /// 检查日志结构
    ///
    /// `fixed` 标记了日志块不可占用的固定元数据（见
    /// [`crate::layout::fixed_metadata`]）。发现问题时，`Check` 模式报告
    /// `FIXABLE`；修复模式把 `last_committed` 截断到最后一个完好的事务并标记为脏。
    /// 设备 I/O 错误照常返回。
    pub fn check_struct<D: BlockDevice>(
        &mut self,
        bdev: &mut BlockDev<D>,
        fixed: &Bitmap,
        mode: CheckMode,
    ) -> Result<JournalCheck> {
        let mut res = JournalCheck {
            flags: RepairFlags::empty(),
            valid: 0,
            bad: None,
            commit_point: self.header.last_committed,
        };
        if self.is_empty() {
            return Ok(res);
        }

        let mut checker = Checker::new(fixed, bdev.device_length())?;

        // 先把事务链整体走一遍，链本身坏了就没有可信的事务
        let mut walk = TxWalk::new(self.header.last_committed, self.footer.last_flushed);
        let mut list = Vec::new();
        let mut bad = loop {
            match walk.advance(bdev) {
                Ok(Some(tx)) => list.push(tx),
                Ok(None) => break None,
                Err(e) => match structural::<()>(e)? {
                    Err((blk, reason)) => {
                        break Some(BadTransaction { addr: blk, id: None, block: blk, reason })
                    }
                    Ok(()) => break None,
                },
            }
        };
        list.reverse();

        let mut good = 0;
        if bad.is_none() {
            for tx in &list {
                if let Err((blk, reason)) = checker.tx(bdev, tx)? {
                    bad = Some(BadTransaction {
                        addr: tx.addr,
                        id: Some(tx.header.id),
                        block: blk,
                        reason,
                    });
                    break;
                }
                good += 1;
            }
        }

        res.valid = good as u64;
        let Some(b) = bad else {
            return Ok(res);
        };

        res.bad = Some(b);
        res.commit_point = match good {
            0 => self.footer.last_flushed,
            n => list[n - 1].addr,
        };
        error!(
            "[journal] tx {:?} at block {}: {} (block {})",
            b.id, b.addr, b.reason, b.block
        );

        if mode.repairs() {
            warn!(
                "[journal] last committed truncated from {} to {}",
                self.header.last_committed, res.commit_point
            );
            self.header.last_committed = res.commit_point;
            self.dirty = true;
            res.flags |= RepairFlags::FIXED;
        } else {
            res.flags |= RepairFlags::FIXABLE;
        }
        Ok(res)
    }

    /// 只检查不修复，有问题时返回定位到出错块的结构错误
    pub fn validate<D: BlockDevice>(&mut self, bdev: &mut BlockDev<D>, fixed: &Bitmap) -> Result<()> {
        let res = self.check_struct(bdev, fixed, CheckMode::Check)?;
        match res.bad {
            Some(b) => Err(Error::corrupted(b.reason, b.block)),
            None => Ok(()),
        }
    }
}
