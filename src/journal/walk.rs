//! 日志遍历游标
//!
//! 两级遍历：[`TxWalk`] 沿事务头的 `prev_tx` 从最新事务向回走到
//! `last_flushed`；[`LogWalk`] 沿某个事务的日志记录链走回事务头。
//!
//! 游标不持有设备引用，每一步由调用方传入 `&mut BlockDev`，
//! 因此重放可以在两步之间读写 wandered/original 块。`clone` 一份游标即可从
//! 当前位置重新开始遍历。
//!
//! [`TxLayout`] 把两级遍历摊平成日志占用块的序列，供导出等需要逐块处理的地方使用。

use super::{
    format::{LogRecord, TxHeader},
    JournalError,
};
use crate::{
    block::{BlockDev, BlockDevice},
    error::Result,
    layout::BlockKind,
};
use alloc::{collections::BTreeSet, vec, vec::Vec};
use log::*;

/// 待重放事务
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Transaction {
    /// 事务头地址
    pub addr: u64,
    /// 事务头内容
    pub header: TxHeader,
}

/// 读取一个日志结构块，先做范围检查
///
/// 块 0 永远不是合法的日志块，指向它等同于指针越界。
pub(super) fn read_journal_block<D: BlockDevice>(
    bdev: &mut BlockDev<D>,
    blk: u64,
) -> Result<Vec<u8>> {
    if blk == 0 || blk >= bdev.device_length() {
        return Err(JournalError::OutOfRange(blk).into());
    }
    let mut buf = vec![0u8; bdev.block_size() as usize];
    bdev.read_block(blk, &mut buf)?;
    Ok(buf)
}

/// 事务链游标，按从新到旧的顺序给出事务
#[derive(Debug, Clone)]
pub struct TxWalk {
    next: u64,
    stop: u64,
    seen: BTreeSet<u64>,
    done: bool,
}

impl TxWalk {
    /// 从 `last_committed` 走到 `last_flushed`（不含）
    pub fn new(last_committed: u64, last_flushed: u64) -> Self {
        Self {
            next: last_committed,
            stop: last_flushed,
            seen: BTreeSet::new(),
            done: false,
        }
    }

    /// 前进一步
    ///
    /// 链结束返回 `Ok(None)`。出错后游标停止，之后总是返回 `Ok(None)`。
    pub fn advance<D: BlockDevice>(&mut self, bdev: &mut BlockDev<D>) -> Result<Option<Transaction>> {
        if self.done || self.next == self.stop {
            self.done = true;
            return Ok(None);
        }

        let res = self.step(bdev);
        if !matches!(res, Ok(Some(_))) {
            self.done = true;
        }
        res
    }

    fn step<D: BlockDevice>(&mut self, bdev: &mut BlockDev<D>) -> Result<Option<Transaction>> {
        let blk = self.next;
        if !self.seen.insert(blk) {
            error!("[journal] transaction chain loops at block {}", blk);
            return Err(JournalError::Cycle(blk).into());
        }

        let buf = read_journal_block(bdev, blk)?;
        let header = TxHeader::decode(&buf, blk).map_err(|e| {
            error!("[journal] block {} is not a transaction header", blk);
            e
        })?;
        debug!("[journal] tx {} at block {}, prev {}", header.id, blk, header.prev_tx);

        self.next = header.prev_tx;
        Ok(Some(Transaction { addr: blk, header }))
    }
}

/// 日志记录链游标
///
/// 从事务头的 `next_log` 出发，遇到指回事务头的指针或自指的记录时结束。
#[derive(Debug, Clone)]
pub struct LogWalk {
    txh: u64,
    id: u64,
    next: u64,
    seen: BTreeSet<u64>,
    done: bool,
}

impl LogWalk {
    /// 遍历事务 `tx` 的日志记录
    pub fn new(tx: &Transaction) -> Self {
        Self {
            txh: tx.addr,
            id: tx.header.id,
            next: tx.header.next_log,
            seen: BTreeSet::new(),
            done: false,
        }
    }

    /// 前进一步，返回 `(记录地址, 记录)`
    pub fn advance<D: BlockDevice>(
        &mut self,
        bdev: &mut BlockDev<D>,
    ) -> Result<Option<(u64, LogRecord)>> {
        if self.done || self.next == self.txh {
            self.done = true;
            return Ok(None);
        }

        let blk = self.next;
        if !self.seen.insert(blk) {
            self.done = true;
            error!("[journal] tx {}: log chain loops at block {}", self.id, blk);
            return Err(JournalError::Cycle(blk).into());
        }

        let lgr = match read_journal_block(bdev, blk)
            .and_then(|buf| LogRecord::decode(&buf, blk).map_err(Into::into))
        {
            Ok(lgr) => lgr,
            Err(e) => {
                self.done = true;
                error!("[journal] tx {}: bad log record at block {}", self.id, blk);
                return Err(e);
            }
        };

        // 自指的记录是链上最后一个
        if lgr.next_log == blk {
            self.done = true;
        }
        self.next = lgr.next_log;
        Ok(Some((blk, lgr)))
    }
}

/// 事务块布局游标
///
/// 从最新事务开始，依次给出每个事务的事务头、日志记录以及该记录里的
/// wandered 块。出错后停止。
#[derive(Debug, Clone)]
pub struct TxLayout {
    txs: TxWalk,
    logs: Option<LogWalk>,
    /// 当前日志记录中尚未给出的 wandered 块（逆序存放）
    wandered: Vec<u64>,
    done: bool,
}

impl TxLayout {
    /// 遍历 `last_committed` 到 `last_flushed`（不含）之间的事务块
    pub fn new(last_committed: u64, last_flushed: u64) -> Self {
        Self {
            txs: TxWalk::new(last_committed, last_flushed),
            logs: None,
            wandered: Vec::new(),
            done: false,
        }
    }

    /// 前进一步，返回 `(块地址, 类别)`
    pub fn advance<D: BlockDevice>(
        &mut self,
        bdev: &mut BlockDev<D>,
    ) -> Result<Option<(u64, BlockKind)>> {
        if self.done {
            return Ok(None);
        }
        let res = self.step(bdev);
        if !matches!(res, Ok(Some(_))) {
            self.done = true;
        }
        res
    }

    fn step<D: BlockDevice>(&mut self, bdev: &mut BlockDev<D>) -> Result<Option<(u64, BlockKind)>> {
        if let Some(blk) = self.wandered.pop() {
            return Ok(Some((blk, BlockKind::Wandered)));
        }

        if let Some(logs) = self.logs.as_mut() {
            if let Some((blk, lgr)) = logs.advance(bdev)? {
                self.wandered = lgr.entries.iter().rev().map(|e| e.wandered).collect();
                return Ok(Some((blk, BlockKind::LogRecord)));
            }
            self.logs = None;
        }

        Ok(self.txs.advance(bdev)?.map(|tx| {
            self.logs = Some(LogWalk::new(&tx));
            (tx.addr, BlockKind::TxHeader)
        }))
    }
}

/// 收集 `last_committed` 与 `last_flushed` 之间的全部事务，按从旧到新排列
pub fn pending<D: BlockDevice>(
    bdev: &mut BlockDev<D>,
    last_committed: u64,
    last_flushed: u64,
) -> Result<Vec<Transaction>> {
    let mut walk = TxWalk::new(last_committed, last_flushed);
    let mut list = Vec::new();
    while let Some(tx) = walk.advance(bdev)? {
        list.push(tx);
    }
    list.reverse();
    Ok(list)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        block::MockDevice,
        error::ErrorKind,
        journal::{format::WanderEntry, testutil::*},
    };

    #[test]
    fn test_pending_oldest_first() {
        let mut bdev = BlockDev::new(MockDevice::new(400, 512)).unwrap();
        write_tx(&mut bdev, 300, 0, 1, &[(301, &[(10, 50)])]);
        write_tx(&mut bdev, 310, 300, 2, &[(311, &[(11, 51)])]);
        write_tx(&mut bdev, 320, 310, 3, &[(321, &[(12, 52)])]);

        let list = pending(&mut bdev, 320, 0).unwrap();
        let ids: Vec<u64> = list.iter().map(|t| t.header.id).collect();
        assert_eq!(ids, [1, 2, 3]);

        // 已重放到 310 时只剩最新一个
        let list = pending(&mut bdev, 320, 310).unwrap();
        assert_eq!(list.len(), 1);
        assert_eq!(list[0].addr, 320);

        assert!(pending(&mut bdev, 320, 320).unwrap().is_empty());
    }

    #[test]
    fn test_bad_magic_stops_walk() {
        let mut bdev = BlockDev::new(MockDevice::new(400, 512)).unwrap();
        write_tx(&mut bdev, 310, 300, 2, &[(311, &[(11, 51)])]);

        let mut walk = TxWalk::new(310, 0);
        assert!(walk.advance(&mut bdev).unwrap().is_some());
        let err = walk.advance(&mut bdev).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Corrupted);
        assert_eq!(err.block(), Some(300));
        assert!(walk.advance(&mut bdev).unwrap().is_none());
    }

    #[test]
    fn test_tx_chain_cycle() {
        let mut bdev = BlockDev::new(MockDevice::new(400, 512)).unwrap();
        write_tx(&mut bdev, 300, 310, 1, &[(301, &[(10, 50)])]);
        write_tx(&mut bdev, 310, 300, 2, &[(311, &[(11, 51)])]);

        let err = pending(&mut bdev, 310, 0).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Corrupted);
        assert_eq!(err.block(), Some(310));
    }

    #[test]
    fn test_prev_beyond_device() {
        let mut bdev = BlockDev::new(MockDevice::new(400, 512)).unwrap();
        write_tx(&mut bdev, 300, 9999, 1, &[(301, &[(10, 50)])]);
        let err = pending(&mut bdev, 300, 0).unwrap_err();
        assert_eq!(err.block(), Some(9999));
    }

    #[test]
    fn test_log_chain() {
        let mut bdev = BlockDev::new(MockDevice::new(400, 512)).unwrap();
        write_tx(
            &mut bdev,
            300,
            0,
            1,
            &[(301, &[(10, 50), (11, 51)]), (302, &[(12, 52)])],
        );

        let tx = pending(&mut bdev, 300, 0).unwrap()[0];
        let mut walk = LogWalk::new(&tx);
        let restart = walk.clone();

        let mut entries = Vec::new();
        while let Some((_, lgr)) = walk.advance(&mut bdev).unwrap() {
            entries.extend(lgr.entries);
        }
        assert_eq!(
            entries,
            [
                WanderEntry { original: 10, wandered: 50 },
                WanderEntry { original: 11, wandered: 51 },
                WanderEntry { original: 12, wandered: 52 },
            ]
        );

        let mut walk = restart;
        assert_eq!(walk.advance(&mut bdev).unwrap().unwrap().0, 301);
    }

    #[test]
    fn test_self_linked_log_record_ends_chain() {
        let mut bdev = BlockDev::new(MockDevice::new(400, 512)).unwrap();
        write_tx(&mut bdev, 300, 0, 1, &[(301, &[(10, 50)])]);
        set_log_next(&mut bdev, 301, 301);

        let tx = pending(&mut bdev, 300, 0).unwrap()[0];
        let mut walk = LogWalk::new(&tx);
        assert!(walk.advance(&mut bdev).unwrap().is_some());
        assert!(walk.advance(&mut bdev).unwrap().is_none());
    }

    #[test]
    fn test_tx_layout() {
        let mut bdev = BlockDev::new(MockDevice::new(400, 512)).unwrap();
        write_tx(&mut bdev, 300, 0, 1, &[(301, &[(10, 50)])]);
        write_tx(
            &mut bdev,
            310,
            300,
            2,
            &[(311, &[(11, 51), (12, 52)]), (312, &[(13, 53)])],
        );

        let mut layout = TxLayout::new(310, 0);
        let mut blocks = Vec::new();
        while let Some(item) = layout.advance(&mut bdev).unwrap() {
            blocks.push(item);
        }
        assert_eq!(
            blocks,
            [
                (310, BlockKind::TxHeader),
                (311, BlockKind::LogRecord),
                (51, BlockKind::Wandered),
                (52, BlockKind::Wandered),
                (312, BlockKind::LogRecord),
                (53, BlockKind::Wandered),
                (300, BlockKind::TxHeader),
                (301, BlockKind::LogRecord),
                (50, BlockKind::Wandered),
            ]
        );
    }

    #[test]
    fn test_tx_layout_stops_on_error() {
        let mut bdev = BlockDev::new(MockDevice::new(400, 512)).unwrap();
        write_tx(&mut bdev, 300, 0, 1, &[(301, &[(10, 50)])]);
        fill_block(&mut bdev, 301, 0);

        let mut layout = TxLayout::new(300, 0);
        assert_eq!(
            layout.advance(&mut bdev).unwrap(),
            Some((300, BlockKind::TxHeader))
        );
        assert_eq!(layout.advance(&mut bdev).unwrap_err().block(), Some(301));
        assert!(layout.advance(&mut bdev).unwrap().is_none());
    }

    #[test]
    fn test_log_chain_cycle() {
        let mut bdev = BlockDev::new(MockDevice::new(400, 512)).unwrap();
        write_tx(&mut bdev, 300, 0, 1, &[(301, &[(10, 50)]), (302, &[(11, 51)])]);
        set_log_next(&mut bdev, 302, 301);

        let tx = pending(&mut bdev, 300, 0).unwrap()[0];
        let mut walk = LogWalk::new(&tx);
        walk.advance(&mut bdev).unwrap();
        walk.advance(&mut bdev).unwrap();
        let err = walk.advance(&mut bdev).unwrap_err();
        assert_eq!(err.block(), Some(301));
    }
}
