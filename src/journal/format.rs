//! 日志磁盘格式
//!
//! 所有多字节字段均为小端序。每个结构都提供显式的 `decode`/`encode`，
//! 直接在字节切片上读写，不依赖内存布局。
//!
//! ```text
//! 日志头   [u64 last_committed]
//! 日志尾   [u64 last_flushed][u64 free_blocks][u64 used_oids][u64 next_oid]
//! 事务头   [8 magic][u64 id][u32 total][u32 pad][u64 prev_tx][u64 next_log]
//!          [u64 free_blocks][u64 used_oids][u64 next_oid]
//! 日志记录 [8 magic][u64 id][u32 total][u32 serial][u64 next_log]
//!          { [u64 original][u64 wandered] } ...
//! ```

use super::JournalError;
use crate::consts::*;
use alloc::vec::Vec;
use byteorder::{ByteOrder, LittleEndian};

/// 超级块计数快照
///
/// 事务提交时记录，重放完成后才推送到真正的超级块和对象 ID 分配器。
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Snapshot {
    /// 空闲块数
    pub free_blocks: u64,
    /// 已用对象 ID 数
    pub used_oids: u64,
    /// 下一个对象 ID
    pub next_oid: u64,
}

impl Snapshot {
    fn decode(buf: &[u8]) -> Self {
        Self {
            free_blocks: LittleEndian::read_u64(&buf[0..8]),
            used_oids: LittleEndian::read_u64(&buf[8..16]),
            next_oid: LittleEndian::read_u64(&buf[16..24]),
        }
    }

    fn encode(&self, buf: &mut [u8]) {
        LittleEndian::write_u64(&mut buf[0..8], self.free_blocks);
        LittleEndian::write_u64(&mut buf[8..16], self.used_oids);
        LittleEndian::write_u64(&mut buf[16..24], self.next_oid);
    }
}

/// 日志头：最后一个已提交事务的事务头地址，0 表示从未提交
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct JournalHeader {
    /// 最后提交的事务头地址
    pub last_committed: u64,
}

impl JournalHeader {
    /// 解码
    pub fn decode(buf: &[u8]) -> Self {
        Self {
            last_committed: LittleEndian::read_u64(&buf[0..8]),
        }
    }

    /// 编码到整块缓冲区，其余字节清零
    pub fn encode(&self, buf: &mut [u8]) {
        buf.fill(0);
        LittleEndian::write_u64(&mut buf[0..8], self.last_committed);
    }
}

/// 日志尾：最后一个已重放事务及其计数快照
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct JournalFooter {
    /// 最后重放的事务头地址
    pub last_flushed: u64,
    /// 计数快照
    pub snapshot: Snapshot,
}

impl JournalFooter {
    /// 解码
    pub fn decode(buf: &[u8]) -> Self {
        Self {
            last_flushed: LittleEndian::read_u64(&buf[0..8]),
            snapshot: Snapshot::decode(&buf[8..JOURNAL_FOOTER_SIZE]),
        }
    }

    /// 编码到整块缓冲区，其余字节清零
    pub fn encode(&self, buf: &mut [u8]) {
        buf.fill(0);
        LittleEndian::write_u64(&mut buf[0..8], self.last_flushed);
        self.snapshot.encode(&mut buf[8..JOURNAL_FOOTER_SIZE]);
    }
}

/// 事务头
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TxHeader {
    /// 事务 ID
    pub id: u64,
    /// 事务占用的总块数
    pub total: u32,
    /// 前一个事务的事务头地址
    pub prev_tx: u64,
    /// 第一个日志记录的地址
    pub next_log: u64,
    /// 计数快照
    pub snapshot: Snapshot,
}

impl TxHeader {
    /// 解码，`blk` 仅用于错误定位
    pub fn decode(buf: &[u8], blk: u64) -> Result<Self, JournalError> {
        if &buf[0..8] != TXH_MAGIC {
            return Err(JournalError::BadMagic(blk));
        }
        Ok(Self {
            id: LittleEndian::read_u64(&buf[8..16]),
            total: LittleEndian::read_u32(&buf[16..20]),
            prev_tx: LittleEndian::read_u64(&buf[24..32]),
            next_log: LittleEndian::read_u64(&buf[32..40]),
            snapshot: Snapshot::decode(&buf[40..TXH_SIZE]),
        })
    }

    /// 编码到整块缓冲区
    pub fn encode(&self, buf: &mut [u8]) {
        buf.fill(0);
        buf[0..8].copy_from_slice(TXH_MAGIC);
        LittleEndian::write_u64(&mut buf[8..16], self.id);
        LittleEndian::write_u32(&mut buf[16..20], self.total);
        LittleEndian::write_u64(&mut buf[24..32], self.prev_tx);
        LittleEndian::write_u64(&mut buf[32..40], self.next_log);
        self.snapshot.encode(&mut buf[40..TXH_SIZE]);
    }
}

/// wander 条目：`wandered` 是临时位置，`original` 是最终位置
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WanderEntry {
    /// 最终位置
    pub original: u64,
    /// 临时位置
    pub wandered: u64,
}

/// 日志记录
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LogRecord {
    /// 所属事务 ID
    pub id: u64,
    /// 事务中日志记录总数
    pub total: u32,
    /// 本记录序号
    pub serial: u32,
    /// 下一个日志记录地址，指回事务头（或自身）表示链结束
    pub next_log: u64,
    /// wander 条目
    pub entries: Vec<WanderEntry>,
}

impl LogRecord {
    /// 一个块能容纳的 wander 条目数，块比记录头还小时为 0
    pub fn capacity(block_size: usize) -> usize {
        block_size.saturating_sub(LGR_HEADER_SIZE) / WANDER_ENTRY_SIZE
    }

    /// 解码
    ///
    /// 条目读到 wandered 为 0 的空槽或块容量上限为止。
    pub fn decode(buf: &[u8], blk: u64) -> Result<Self, JournalError> {
        if &buf[0..8] != LGR_MAGIC {
            return Err(JournalError::BadMagic(blk));
        }

        let mut entries = Vec::new();
        for slot in 0..Self::capacity(buf.len()) {
            let off = LGR_HEADER_SIZE + slot * WANDER_ENTRY_SIZE;
            let original = LittleEndian::read_u64(&buf[off..off + 8]);
            let wandered = LittleEndian::read_u64(&buf[off + 8..off + 16]);
            if wandered == 0 {
                break;
            }
            entries.push(WanderEntry { original, wandered });
        }

        Ok(Self {
            id: LittleEndian::read_u64(&buf[8..16]),
            total: LittleEndian::read_u32(&buf[16..20]),
            serial: LittleEndian::read_u32(&buf[20..24]),
            next_log: LittleEndian::read_u64(&buf[24..32]),
            entries,
        })
    }

    /// 编码到整块缓冲区
    ///
    /// 条目数超过块容量时多余部分被截断。
    pub fn encode(&self, buf: &mut [u8]) {
        buf.fill(0);
        buf[0..8].copy_from_slice(LGR_MAGIC);
        LittleEndian::write_u64(&mut buf[8..16], self.id);
        LittleEndian::write_u32(&mut buf[16..20], self.total);
        LittleEndian::write_u32(&mut buf[20..24], self.serial);
        LittleEndian::write_u64(&mut buf[24..32], self.next_log);

        let cap = Self::capacity(buf.len());
        for (slot, e) in self.entries.iter().take(cap).enumerate() {
            let off = LGR_HEADER_SIZE + slot * WANDER_ENTRY_SIZE;
            LittleEndian::write_u64(&mut buf[off..off + 8], e.original);
            LittleEndian::write_u64(&mut buf[off + 8..off + 16], e.wandered);
        }
    }
}
