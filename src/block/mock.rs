//! 测试用内存设备

use super::BlockDevice;
use crate::error::{Error, ErrorKind, Result};
use alloc::vec::Vec;

/// 内存块设备，可注入读写失败
pub(crate) struct MockDevice {
    block_size: u32,
    sector_size: u32,
    total_blocks: u64,
    storage: Vec<u8>,
    writes_left: Option<u64>,
    reads_left: Option<u64>,
}

impl MockDevice {
    pub(crate) fn new(total_blocks: u64, block_size: u32) -> Self {
        let storage = alloc::vec![0u8; (total_blocks * block_size as u64) as usize];
        Self {
            block_size,
            sector_size: 512,
            total_blocks,
            storage,
            writes_left: None,
            reads_left: None,
        }
    }

    /// 再成功写 `n` 次之后所有写入都失败
    pub(crate) fn fail_writes_after(&mut self, n: u64) {
        self.writes_left = Some(n);
    }

    /// 再成功读 `n` 次之后所有读取都失败
    pub(crate) fn fail_reads_after(&mut self, n: u64) {
        self.reads_left = Some(n);
    }

    pub(crate) fn block(&self, blk: u64) -> &[u8] {
        let bs = self.block_size as usize;
        let start = blk as usize * bs;
        &self.storage[start..start + bs]
    }

    pub(crate) fn block_mut(&mut self, blk: u64) -> &mut [u8] {
        let bs = self.block_size as usize;
        let start = blk as usize * bs;
        &mut self.storage[start..start + bs]
    }
}

fn take_budget(budget: &mut Option<u64>) -> bool {
    match budget {
        None => true,
        Some(0) => false,
        Some(n) => {
            *n -= 1;
            true
        }
    }
}

impl BlockDevice for MockDevice {
    fn block_size(&self) -> u32 {
        self.block_size
    }

    fn sector_size(&self) -> u32 {
        self.sector_size
    }

    fn total_blocks(&self) -> u64 {
        self.total_blocks
    }

    fn read_blocks(&mut self, lba: u64, count: u32, buf: &mut [u8]) -> Result<usize> {
        if !take_budget(&mut self.reads_left) {
            return Err(Error::new(ErrorKind::Io, "injected read failure"));
        }
        let start = (lba * self.sector_size as u64) as usize;
        let len = (count * self.sector_size) as usize;
        buf[..len].copy_from_slice(&self.storage[start..start + len]);
        Ok(len)
    }

    fn write_blocks(&mut self, lba: u64, count: u32, buf: &[u8]) -> Result<usize> {
        if !take_budget(&mut self.writes_left) {
            return Err(Error::new(ErrorKind::Io, "injected write failure"));
        }
        let start = (lba * self.sector_size as u64) as usize;
        let len = (count * self.sector_size) as usize;
        self.storage[start..start + len].copy_from_slice(&buf[..len]);
        Ok(len)
    }
}
