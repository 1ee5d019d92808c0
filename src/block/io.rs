//! 块 I/O 操作实现

use super::{BlockDev, BlockDevice};
use crate::error::{Error, ErrorKind, Result};

impl<D: BlockDevice> BlockDev<D> {
    /// 读取单个逻辑块
    ///
    /// # 参数
    ///
    /// * `lba` - 逻辑块地址
    /// * `buf` - 目标缓冲区（大小至少为 block_size）
    pub fn read_block(&mut self, lba: u64, buf: &mut [u8]) -> Result<usize> {
        self.read_blocks(lba, 1, buf)
    }

    /// 写入单个逻辑块
    ///
    /// # 参数
    ///
    /// * `lba` - 逻辑块地址
    /// * `buf` - 源数据缓冲区（大小至少为 block_size）
    pub fn write_block(&mut self, lba: u64, buf: &[u8]) -> Result<usize> {
        self.write_blocks(lba, 1, buf)
    }

    /// 读取连续多个逻辑块
    ///
    /// 设备返回的字节数不足时按 I/O 错误处理，错误带上起始块地址。
    pub fn read_blocks(&mut self, lba: u64, count: u32, buf: &mut [u8]) -> Result<usize> {
        let block_size = self.block_size() as usize;
        let required = count as usize * block_size;

        if buf.len() < required {
            return Err(Error::new(
                ErrorKind::InvalidInput,
                "Buffer too small for requested blocks",
            ));
        }
        self.check_range(lba, count)?;

        let pba = self.to_sector(lba);
        let sectors = count * self.sectors_per_block();

        self.stats_mut().reads += count as u64;
        let n = self
            .device_mut()
            .read_blocks(pba, sectors, &mut buf[..required])
            .map_err(|e| e.with_block(lba))?;

        if n < required {
            return Err(Error::at(ErrorKind::Io, "Short read from device", lba));
        }
        Ok(required)
    }

    /// 写入连续多个逻辑块
    pub fn write_blocks(&mut self, lba: u64, count: u32, buf: &[u8]) -> Result<usize> {
        let block_size = self.block_size() as usize;
        let required = count as usize * block_size;

        if buf.len() < required {
            return Err(Error::new(
                ErrorKind::InvalidInput,
                "Buffer too small for requested blocks",
            ));
        }
        if self.device().is_read_only() {
            return Err(Error::at(ErrorKind::Unsupported, "Device is read-only", lba));
        }
        self.check_range(lba, count)?;

        let pba = self.to_sector(lba);
        let sectors = count * self.sectors_per_block();

        self.stats_mut().writes += count as u64;
        let n = self
            .device_mut()
            .write_blocks(pba, sectors, &buf[..required])
            .map_err(|e| e.with_block(lba))?;

        if n < required {
            return Err(Error::at(ErrorKind::Io, "Short write to device", lba));
        }
        Ok(required)
    }

    /// 同步设备
    ///
    /// 所有写入都是同步直写的，这里只需要让设备刷新它自己的写缓存。
    pub fn sync(&mut self) -> Result<()> {
        self.device_mut().flush()
    }
}
