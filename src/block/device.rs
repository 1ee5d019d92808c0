//! 块设备接口与按块寻址的包装器

use crate::error::{Error, ErrorKind, Result};

/// 底层设备接口
///
/// 设备按扇区寻址；分配器和日志只通过 [`BlockDev`] 按文件系统块访问它。
/// 读写都是同步的，返回时数据已经交给设备。
///
/// ```rust,ignore
/// impl BlockDevice for RamDisk {
///     fn block_size(&self) -> u32 { 4096 }
///     fn sector_size(&self) -> u32 { 512 }
///     fn total_blocks(&self) -> u64 { self.data.len() as u64 / 4096 }
///
///     fn read_blocks(&mut self, lba: u64, count: u32, buf: &mut [u8]) -> Result<usize> {
///         let (s, n) = (lba as usize * 512, count as usize * 512);
///         buf[..n].copy_from_slice(&self.data[s..s + n]);
///         Ok(n)
///     }
///
///     fn write_blocks(&mut self, lba: u64, count: u32, buf: &[u8]) -> Result<usize> {
///         let (s, n) = (lba as usize * 512, count as usize * 512);
///         self.data[s..s + n].copy_from_slice(&buf[..n]);
///         Ok(n)
///     }
/// }
/// ```
pub trait BlockDevice {
    /// 文件系统块大小（字节）
    fn block_size(&self) -> u32;

    /// 扇区大小（字节）
    fn sector_size(&self) -> u32;

    /// 设备容量（文件系统块数）
    fn total_blocks(&self) -> u64;

    /// 从扇区 `lba` 起读 `count` 个扇区，返回读到的字节数
    fn read_blocks(&mut self, lba: u64, count: u32, buf: &mut [u8]) -> Result<usize>;

    /// 从扇区 `lba` 起写 `count` 个扇区，返回写出的字节数
    fn write_blocks(&mut self, lba: u64, count: u32, buf: &[u8]) -> Result<usize>;

    /// 让设备落盘自己的写缓存
    fn flush(&mut self) -> Result<()> {
        Ok(())
    }

    /// 只读设备拒绝一切写入
    fn is_read_only(&self) -> bool {
        false
    }
}

/// 块级 I/O 计数
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct IoStats {
    /// 读过的块数
    pub reads: u64,
    /// 写过的块数
    pub writes: u64,
}

/// 按块寻址的设备
///
/// 可以限定在设备的一个字节区间（分区）内。没有缓存也没有锁，
/// 多个调用者共享时由外部对整个实例加锁。
pub struct BlockDev<D> {
    device: D,
    /// 区间起点（字节）
    offset: u64,
    /// 区间长度（字节）
    size: u64,
    stats: IoStats,
}

impl<D: BlockDevice> BlockDev<D> {
    /// 包装整个设备
    ///
    /// 块大小必须是扇区大小的整数倍。
    pub fn new(device: D) -> Result<Self> {
        let (bs, ss) = (device.block_size(), device.sector_size());
        if ss == 0 || bs % ss != 0 {
            return Err(Error::new(
                ErrorKind::InvalidInput,
                "Block size is not a multiple of sector size",
            ));
        }

        let size = device.total_blocks() * bs as u64;
        Ok(Self {
            device,
            offset: 0,
            size,
            stats: IoStats::default(),
        })
    }

    /// 只包装设备上 `[offset, offset + size)` 这段字节区间
    pub fn new_partition(device: D, offset: u64, size: u64) -> Result<Self> {
        let mut bdev = Self::new(device)?;
        bdev.set_partition(offset, size);
        Ok(bdev)
    }

    /// 底层设备
    pub fn device(&self) -> &D {
        &self.device
    }

    /// 底层设备（可变）
    pub fn device_mut(&mut self) -> &mut D {
        &mut self.device
    }

    /// 拆出底层设备
    pub fn into_inner(self) -> D {
        self.device
    }

    /// 文件系统块大小
    pub fn block_size(&self) -> u32 {
        self.device.block_size()
    }

    /// 扇区大小
    pub fn sector_size(&self) -> u32 {
        self.device.sector_size()
    }

    /// 可寻址的块数
    pub fn device_length(&self) -> u64 {
        self.size / self.block_size() as u64
    }

    /// 读过的块数
    pub fn read_count(&self) -> u64 {
        self.stats.reads
    }

    /// 写过的块数
    pub fn write_count(&self) -> u64 {
        self.stats.writes
    }

    /// 读写计数
    pub fn stats(&self) -> IoStats {
        self.stats
    }

    /// 重新限定字节区间
    pub fn set_partition(&mut self, offset: u64, size: u64) {
        self.offset = offset;
        self.size = size;
    }

    /// 区间起点（字节）
    pub fn partition_offset(&self) -> u64 {
        self.offset
    }

    /// 区间长度（字节）
    pub fn partition_size(&self) -> u64 {
        self.size
    }

    /// 块地址换算成设备扇区地址
    pub(super) fn to_sector(&self, blk: u64) -> u64 {
        (blk * self.block_size() as u64 + self.offset) / self.sector_size() as u64
    }

    pub(super) fn sectors_per_block(&self) -> u32 {
        self.block_size() / self.sector_size()
    }

    /// `[blk, blk + count)` 必须落在区间内
    pub(super) fn check_range(&self, blk: u64, count: u32) -> Result<()> {
        match blk.checked_add(count as u64) {
            Some(end) if end <= self.device_length() => Ok(()),
            _ => Err(Error::at(
                ErrorKind::InvalidInput,
                "Block address beyond device end",
                blk,
            )),
        }
    }

    pub(super) fn stats_mut(&mut self) -> &mut IoStats {
        &mut self.stats
    }
}
