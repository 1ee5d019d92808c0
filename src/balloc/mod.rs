//! 物理块分配模块
//!
//! 目前只有位图分配器一种实现。分配器种类是一个封闭的枚举，
//! 新增一种布局就是新增一个变体，调用点通过 [`SpaceAllocator`] 统一访问。

pub mod helpers;
pub mod checksum;
pub mod pack;
mod allocator;

pub use allocator::BitmapAllocator;
pub use helpers::BitmapLayout;

use crate::{
    block::{BlockDev, BlockDevice},
    error::{Error, ErrorKind, Result},
    layout::Geometry,
};

/// 空间分配能力
pub trait SpaceAllocator {
    /// 分配连续块，返回 `(起始块, 实际块数)`
    fn allocate(&mut self, count: u64) -> Result<(u64, u64)>;

    /// 释放区域
    fn release(&mut self, start: u64, count: u64) -> Result<()>;

    /// 区域是否全部已分配
    fn occupied(&self, start: u64, count: u64) -> bool;

    /// 区域是否全部空闲
    fn available(&self, start: u64, count: u64) -> bool;

    /// 已用块数
    fn used(&self) -> u64;

    /// 空闲块数
    fn free(&self) -> u64;

    /// 写回修改
    fn sync<D: BlockDevice>(&mut self, bdev: &mut BlockDev<D>) -> Result<()>;
}

/// 分配器种类标识（格式层在磁盘上记录的插件 ID）
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u16)]
pub enum AllocatorKind {
    /// 带校验和的位图分配器
    Bitmap = 0,
}

impl AllocatorKind {
    /// 从磁盘上的 ID 解析
    pub fn from_id(id: u16) -> Result<Self> {
        match id {
            0 => Ok(AllocatorKind::Bitmap),
            _ => Err(Error::new(ErrorKind::Unsupported, "Unknown allocator id")),
        }
    }
}

/// 分配器实例
#[derive(Debug)]
pub enum Allocator {
    /// 位图分配器
    Bitmap(BitmapAllocator),
}

impl Allocator {
    /// 按种类打开分配器
    pub fn open<D: BlockDevice>(
        kind: AllocatorKind,
        bdev: &mut BlockDev<D>,
        geom: Geometry,
    ) -> Result<Self> {
        match kind {
            AllocatorKind::Bitmap => Ok(Allocator::Bitmap(BitmapAllocator::open(bdev, geom)?)),
        }
    }

    /// 按种类创建分配器
    pub fn create(kind: AllocatorKind, geom: Geometry) -> Result<Self> {
        match kind {
            AllocatorKind::Bitmap => Ok(Allocator::Bitmap(BitmapAllocator::create(geom)?)),
        }
    }

    /// 分配器种类
    pub fn kind(&self) -> AllocatorKind {
        match self {
            Allocator::Bitmap(_) => AllocatorKind::Bitmap,
        }
    }
}

impl SpaceAllocator for BitmapAllocator {
    fn allocate(&mut self, count: u64) -> Result<(u64, u64)> {
        BitmapAllocator::allocate(self, count)
    }

    fn release(&mut self, start: u64, count: u64) -> Result<()> {
        BitmapAllocator::release(self, start, count)
    }

    fn occupied(&self, start: u64, count: u64) -> bool {
        BitmapAllocator::occupied(self, start, count)
    }

    fn available(&self, start: u64, count: u64) -> bool {
        BitmapAllocator::available(self, start, count)
    }

    fn used(&self) -> u64 {
        BitmapAllocator::used(self)
    }

    fn free(&self) -> u64 {
        BitmapAllocator::free(self)
    }

    fn sync<D: BlockDevice>(&mut self, bdev: &mut BlockDev<D>) -> Result<()> {
        BitmapAllocator::sync(self, bdev)
    }
}

impl SpaceAllocator for Allocator {
    fn allocate(&mut self, count: u64) -> Result<(u64, u64)> {
        match self {
            Allocator::Bitmap(a) => a.allocate(count),
        }
    }

    fn release(&mut self, start: u64, count: u64) -> Result<()> {
        match self {
            Allocator::Bitmap(a) => a.release(start, count),
        }
    }

    fn occupied(&self, start: u64, count: u64) -> bool {
        match self {
            Allocator::Bitmap(a) => a.occupied(start, count),
        }
    }

    fn available(&self, start: u64, count: u64) -> bool {
        match self {
            Allocator::Bitmap(a) => a.available(start, count),
        }
    }

    fn used(&self) -> u64 {
        match self {
            Allocator::Bitmap(a) => a.used(),
        }
    }

    fn free(&self) -> u64 {
        match self {
            Allocator::Bitmap(a) => a.free(),
        }
    }

    fn sync<D: BlockDevice>(&mut self, bdev: &mut BlockDev<D>) -> Result<()> {
        match self {
            Allocator::Bitmap(a) => a.sync(bdev),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::block::MockDevice;

    #[test]
    fn test_dispatch_through_enum() {
        let geom = Geometry::new(4096, 1024).unwrap();
        let mut alloc = Allocator::create(AllocatorKind::from_id(0).unwrap(), geom).unwrap();
        assert_eq!(alloc.kind(), AllocatorKind::Bitmap);

        let (start, len) = alloc.allocate(16).unwrap();
        assert!(alloc.occupied(start, len));
        assert_eq!(alloc.used(), 16);

        let mut bdev = BlockDev::new(MockDevice::new(1024, 4096)).unwrap();
        alloc.sync(&mut bdev).unwrap();

        let reopened = Allocator::open(AllocatorKind::Bitmap, &mut bdev, geom).unwrap();
        assert_eq!(reopened.free(), 1008);
        assert!(AllocatorKind::from_id(7).is_err());
    }
}
