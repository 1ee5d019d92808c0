//! 位图块分配器
//!
//! 内存中保存整张位图，磁盘上按段存放在一串带校验和的位图块里：
//!
//! ```text
//! ┌──────────┬──────────────────────────────┐
//! │ csum (LE)│ 位图载荷 (block_size - 4 字节) │
//! └──────────┴──────────────────────────────┘
//! ```
//!
//! 所有修改只作用于内存并置脏，`sync` 时重新计算校验和后整段写回。

use super::{
    checksum::segment_sum,
    helpers::{self, segment_bytes, BitmapLayout},
};
use crate::{
    bitmap::Bitmap,
    block::{BlockDev, BlockDevice},
    consts::BITMAP_SUM_SIZE,
    error::{Error, ErrorKind, Result},
    layout::Geometry,
};
use alloc::{vec, vec::Vec};
use byteorder::{ByteOrder, LittleEndian};
use log::*;

/// 位图块分配器
///
/// 构造即完成 open/create，丢弃即释放内存位图。丢弃前不会自动写回，
/// 需要持久化时调用方必须先 [`BitmapAllocator::sync`]。
#[derive(Debug, Clone)]
pub struct BitmapAllocator {
    pub(super) geom: Geometry,
    pub(super) bitmap: Bitmap,
    /// 每个位图块记录的校验和
    pub(super) sums: Vec<u32>,
    pub(super) dirty: bool,
}

fn check_device<D: BlockDevice>(bdev: &BlockDev<D>, geom: &Geometry) -> Result<()> {
    if bdev.block_size() != geom.block_size {
        return Err(Error::new(
            ErrorKind::InvalidInput,
            "Device block size differs from allocator geometry",
        ));
    }
    Ok(())
}

impl BitmapAllocator {
    /// 从磁盘加载位图
    ///
    /// 逐个读取位图块，记录其中的校验和并把载荷复制到对应段。
    /// 已用块数总是重新扫描得到，不信任磁盘上的任何计数。
    /// 读取失败立即返回 I/O 错误。
    pub fn open<D: BlockDevice>(bdev: &mut BlockDev<D>, geom: Geometry) -> Result<Self> {
        check_device(bdev, &geom)?;

        let mut bitmap = Bitmap::new(geom.block_count)?;
        let count = geom.bitmap_blocks();
        let mut sums = Vec::new();
        sums.try_reserve_exact(count as usize)?;

        let mut buf = vec![0u8; geom.block_size as usize];
        for i in 0..count {
            let blk = geom.bitmap_block(i);
            bdev.read_block(blk, &mut buf)?;

            let (offset, len) = segment_bytes(&geom, bitmap.as_bytes().len(), i);
            sums.push(LittleEndian::read_u32(&buf[..BITMAP_SUM_SIZE]));
            bitmap.load_bytes(offset, &buf[BITMAP_SUM_SIZE..BITMAP_SUM_SIZE + len]);
        }

        let used = bitmap.recalc();
        let alloc = Self {
            geom,
            bitmap,
            sums,
            dirty: false,
        };

        for blk in alloc.bad_blocks() {
            warn!("[bitmap] block {} checksum mismatch at open", blk);
        }
        info!(
            "[bitmap] opened: {} blocks, {} used, {} bitmap blocks",
            geom.block_count, used, count
        );

        Ok(alloc)
    }

    /// 创建全空的分配器，不读磁盘，初始即为脏
    pub fn create(geom: Geometry) -> Result<Self> {
        let bitmap = Bitmap::new(geom.block_count)?;
        let count = geom.bitmap_blocks() as usize;

        let mut sums = Vec::new();
        sums.try_reserve_exact(count)?;
        for i in 0..count {
            sums.push(segment_sum(&geom, bitmap.as_bytes(), i as u64));
        }

        info!("[bitmap] created: {} blocks", geom.block_count);
        Ok(Self {
            geom,
            bitmap,
            sums,
            dirty: true,
        })
    }

    /// 几何参数
    pub fn geometry(&self) -> Geometry {
        self.geom
    }

    /// 内存位图
    pub fn bitmap(&self) -> &Bitmap {
        &self.bitmap
    }

    /// 记录的校验和
    pub fn checksums(&self) -> &[u32] {
        &self.sums
    }

    /// 是否有尚未写回的修改
    pub fn is_dirty(&self) -> bool {
        self.dirty
    }

    /// 分配连续块
    ///
    /// 从 0 开始首次适配（不回绕）。返回 `(起始块, 实际块数)`，
    /// 实际块数可能小于请求值，调用方必须检查；没有空闲块时长度为 0。
    pub fn allocate(&mut self, count: u64) -> Result<(u64, u64)> {
        let Some((start, len)) = self.bitmap.find_region_cleared(0, count) else {
            debug!("[bitmap] allocate({}): nothing free", count);
            return Ok((0, 0));
        };

        self.bitmap.mark_region(start, len)?;
        self.dirty = true;

        if len < count {
            debug!("[bitmap] allocate({}): short run {}+{}", count, start, len);
        }
        Ok((start, len))
    }

    /// 释放区域
    ///
    /// 不检查原状态，重复释放被静默容忍。
    pub fn release(&mut self, start: u64, count: u64) -> Result<()> {
        self.bitmap.clear_region(start, count)?;
        self.dirty = true;
        Ok(())
    }

    /// 把区域标记为已用（格式层用来保留自身的固定块）
    pub fn occupy(&mut self, start: u64, count: u64) -> Result<()> {
        self.bitmap.mark_region(start, count)?;
        self.dirty = true;
        Ok(())
    }

    /// 区域内所有块是否都已分配
    pub fn occupied(&self, start: u64, count: u64) -> bool {
        self.bitmap.test_region_marked(start, count)
    }

    /// 区域内所有块是否都空闲
    pub fn available(&self, start: u64, count: u64) -> bool {
        self.bitmap.test_region_cleared(start, count)
    }

    /// 已用块数
    pub fn used(&self) -> u64 {
        self.bitmap.marked()
    }

    /// 空闲块数
    pub fn free(&self) -> u64 {
        self.bitmap.cleared()
    }

    /// 写回全部位图块
    ///
    /// 每块重新计算校验和（最后一段尾部按全 1 填充）后写出。
    /// 任一写入失败立即返回，脏标志保持不变。
    pub fn sync<D: BlockDevice>(&mut self, bdev: &mut BlockDev<D>) -> Result<()> {
        if !self.dirty {
            return Ok(());
        }
        check_device(bdev, &self.geom)?;

        let geom = self.geom;
        let mut buf = vec![0u8; geom.block_size as usize];

        for i in 0..geom.bitmap_blocks() {
            let blk = geom.bitmap_block(i);
            let sum = self.fill_block(i, &mut buf);
            bdev.write_block(blk, &buf)?;
            self.sums[i as usize] = sum;
        }

        self.dirty = false;
        info!("[bitmap] synced: {} used, {} free", self.used(), self.free());
        Ok(())
    }

    /// 把第 `index` 段编码为完整的磁盘位图块，返回其校验和
    pub(super) fn fill_block(&self, index: u64, buf: &mut [u8]) -> u32 {
        let map = self.bitmap.as_bytes();
        let (offset, len) = segment_bytes(&self.geom, map.len(), index);
        let sum = segment_sum(&self.geom, map, index);

        LittleEndian::write_u32(&mut buf[..BITMAP_SUM_SIZE], sum);
        let payload = &mut buf[BITMAP_SUM_SIZE..];
        payload[..len].copy_from_slice(&map[offset..offset + len]);
        payload[len..].fill(0xFF);
        sum
    }

    /// 关闭分配器
    ///
    /// 只释放内存，不写回。
    pub fn close(self) {
        if self.dirty {
            warn!("[bitmap] closed with unsynced changes");
        }
    }

    /// 位图块布局
    pub fn layout(&self) -> BitmapLayout {
        BitmapLayout::new(self.geom)
    }

    /// 给定几何参数下的位图块布局（无需打开分配器）
    pub fn layout_of(geom: &Geometry) -> BitmapLayout {
        BitmapLayout::new(*geom)
    }

    /// 描述 `blk` 的整个位图块所覆盖的区域 `(起始块, 块数)`
    pub fn region_of(&self, blk: u64) -> Result<(u64, u64)> {
        helpers::region_of(&self.geom, blk)
    }

    /// 回调形式的 [`BitmapAllocator::region_of`]
    ///
    /// 某一位看起来不对时，修复工具用它把整个位图块所描述的区域一起标记。
    pub fn region<F>(&self, blk: u64, mut f: F) -> Result<()>
    where
        F: FnMut(u64, u64) -> Result<()>,
    {
        let (start, count) = self.region_of(blk)?;
        f(start, count)
    }
}
