//! 位图分段辅助函数
//!
//! 位图按 `bits_per_block` 切分成若干段，每段对应一个磁盘位图块。

use crate::{
    error::{Error, ErrorKind, Result},
    layout::{BlockKind, Geometry},
};

/// 第 `index` 段在位图字节数组中的范围 `(字节偏移, 字节数)`
///
/// `map_len` 为位图总字节数。最后一段可能不足一个块的载荷容量。
pub fn segment_bytes(geom: &Geometry, map_len: usize, index: u64) -> (usize, usize) {
    let per_block = geom.block_size as usize - crate::consts::BITMAP_SUM_SIZE;
    let offset = index as usize * per_block;
    let len = per_block.min(map_len.saturating_sub(offset));
    (offset, len)
}

/// 块地址所属的段
pub fn segment_of(geom: &Geometry, blk: u64) -> u64 {
    blk / geom.bits_per_block()
}

/// 包含 `blk` 的整段区域 `(起始块, 块数)`
pub fn region_of(geom: &Geometry, blk: u64) -> Result<(u64, u64)> {
    if blk >= geom.block_count {
        return Err(Error::at(
            ErrorKind::InvalidInput,
            "Block beyond allocator range",
            blk,
        ));
    }
    let bpb = geom.bits_per_block();
    let start = segment_of(geom, blk) * bpb;
    Ok((start, bpb.min(geom.block_count - start)))
}

/// 位图块布局游标
///
/// 依次给出每个磁盘位图块的地址，可 `clone` 后从头重新遍历。
#[derive(Debug, Clone)]
pub struct BitmapLayout {
    geom: Geometry,
    next: u64,
    count: u64,
}

impl BitmapLayout {
    pub(super) fn new(geom: Geometry) -> Self {
        Self {
            geom,
            next: 0,
            count: geom.bitmap_blocks(),
        }
    }
}

impl Iterator for BitmapLayout {
    type Item = (u64, BlockKind);

    fn next(&mut self) -> Option<Self::Item> {
        if self.next >= self.count {
            return None;
        }
        let blk = self.geom.bitmap_block(self.next);
        self.next += 1;
        Some((blk, BlockKind::Bitmap))
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        let left = (self.count - self.next) as usize;
        (left, Some(left))
    }
}
