//! 位图块校验和
//!
//! 校验和覆盖一个位图块的完整载荷（`block_size - 4` 字节）。
//! 最后一段若不满，超出实际位图的部分按 0xFF 计算；恰好整除时没有填充。

use super::{helpers::segment_bytes, BitmapAllocator};
use crate::{
    check::{CheckMode, RepairFlags},
    csum,
    error::{Error, Result},
    layout::Geometry,
};
use alloc::vec::Vec;
use log::*;

/// 计算第 `index` 段的校验和
pub fn segment_sum(geom: &Geometry, map: &[u8], index: u64) -> u32 {
    let (offset, len) = segment_bytes(geom, map.len(), index);
    let capacity = geom.block_size as usize - crate::consts::BITMAP_SUM_SIZE;
    csum::adler32_padded(&map[offset..offset + len], capacity - len)
}

impl BitmapAllocator {
    /// 记录的校验和与内存位图不一致的位图块地址
    ///
    /// 比较对象是最近一次 open/sync/unpack 记录的校验和。
    pub fn bad_blocks(&self) -> Vec<u64> {
        let geom = self.geometry();
        let map = self.bitmap.as_bytes();

        (0..geom.bitmap_blocks())
            .filter(|&i| segment_sum(&geom, map, i) != self.sums[i as usize])
            .map(|i| geom.bitmap_block(i))
            .collect()
    }

    /// 校验全部位图块
    ///
    /// 任一块校验和不符即返回结构错误，错误中带第一个坏块的地址。
    pub fn valid(&self) -> Result<()> {
        let bad = self.bad_blocks();
        for &blk in &bad {
            error!("[bitmap] checksum mismatch in bitmap block {}", blk);
        }
        match bad.first() {
            Some(&blk) => Err(Error::corrupted("Bitmap block checksum mismatch", blk)),
            None => Ok(()),
        }
    }

    /// 结构检查
    ///
    /// `Check` 模式只报告 `FIXABLE`；修复模式接受当前内存位图，
    /// 用新校验和替换记录值并标记为脏，下次 `sync` 强制重写这些块。
    pub fn check_struct(&mut self, mode: CheckMode) -> Result<RepairFlags> {
        let geom = self.geometry();
        let mut res = RepairFlags::empty();

        for i in 0..geom.bitmap_blocks() {
            let sum = segment_sum(&geom, self.bitmap.as_bytes(), i);
            if sum == self.sums[i as usize] {
                continue;
            }

            let blk = geom.bitmap_block(i);
            if mode.repairs() {
                warn!(
                    "[bitmap] block {}: checksum {:#010x} replaced by {:#010x}",
                    blk, self.sums[i as usize], sum
                );
                self.sums[i as usize] = sum;
                self.dirty = true;
                res |= RepairFlags::FIXED;
            } else {
                error!(
                    "[bitmap] block {}: stored checksum {:#010x}, computed {:#010x}",
                    blk, self.sums[i as usize], sum
                );
                res |= RepairFlags::FIXABLE;
            }
        }

        Ok(res)
    }
}
