//! 内存位图
//!
//! 第 i 位被设置当且仅当第 i 块已分配。位图同时缓存已设置位的数量，
//! 使 `marked()` / `cleared()` 为 O(1)。

pub mod ops;

use crate::error::{Error, ErrorKind, Result};
use alloc::vec::Vec;

/// 带计数器的位图
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Bitmap {
    /// 有效位数
    total: u64,
    /// 已设置位数
    marked: u64,
    /// 位数据，长度为 `ceil(total / 8)`
    map: Vec<u8>,
}

impl Bitmap {
    /// 创建全 0 位图
    ///
    /// 内存不足时返回 `ErrorKind::NoMemory`，不会 panic。
    pub fn new(total: u64) -> Result<Self> {
        let len = Self::bytes_for(total)?;
        let mut map = Vec::new();
        map.try_reserve_exact(len)?;
        map.resize(len, 0);

        Ok(Self {
            total,
            marked: 0,
            map,
        })
    }

    /// 计算 `total` 位需要的字节数
    pub fn bytes_for(total: u64) -> Result<usize> {
        usize::try_from(total.div_ceil(8))
            .map_err(|_| Error::new(ErrorKind::NoMemory, "Bitmap too large"))
    }

    /// 有效位数
    pub fn total(&self) -> u64 {
        self.total
    }

    /// 已设置位数
    pub fn marked(&self) -> u64 {
        self.marked
    }

    /// 未设置位数
    pub fn cleared(&self) -> u64 {
        self.total - self.marked
    }

    /// 位数据
    pub fn as_bytes(&self) -> &[u8] {
        &self.map
    }

    /// 把 `data` 复制到从字节 `offset` 开始的位置
    ///
    /// 超出位图长度的部分被忽略。复制后需要调用 [`Bitmap::recalc`]。
    pub fn load_bytes(&mut self, offset: usize, data: &[u8]) {
        if offset >= self.map.len() {
            return;
        }
        let n = data.len().min(self.map.len() - offset);
        self.map[offset..offset + n].copy_from_slice(&data[..n]);
    }

    /// 重新统计已设置位数
    ///
    /// 只统计前 `total` 位；最后一个字节中多余的位保持原样，不参与计数。
    pub fn recalc(&mut self) -> u64 {
        self.marked = ops::count_ones(&self.map, 0, self.total);
        self.marked
    }

    /// 测试某一位
    pub fn test(&self, bit: u64) -> bool {
        bit < self.total && ops::test_bit(&self.map, bit)
    }

    fn check_region(&self, start: u64, count: u64) -> Result<()> {
        match start.checked_add(count) {
            Some(end) if end <= self.total => Ok(()),
            _ => Err(Error::at(
                ErrorKind::InvalidInput,
                "Region beyond bitmap end",
                start,
            )),
        }
    }

    /// 设置单个位
    pub fn mark(&mut self, bit: u64) -> Result<()> {
        self.mark_region(bit, 1)
    }

    /// 清除单个位
    pub fn clear(&mut self, bit: u64) -> Result<()> {
        self.clear_region(bit, 1)
    }

    /// 设置一段连续位，计数器只累加原先为 0 的位
    pub fn mark_region(&mut self, start: u64, count: u64) -> Result<()> {
        self.check_region(start, count)?;
        let before = ops::count_ones(&self.map, start, start + count);
        ops::set_bits(&mut self.map, start, count)?;
        self.marked += count - before;
        Ok(())
    }

    /// 清除一段连续位，计数器只扣减原先为 1 的位
    pub fn clear_region(&mut self, start: u64, count: u64) -> Result<()> {
        self.check_region(start, count)?;
        let before = ops::count_ones(&self.map, start, start + count);
        ops::clear_bits(&mut self.map, start, count)?;
        self.marked -= before;
        Ok(())
    }

    /// 区域内所有位是否都被设置，越界区域返回 false
    pub fn test_region_marked(&self, start: u64, count: u64) -> bool {
        if self.check_region(start, count).is_err() {
            return false;
        }
        ops::find_first_zero(&self.map, start, start + count).is_none()
    }

    /// 区域内所有位是否都为 0，越界区域返回 false
    pub fn test_region_cleared(&self, start: u64, count: u64) -> bool {
        if self.check_region(start, count).is_err() {
            return false;
        }
        ops::find_first_one(&self.map, start, start + count).is_none()
    }

    /// 从 `start` 开始查找第一个 0 位
    pub fn find_cleared(&self, start: u64) -> Option<u64> {
        ops::find_first_zero(&self.map, start, self.total)
    }

    /// 从 `start` 开始查找第一个 1 位
    pub fn find_marked(&self, start: u64) -> Option<u64> {
        ops::find_first_one(&self.map, start, self.total)
    }

    /// 首次适配查找连续空闲区
    ///
    /// 从 `start` 向后扫描（不回绕），返回第一个长度不小于 `count` 的空闲段，
    /// 长度截断为 `count`。若不存在这样的段，返回最长的空闲段（同长取最靠前者）。
    /// 位图全满或 `count == 0` 时返回 `None`。
    pub fn find_region_cleared(&self, start: u64, count: u64) -> Option<(u64, u64)> {
        if count == 0 {
            return None;
        }

        let mut best: Option<(u64, u64)> = None;
        let mut pos = start;

        while let Some(s) = ops::find_first_zero(&self.map, pos, self.total) {
            let limit = self.total.min(s.saturating_add(count));
            let len = ops::zero_run_len(&self.map, s, limit);
            if len == count {
                return Some((s, len));
            }
            if best.map_or(true, |(_, l)| len > l) {
                best = Some((s, len));
            }
            pos = s + len;
        }

        best
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_counter_tracks_changes() {
        let mut bm = Bitmap::new(100).unwrap();
        assert_eq!(bm.as_bytes().len(), 13);
        assert_eq!(bm.cleared(), 100);

        bm.mark_region(10, 20).unwrap();
        assert_eq!(bm.marked(), 20);

        // 重叠设置只累计新增的位
        bm.mark_region(25, 10).unwrap();
        assert_eq!(bm.marked(), 25);

        // 清除已空闲的位不影响计数
        bm.clear_region(0, 12).unwrap();
        assert_eq!(bm.marked(), 23);
        bm.clear_region(0, 12).unwrap();
        assert_eq!(bm.marked(), 23);

        assert_eq!(bm.recalc(), 23);
    }

    #[test]
    fn test_region_predicates_exclusive() {
        let mut bm = Bitmap::new(64).unwrap();
        bm.mark_region(8, 8).unwrap();

        for start in 0..60 {
            for n in 1..5 {
                assert!(!(bm.test_region_marked(start, n) && bm.test_region_cleared(start, n)));
            }
        }
        assert!(bm.test_region_marked(8, 8));
        assert!(bm.test_region_cleared(0, 8));
        assert!(!bm.test_region_marked(7, 2));
        assert!(!bm.test_region_cleared(60, 10));
    }

    #[test]
    fn test_find_region_first_fit() {
        let mut bm = Bitmap::new(64).unwrap();
        bm.mark_region(4, 4).unwrap();
        bm.mark_region(20, 1).unwrap();

        assert_eq!(bm.find_region_cleared(0, 4), Some((0, 4)));
        assert_eq!(bm.find_region_cleared(0, 10), Some((8, 10)));
        assert_eq!(bm.find_region_cleared(0, 50), Some((21, 43)));
        assert_eq!(bm.find_region_cleared(0, 0), None);
    }

    #[test]
    fn test_find_region_full() {
        let mut bm = Bitmap::new(20).unwrap();
        bm.mark_region(0, 20).unwrap();
        assert_eq!(bm.find_region_cleared(0, 1), None);
        assert_eq!(bm.find_cleared(0), None);
        assert_eq!(bm.find_marked(5), Some(5));
    }

    #[test]
    fn test_region_beyond_end() {
        let mut bm = Bitmap::new(10).unwrap();
        assert!(bm.mark_region(5, 6).is_err());
        assert!(bm.clear_region(u64::MAX, 2).is_err());
        assert_eq!(bm.marked(), 0);
    }

    #[test]
    fn test_tail_bits_not_counted() {
        let mut bm = Bitmap::new(10).unwrap();
        bm.load_bytes(0, &[0xFF, 0xFF]);
        assert_eq!(bm.recalc(), 10);
        assert_eq!(bm.cleared(), 0);
    }
}
