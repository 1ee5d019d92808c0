//! 位图底层操作
//!
//! 位序约定：第 i 位位于第 `i / 8` 字节的第 `i % 8` 位（低位在前）。
//! 搜索和计数在字节对齐处整字节跳过，避免逐位扫描大片已满或全空的区域。

use crate::error::{Error, ErrorKind, Result};

/// 测试某一位是否被设置，越界的位视为未设置
#[inline]
pub fn test_bit(bitmap: &[u8], index: u64) -> bool {
    let byte_index = (index / 8) as usize;
    let bit_offset = (index % 8) as u8;

    if byte_index >= bitmap.len() {
        return false;
    }

    (bitmap[byte_index] & (1 << bit_offset)) != 0
}

/// 设置某一位
pub fn set_bit(bitmap: &mut [u8], index: u64) -> Result<()> {
    let byte_index = (index / 8) as usize;
    let bit_offset = (index % 8) as u8;

    if byte_index >= bitmap.len() {
        return Err(Error::new(
            ErrorKind::InvalidInput,
            "Bitmap index out of range",
        ));
    }

    bitmap[byte_index] |= 1 << bit_offset;
    Ok(())
}

/// 清除某一位
pub fn clear_bit(bitmap: &mut [u8], index: u64) -> Result<()> {
    let byte_index = (index / 8) as usize;
    let bit_offset = (index % 8) as u8;

    if byte_index >= bitmap.len() {
        return Err(Error::new(
            ErrorKind::InvalidInput,
            "Bitmap index out of range",
        ));
    }

    bitmap[byte_index] &= !(1 << bit_offset);
    Ok(())
}

/// 在 `[start, end)` 中查找第一个值等于 `value` 的位
fn find_bit(bitmap: &[u8], start: u64, end: u64, value: bool) -> Option<u64> {
    let end = end.min(bitmap.len() as u64 * 8);
    // 不可能包含目标位的整字节
    let skip = if value { 0x00 } else { 0xFF };
    let mut i = start;

    while i < end {
        if i % 8 == 0 && i + 8 <= end && bitmap[(i / 8) as usize] == skip {
            i += 8;
            continue;
        }
        if test_bit(bitmap, i) == value {
            return Some(i);
        }
        i += 1;
    }

    None
}

/// 在 `[start, end)` 中查找第一个空闲位（值为 0）
pub fn find_first_zero(bitmap: &[u8], start: u64, end: u64) -> Option<u64> {
    find_bit(bitmap, start, end, false)
}

/// 在 `[start, end)` 中查找第一个被设置的位（值为 1）
pub fn find_first_one(bitmap: &[u8], start: u64, end: u64) -> Option<u64> {
    find_bit(bitmap, start, end, true)
}

/// 从 `start` 开始、不超过 `end` 的连续 0 位长度
pub fn zero_run_len(bitmap: &[u8], start: u64, end: u64) -> u64 {
    let end = end.min(bitmap.len() as u64 * 8);
    if start >= end {
        return 0;
    }
    find_first_one(bitmap, start, end).unwrap_or(end) - start
}

/// 统计 `[start, end)` 范围内被设置的位数
pub fn count_ones(bitmap: &[u8], start: u64, end: u64) -> u64 {
    let end = end.min(bitmap.len() as u64 * 8);
    let mut count = 0u64;
    let mut i = start;

    while i < end {
        if i % 8 == 0 && i + 8 <= end {
            count += bitmap[(i / 8) as usize].count_ones() as u64;
            i += 8;
            continue;
        }
        if test_bit(bitmap, i) {
            count += 1;
        }
        i += 1;
    }

    count
}

/// 统计 `[start, end)` 范围内空闲的位数
pub fn count_zeros(bitmap: &[u8], start: u64, end: u64) -> u64 {
    let end = end.min(bitmap.len() as u64 * 8);
    if start >= end {
        return 0;
    }
    (end - start) - count_ones(bitmap, start, end)
}

/// 批量设置连续位
pub fn set_bits(bitmap: &mut [u8], start: u64, count: u64) -> Result<()> {
    for i in start..start + count {
        set_bit(bitmap, i)?;
    }
    Ok(())
}

/// 批量清除连续位
pub fn clear_bits(bitmap: &mut [u8], start: u64, count: u64) -> Result<()> {
    for i in start..start + count {
        clear_bit(bitmap, i)?;
    }
    Ok(())
}

/// 查找连续的 `count` 个空闲位
///
/// 返回第一个满足长度的空闲段的起始索引。
pub fn find_consecutive_zeros(bitmap: &[u8], start: u64, end: u64, count: u64) -> Option<u64> {
    if count == 0 {
        return Some(start);
    }

    let end = end.min(bitmap.len() as u64 * 8);
    let mut pos = start;

    while let Some(s) = find_first_zero(bitmap, pos, end) {
        if s + count > end {
            return None;
        }
        let run = zero_run_len(bitmap, s, s + count);
        if run == count {
            return Some(s);
        }
        pos = s + run;
    }

    None
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_bit_operations() {
        let mut bitmap = [0u8; 4];

        assert!(!test_bit(&bitmap, 0));
        set_bit(&mut bitmap, 0).unwrap();
        assert!(test_bit(&bitmap, 0));

        set_bit(&mut bitmap, 15).unwrap();
        assert_eq!(bitmap[1], 0x80);

        clear_bit(&mut bitmap, 0).unwrap();
        assert!(!test_bit(&bitmap, 0));
        assert!(test_bit(&bitmap, 15));
    }

    #[test]
    fn test_find_skips_full_bytes() {
        let mut bitmap = [0xFFu8; 8];
        clear_bit(&mut bitmap, 45).unwrap();
        assert_eq!(find_first_zero(&bitmap, 0, 64), Some(45));
        assert_eq!(find_first_zero(&bitmap, 46, 64), None);

        let mut empty = [0u8; 8];
        set_bit(&mut empty, 61).unwrap();
        assert_eq!(find_first_one(&empty, 3, 64), Some(61));
        assert_eq!(find_first_one(&empty, 3, 61), None);
    }

    #[test]
    fn test_count_ones_zeros() {
        let mut bitmap = [0u8; 4];
        set_bit(&mut bitmap, 0).unwrap();
        set_bit(&mut bitmap, 5).unwrap();
        set_bits(&mut bitmap, 8, 8).unwrap();

        assert_eq!(count_ones(&bitmap, 0, 32), 10);
        assert_eq!(count_zeros(&bitmap, 0, 32), 22);
        assert_eq!(count_ones(&bitmap, 3, 12), 5);
    }

    #[test]
    fn test_zero_run_len() {
        let mut bitmap = [0u8; 4];
        set_bit(&mut bitmap, 10).unwrap();
        assert_eq!(zero_run_len(&bitmap, 2, 32), 8);
        assert_eq!(zero_run_len(&bitmap, 2, 5), 3);
        assert_eq!(zero_run_len(&bitmap, 10, 32), 0);
        assert_eq!(zero_run_len(&bitmap, 11, 32), 21);
    }

    #[test]
    fn test_find_consecutive_zeros() {
        let mut bitmap = [0u8; 4];
        assert_eq!(find_consecutive_zeros(&bitmap, 0, 32, 10), Some(0));

        set_bits(&mut bitmap, 5, 3).unwrap();
        assert_eq!(find_consecutive_zeros(&bitmap, 0, 32, 5), Some(0));
        assert_eq!(find_consecutive_zeros(&bitmap, 0, 32, 6), Some(8));

        set_bits(&mut bitmap, 20, 1).unwrap();
        assert_eq!(find_consecutive_zeros(&bitmap, 0, 32, 12), Some(8));
        assert_eq!(find_consecutive_zeros(&bitmap, 0, 32, 13), None);
        assert_eq!(find_consecutive_zeros(&bitmap, 12, 32, 11), Some(21));
    }

    #[test]
    fn test_out_of_range() {
        let mut bitmap = [0u8; 4];
        assert!(set_bit(&mut bitmap, 32).is_err());
        assert!(clear_bit(&mut bitmap, 32).is_err());
        assert_eq!(find_first_zero(&bitmap, 0, 100), Some(0));
        assert_eq!(find_first_zero(&bitmap, 32, 100), None);
    }
}
