//! 位图的 pack/unpack
//!
//! 流格式：`[u64 总块数]`，随后每个位图块一条 `[u32 校验和][载荷]` 记录。
//! 载荷按磁盘块的形式给出（最后一段尾部为 0xFF），与实际设备布局无关。

use super::{helpers::segment_bytes, BitmapAllocator};
use crate::{
    bitmap::Bitmap,
    consts::BITMAP_SUM_SIZE,
    error::Result,
    layout::Geometry,
    stream::{PackReader, PackWriter},
};
use alloc::{vec, vec::Vec};
use log::*;

impl BitmapAllocator {
    /// 导出位图
    ///
    /// 写出的校验和是记录值而非重新计算值，导入后 `valid()` 的结论与导出前一致。
    pub fn pack(&self, out: &mut PackWriter) {
        let geom = self.geom;
        let mut buf = vec![0u8; geom.block_size as usize];

        out.write_u64(geom.block_count);
        for i in 0..geom.bitmap_blocks() {
            self.fill_block(i, &mut buf);
            out.write_u32(self.sums[i as usize]);
            out.write_bytes(&buf[BITMAP_SUM_SIZE..]);
        }
    }

    /// 导入位图
    ///
    /// 结果处于脏状态，调用方 `sync` 后才会落盘。
    pub fn unpack(input: &mut PackReader<'_>, block_size: u32) -> Result<Self> {
        let block_count = input.read_u64()?;
        let geom = Geometry::new(block_size, block_count)?;

        let mut bitmap = Bitmap::new(block_count)?;
        let count = geom.bitmap_blocks();
        let mut sums = Vec::new();
        sums.try_reserve_exact(count as usize)?;

        let payload = block_size as usize - BITMAP_SUM_SIZE;
        for i in 0..count {
            sums.push(input.read_u32()?);
            let data = input.read_bytes(payload)?;
            let (offset, len) = segment_bytes(&geom, bitmap.as_bytes().len(), i);
            bitmap.load_bytes(offset, &data[..len]);
        }
        bitmap.recalc();

        debug!("[bitmap] unpacked {} blocks", block_count);
        Ok(Self {
            geom,
            bitmap,
            sums,
            dirty: true,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;

    #[test]
    fn test_pack_unpack() {
        let geom = Geometry::new(512, 10000).unwrap();
        let mut alloc = BitmapAllocator::create(geom).unwrap();
        alloc.occupy(0, 133).unwrap();
        alloc.occupy(9000, 1000).unwrap();
        alloc.check_struct(crate::check::CheckMode::Fix).unwrap();

        let mut w = PackWriter::new();
        alloc.pack(&mut w);
        let bytes = w.into_inner();
        assert_eq!(bytes.len(), 8 + 3 * 512);

        let mut r = PackReader::new(&bytes);
        let back = BitmapAllocator::unpack(&mut r, 512).unwrap();
        assert!(r.is_empty());
        assert_eq!(back.bitmap(), alloc.bitmap());
        assert_eq!(back.checksums(), alloc.checksums());
        assert_eq!(back.used(), 1133);
        back.valid().unwrap();
    }

    #[test]
    fn test_unpack_truncated() {
        let geom = Geometry::new(512, 10000).unwrap();
        let alloc = BitmapAllocator::create(geom).unwrap();
        let mut w = PackWriter::new();
        alloc.pack(&mut w);
        let bytes = w.into_inner();

        let mut r = PackReader::new(&bytes[..bytes.len() - 1]);
        let err = BitmapAllocator::unpack(&mut r, 512).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Corrupted);
    }
}
