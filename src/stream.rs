//! pack 流读写
//!
//! 元数据导出/导入工具使用的字节流，所有整数字段均为小端序。

use crate::error::{Error, ErrorKind, Result};
use alloc::vec::Vec;
use byteorder::{ByteOrder, LittleEndian};

/// pack 流写入端
#[derive(Debug, Default, Clone)]
pub struct PackWriter {
    buf: Vec<u8>,
}

impl PackWriter {
    /// 创建空的写入端
    pub fn new() -> Self {
        Self { buf: Vec::new() }
    }

    /// 写入 4 字节签名
    pub fn write_sign(&mut self, sign: &[u8; 4]) {
        self.buf.extend_from_slice(sign);
    }

    /// 写入小端 u32
    pub fn write_u32(&mut self, value: u32) {
        let mut raw = [0u8; 4];
        LittleEndian::write_u32(&mut raw, value);
        self.buf.extend_from_slice(&raw);
    }

    /// 写入小端 u64
    pub fn write_u64(&mut self, value: u64) {
        let mut raw = [0u8; 8];
        LittleEndian::write_u64(&mut raw, value);
        self.buf.extend_from_slice(&raw);
    }

    /// 写入原始字节
    pub fn write_bytes(&mut self, data: &[u8]) {
        self.buf.extend_from_slice(data);
    }

    /// 已写入的字节
    pub fn as_bytes(&self) -> &[u8] {
        &self.buf
    }

    /// 取出全部字节
    pub fn into_inner(self) -> Vec<u8> {
        self.buf
    }
}

/// pack 流读取端
#[derive(Debug, Clone)]
pub struct PackReader<'a> {
    data: &'a [u8],
    pos: usize,
}

impl<'a> PackReader<'a> {
    /// 从字节切片创建读取端
    pub fn new(data: &'a [u8]) -> Self {
        Self { data, pos: 0 }
    }

    /// 剩余字节数
    pub fn remaining(&self) -> usize {
        self.data.len() - self.pos
    }

    /// 是否已读完
    pub fn is_empty(&self) -> bool {
        self.remaining() == 0
    }

    /// 读取 `len` 个原始字节
    pub fn read_bytes(&mut self, len: usize) -> Result<&'a [u8]> {
        if self.remaining() < len {
            return Err(Error::new(ErrorKind::Corrupted, "Truncated pack stream"));
        }
        let out = &self.data[self.pos..self.pos + len];
        self.pos += len;
        Ok(out)
    }

    /// 读取 4 字节签名
    pub fn read_sign(&mut self) -> Result<[u8; 4]> {
        let raw = self.read_bytes(4)?;
        let mut sign = [0u8; 4];
        sign.copy_from_slice(raw);
        Ok(sign)
    }

    /// 查看下一个签名但不消费
    pub fn peek_sign(&self) -> Option<[u8; 4]> {
        self.clone().read_sign().ok()
    }

    /// 读取小端 u32
    pub fn read_u32(&mut self) -> Result<u32> {
        Ok(LittleEndian::read_u32(self.read_bytes(4)?))
    }

    /// 读取小端 u64
    pub fn read_u64(&mut self) -> Result<u64> {
        Ok(LittleEndian::read_u64(self.read_bytes(8)?))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_writer_reader() {
        let mut w = PackWriter::new();
        w.write_sign(b"ABCD");
        w.write_u64(0x0102_0304_0506_0708);
        w.write_u32(7);
        w.write_bytes(&[9, 9]);

        let bytes = w.into_inner();
        assert_eq!(bytes.len(), 18);
        assert_eq!(bytes[4], 0x08);

        let mut r = PackReader::new(&bytes);
        assert_eq!(r.peek_sign(), Some(*b"ABCD"));
        assert_eq!(&r.read_sign().unwrap(), b"ABCD");
        assert_eq!(r.read_u64().unwrap(), 0x0102_0304_0506_0708);
        assert_eq!(r.read_u32().unwrap(), 7);
        assert_eq!(r.read_bytes(2).unwrap(), &[9, 9]);
        assert!(r.is_empty());
    }

    #[test]
    fn test_truncated() {
        let mut r = PackReader::new(&[1, 2, 3]);
        let err = r.read_u32().unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Corrupted);
        assert_eq!(r.remaining(), 3);
    }
}
