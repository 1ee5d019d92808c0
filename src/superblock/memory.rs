//! 内存中的超级块与对象 ID 计数器

use super::{OidAllocator, SuperblockAccess};

/// 内存超级块
///
/// 只保存存储核心关心的计数字段，磁盘格式由格式层负责。
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Superblock {
    /// 块大小（字节）
    pub block_size: u32,
    /// 总块数
    pub block_count: u64,
    /// 空闲块数
    pub free_blocks: u64,
    /// 已用对象 ID 数
    pub used_oids: u64,
    /// 下一个对象 ID
    pub next_oid: u64,
    /// 计数字段自加载后是否被修改
    pub dirty: bool,
}

impl Superblock {
    /// 创建新的内存超级块，所有块视为空闲
    pub fn new(block_size: u32, block_count: u64) -> Self {
        Self {
            block_size,
            block_count,
            free_blocks: block_count,
            ..Self::default()
        }
    }
}

impl SuperblockAccess for Superblock {
    fn block_size(&self) -> u32 {
        self.block_size
    }

    fn block_count(&self) -> u64 {
        self.block_count
    }

    fn free_blocks(&self) -> u64 {
        self.free_blocks
    }

    fn set_free_blocks(&mut self, count: u64) {
        self.free_blocks = count;
        self.dirty = true;
    }

    fn used_oids(&self) -> u64 {
        self.used_oids
    }

    fn set_used_oids(&mut self, count: u64) {
        self.used_oids = count;
        self.dirty = true;
    }

    fn next_oid(&self) -> u64 {
        self.next_oid
    }

    fn set_next_oid(&mut self, oid: u64) {
        self.next_oid = oid;
        self.dirty = true;
    }
}

/// 简单的对象 ID 计数器
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct OidCounter {
    /// 下一个对象 ID
    pub next: u64,
    /// 已用对象 ID 数
    pub used: u64,
}

impl OidAllocator for OidCounter {
    fn set_next(&mut self, oid: u64) {
        self.next = oid;
    }

    fn set_used(&mut self, count: u64) {
        self.used = count;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_superblock_counters() {
        let mut sb = Superblock::new(4096, 1024);
        assert_eq!(sb.free_blocks(), 1024);
        assert!(!sb.dirty);

        sb.set_free_blocks(1000);
        sb.set_next_oid(65536);
        assert_eq!(sb.free_blocks(), 1000);
        assert_eq!(sb.next_oid(), 65536);
        assert!(sb.dirty);
    }
}
