//! 超级块与对象 ID 分配器接口
//!
//! 格式层（超级块读写）和对象 ID 分配器都在存储核心之外。
//! 日志重放结束后需要把缓存的空闲块数、对象 ID 计数推送给它们，
//! 这里只定义所需的访问接口，并提供一份内存实现供调用方和测试使用。

mod memory;

pub use memory::{OidCounter, Superblock};

/// 超级块访问接口
pub trait SuperblockAccess {
    /// 块大小（字节）
    fn block_size(&self) -> u32;

    /// 文件系统总块数
    fn block_count(&self) -> u64;

    /// 空闲块数
    fn free_blocks(&self) -> u64;

    /// 设置空闲块数
    fn set_free_blocks(&mut self, count: u64);

    /// 已用对象 ID 数
    fn used_oids(&self) -> u64;

    /// 设置已用对象 ID 数
    fn set_used_oids(&mut self, count: u64);

    /// 下一个可分配的对象 ID
    fn next_oid(&self) -> u64;

    /// 设置下一个可分配的对象 ID
    fn set_next_oid(&mut self, oid: u64);
}

/// 对象 ID 分配器访问接口
pub trait OidAllocator {
    /// 设置下一个可分配的对象 ID
    fn set_next(&mut self, oid: u64);

    /// 设置已用对象 ID 数
    fn set_used(&mut self, count: u64);
}
