//! 常量定义
//!
//! 包含磁盘布局、日志魔数以及 pack 流签名等常量。

//=============================================================================
// 基础常量
//=============================================================================

/// 默认物理扇区大小（512 字节）
pub const DEFAULT_SECTOR_SIZE: u32 = 512;

/// 默认逻辑块大小（4096 字节）
pub const DEFAULT_BLOCK_SIZE: u32 = 4096;

/// 最小块大小（512 字节）
pub const MIN_BLOCK_SIZE: u32 = 512;

/// 最大块大小（65536 字节）
pub const MAX_BLOCK_SIZE: u32 = 65536;

//=============================================================================
// 磁盘布局
//=============================================================================

/// master 区域在设备上的字节偏移，其前面的空间全部保留
pub const MASTER_OFFSET: u64 = 65536;

/// master 块之后依次是：格式超级块、第一个位图块、日志头、日志尾
pub const FORMAT_BLOCK_DELTA: u64 = 1;

/// 第一个位图块相对 master 块的偏移
pub const BITMAP_BLOCK_DELTA: u64 = 2;

/// 日志头相对 master 块的偏移
pub const JOURNAL_HEADER_DELTA: u64 = 3;

/// 日志尾相对 master 块的偏移
pub const JOURNAL_FOOTER_DELTA: u64 = 4;

//=============================================================================
// 位图块
//=============================================================================

/// 位图块头部的校验和字节数
pub const BITMAP_SUM_SIZE: usize = 4;

//=============================================================================
// 日志
//=============================================================================

/// 事务头魔数
pub const TXH_MAGIC: &[u8; 8] = b"TxMagic4";

/// 日志记录魔数
pub const LGR_MAGIC: &[u8; 8] = b"LogMagc4";

/// 事务头固定部分大小
pub const TXH_SIZE: usize = 72;

/// 日志记录头部大小
pub const LGR_HEADER_SIZE: usize = 32;

/// 单个 wander 条目大小
pub const WANDER_ENTRY_SIZE: usize = 16;

/// 日志头大小
pub const JOURNAL_HEADER_SIZE: usize = 8;

/// 日志尾大小
pub const JOURNAL_FOOTER_SIZE: usize = 32;

//=============================================================================
// pack 流签名
//=============================================================================

/// 日志头记录
pub const PACK_SIGN_HEADER: &[u8; 4] = b"JHDR";

/// 日志尾记录
pub const PACK_SIGN_FOOTER: &[u8; 4] = b"JFTR";

/// 事务头记录
pub const PACK_SIGN_TXH: &[u8; 4] = b"JTXH";

/// 日志记录块
pub const PACK_SIGN_LGR: &[u8; 4] = b"JLGR";

/// wandered 块
pub const PACK_SIGN_WANDERED: &[u8; 4] = b"JWAN";
