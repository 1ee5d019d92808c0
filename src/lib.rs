//! wjfs_core: 带 wandered 日志的文件系统存储核心
//!
//! 这个库实现文件系统最底层的两个部件：
//! - **位图块分配器**：每块一位，磁盘上按块切段并带校验和
//! - **wandered 日志**：写前日志的只读一侧，负责遍历、重放、检查和导出已提交的事务
//!
//! 库本身是 `no_std` + `alloc`，不安装日志后端，也不做任何内部加锁。
//!
//! # 示例
//!
//! ```rust,ignore
//! use wjfs_core::{BlockDev, BitmapAllocator, Geometry, Journal, Superblock, OidCounter};
//!
//! let mut bdev = BlockDev::new(MyDevice::open()?)?;
//! let geom = Geometry::new(4096, bdev.device_length())?;
//!
//! // 挂载时先重放日志，失败则拒绝挂载
//! let mut journal = Journal::open(&mut bdev, geom.journal_area())?;
//! journal.recover(&mut bdev, &mut sb, &mut oids)?;
//!
//! let mut alloc = BitmapAllocator::open(&mut bdev, geom)?;
//! let (start, len) = alloc.allocate(16)?;
//! alloc.sync(&mut bdev)?;
//! ```
//!
//! # 模块结构
//!
//! - [`error`] - 错误类型定义
//! - [`block`] - 块设备抽象和 I/O 操作
//! - [`consts`] - 常量定义
//! - [`layout`] - 磁盘布局与几何参数
//! - [`bitmap`] - 内存位图
//! - [`balloc`] - 位图块分配器
//! - [`journal`] - wandered 日志
//! - [`superblock`] - 超级块/对象 ID 分配器接口
//! - [`stream`] - 导出流
//! - [`check`] - 检查模式与修复结论

#![no_std]
#![deny(unsafe_op_in_unsafe_fn)]
#![warn(missing_docs)]

extern crate alloc;

#[cfg(feature = "std")]
extern crate std;

// ===== 核心模块 =====

/// 错误处理
pub mod error;

/// 块设备抽象
pub mod block;

/// 常量定义
pub mod consts;

/// 磁盘布局
pub mod layout;

/// 位图操作
pub mod bitmap;

/// 块分配
pub mod balloc;

/// 日志
pub mod journal;

/// 超级块接口
pub mod superblock;

/// 导出流
pub mod stream;

/// 检查与修复
pub mod check;

/// Adler-32 校验和计算
pub(crate) mod csum;

// ===== 公共导出 =====

// 错误处理
pub use error::{Error, ErrorKind, Result};

// 块设备
pub use block::{BlockDev, BlockDevice};

// 布局
pub use layout::{fixed_metadata, BlockKind, Geometry, JournalArea};

// 位图
pub use bitmap::Bitmap;

// 分配器
pub use balloc::{Allocator, AllocatorKind, BitmapAllocator, SpaceAllocator};

// 日志
pub use journal::{Journal, JournalError, JournalKind, JournalState, ReplayReport};

// 超级块
pub use superblock::{OidAllocator, OidCounter, Superblock, SuperblockAccess};

// 检查
pub use check::{CheckMode, RepairFlags};

// 导出流
pub use stream::{PackReader, PackWriter};
