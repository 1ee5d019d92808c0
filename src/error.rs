//! 错误类型定义
//!
//! 存储核心只区分四类失败：
//! - I/O 错误：设备读写失败，对当前调用致命，内部从不重试
//! - 结构错误：魔数错误、校验和不符、越界或重复/成环的块引用
//! - 资源错误：内存分配失败
//! - 策略情形：短分配、重复释放，这些不是错误，不经过本类型

use core::fmt;

/// 存储核心操作错误
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Error {
    kind: ErrorKind,
    message: &'static str,
    block: Option<u64>,
}

/// 错误类别
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[non_exhaustive]
pub enum ErrorKind {
    /// I/O 错误
    Io,
    /// 无效参数
    InvalidInput,
    /// 磁盘结构损坏
    Corrupted,
    /// 空间不足
    NoSpace,
    /// 内存不足
    NoMemory,
    /// 不支持的操作
    Unsupported,
    /// 无效状态
    InvalidState,
}

impl Error {
    /// 创建新错误
    pub const fn new(kind: ErrorKind, message: &'static str) -> Self {
        Self {
            kind,
            message,
            block: None,
        }
    }

    /// 创建定位到某个块的错误
    ///
    /// 结构错误总是带上出问题的块地址，便于日志和修复工具定位。
    pub const fn at(kind: ErrorKind, message: &'static str, block: u64) -> Self {
        Self {
            kind,
            message,
            block: Some(block),
        }
    }

    /// 结构错误的简写
    pub const fn corrupted(message: &'static str, block: u64) -> Self {
        Self::at(ErrorKind::Corrupted, message, block)
    }

    /// 获取错误类型
    pub const fn kind(&self) -> ErrorKind {
        self.kind
    }

    /// 获取错误消息
    pub const fn message(&self) -> &'static str {
        self.message
    }

    /// 出错的块地址（若已知）
    pub const fn block(&self) -> Option<u64> {
        self.block
    }

    /// 为尚未定位的错误补上块地址
    pub fn with_block(mut self, block: u64) -> Self {
        if self.block.is_none() {
            self.block = Some(block);
        }
        self
    }
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.block {
            Some(blk) => write!(f, "{:?}: {} (block {})", self.kind, self.message, blk),
            None => write!(f, "{:?}: {}", self.kind, self.message),
        }
    }
}

#[cfg(feature = "std")]
impl std::error::Error for Error {}

impl From<alloc::collections::TryReserveError> for Error {
    fn from(_: alloc::collections::TryReserveError) -> Self {
        Error::new(ErrorKind::NoMemory, "out of memory")
    }
}

impl From<crate::journal::JournalError> for Error {
    fn from(err: crate::journal::JournalError) -> Self {
        use crate::journal::JournalError;
        match err {
            JournalError::BadMagic(blk) => Error::corrupted("Bad journal block magic", blk),
            JournalError::OutOfRange(blk) => Error::corrupted("Journal block out of range", blk),
            JournalError::Cycle(blk) => Error::corrupted("Journal block chain loops", blk),
            JournalError::BadStream => Error::new(ErrorKind::Corrupted, "Bad journal pack stream"),
        }
    }
}

/// Result 类型别名
pub type Result<T> = core::result::Result<T, Error>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_block_attached_once() {
        let err = Error::new(ErrorKind::Io, "read failed").with_block(7);
        assert_eq!(err.block(), Some(7));
        let err = err.with_block(9);
        assert_eq!(err.block(), Some(7));
    }

    #[test]
    fn test_journal_error_mapping() {
        let err: Error = crate::journal::JournalError::Cycle(42).into();
        assert_eq!(err.kind(), ErrorKind::Corrupted);
        assert_eq!(err.block(), Some(42));

        let err: Error = crate::journal::JournalError::BadStream.into();
        assert_eq!(err.kind(), ErrorKind::Corrupted);
        assert_eq!(err.block(), None);
    }
}
