//! 结构检查模式与结论

use bitflags::bitflags;

/// 检查模式
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum CheckMode {
    /// 只检查并报告
    #[default]
    Check,
    /// 修复可修复的问题
    Fix,
    /// 重建模式，和 `Fix` 一样接受不一致并安排重写
    Build,
}

impl CheckMode {
    /// 是否允许修改磁盘
    pub fn repairs(self) -> bool {
        !matches!(self, CheckMode::Check)
    }
}

bitflags! {
    /// 检查结论
    ///
    /// 多项检查的结论可以按位或合并，空集表示没有发现问题。
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
    pub struct RepairFlags: u8 {
        /// 发现的问题已修复（或已安排重写）
        const FIXED   = 0x01;
        /// 发现可修复的问题
        const FIXABLE = 0x02;
        /// 发现不可修复的问题
        const FATAL   = 0x04;
    }
}

impl RepairFlags {
    /// 没有发现任何问题
    pub fn is_clean(self) -> bool {
        self.is_empty()
    }
}
