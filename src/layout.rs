//! 磁盘布局与几何参数
//!
//! ```text
//! 0                MASTER_OFFSET
//! ├── 保留区 ──────┤ master │ format │ bitmap#0 │ jheader │ jfooter │ 数据 ...
//! ```
//!
//! 第 i 个（i > 0）位图块位于 `i * bits_per_block`，即它所描述区段的第一个块。

use crate::{
    balloc::BitmapAllocator,
    bitmap::Bitmap,
    consts::*,
    error::{Error, ErrorKind, Result},
};

/// 布局遍历给出的块类别
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BlockKind {
    /// 位图块
    Bitmap,
    /// 日志头
    JournalHeader,
    /// 日志尾
    JournalFooter,
    /// 事务头
    TxHeader,
    /// 日志记录
    LogRecord,
    /// wandered 块
    Wandered,
}

/// 块大小必须是 `[512, 65536]` 内的 2 的幂
pub fn check_block_size(block_size: u32) -> Result<()> {
    if !block_size.is_power_of_two() || !(MIN_BLOCK_SIZE..=MAX_BLOCK_SIZE).contains(&block_size) {
        return Err(Error::new(ErrorKind::InvalidInput, "Invalid block size"));
    }
    Ok(())
}

/// 设备几何参数
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Geometry {
    /// 块大小（字节）
    pub block_size: u32,
    /// 总块数
    pub block_count: u64,
}

impl Geometry {
    /// 创建并校验几何参数
    ///
    /// 块大小见 [`check_block_size`]，块数必须大于 0。
    pub fn new(block_size: u32, block_count: u64) -> Result<Self> {
        check_block_size(block_size)?;
        if block_count == 0 {
            return Err(Error::new(ErrorKind::InvalidInput, "Empty device"));
        }
        Ok(Self {
            block_size,
            block_count,
        })
    }

    /// master 块地址
    pub fn master_block(&self) -> u64 {
        MASTER_OFFSET / self.block_size as u64
    }

    /// 格式超级块地址
    pub fn format_block(&self) -> u64 {
        self.master_block() + FORMAT_BLOCK_DELTA
    }

    /// 第一个位图块地址
    pub fn bitmap_start(&self) -> u64 {
        self.master_block() + BITMAP_BLOCK_DELTA
    }

    /// 每个位图块描述的块数：`(block_size - 4) * 8`
    pub fn bits_per_block(&self) -> u64 {
        (self.block_size as u64 - BITMAP_SUM_SIZE as u64) * 8
    }

    /// 位图块个数：`ceil(block_count / bits_per_block)`
    pub fn bitmap_blocks(&self) -> u64 {
        self.block_count.div_ceil(self.bits_per_block())
    }

    /// 第 `index` 个位图块的地址
    pub fn bitmap_block(&self, index: u64) -> u64 {
        if index == 0 {
            self.bitmap_start()
        } else {
            index * self.bits_per_block()
        }
    }

    /// 标准日志区域
    pub fn journal_area(&self) -> JournalArea {
        JournalArea::standard(self.block_size)
    }
}

/// 日志头/尾所在的两个固定块
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct JournalArea {
    /// 日志头块
    pub header: u64,
    /// 日志尾块
    pub footer: u64,
}

impl JournalArea {
    /// 按块大小计算标准位置（紧随第一个位图块之后）
    pub fn standard(block_size: u32) -> Self {
        let master = MASTER_OFFSET / block_size as u64;
        Self {
            header: master + JOURNAL_HEADER_DELTA,
            footer: master + JOURNAL_FOOTER_DELTA,
        }
    }
}

impl Default for JournalArea {
    fn default() -> Self {
        Self::standard(DEFAULT_BLOCK_SIZE)
    }
}

/// 生成固定元数据位图
///
/// 标记保留区、master、格式块、日志头/尾以及全部位图块。
/// 日志结构检查用它判断一个日志块是否落在了不可触碰的位置上。
pub fn fixed_metadata(geom: &Geometry) -> Result<Bitmap> {
    let mut fixed = Bitmap::new(geom.block_count)?;

    let area = geom.journal_area();
    let head = (area.footer + 1).min(geom.block_count);
    fixed.mark_region(0, head)?;

    for (blk, _) in BitmapAllocator::layout_of(geom) {
        if blk < geom.block_count {
            fixed.mark(blk)?;
        }
    }

    Ok(fixed)
}
