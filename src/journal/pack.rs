//! 日志导出/导入
//!
//! 导出流是一串 `[4 字节签名][u64 地址][block_size 字节内容]` 记录：
//! 先是日志头和日志尾，然后按事务链依次是事务头、日志记录和 wandered 块。
//! 被多个事务共享的块只导出一次。

use super::{
    format::{JournalFooter, JournalHeader},
    walk, Journal, JournalError,
};
use crate::{
    block::{BlockDev, BlockDevice},
    consts::*,
    error::Result,
    layout::{self, BlockKind, JournalArea},
    stream::{PackReader, PackWriter},
};
use alloc::{collections::BTreeSet, vec};
use log::*;

fn write_record(out: &mut PackWriter, sign: &[u8; 4], blk: u64, data: &[u8]) {
    out.write_sign(sign);
    out.write_u64(blk);
    out.write_bytes(data);
}

fn read_record<'a>(
    input: &mut PackReader<'a>,
    sign: &[u8; 4],
    block_size: usize,
) -> Result<(u64, &'a [u8])> {
    if input.read_sign()? != *sign {
        return Err(JournalError::BadStream.into());
    }
    let blk = input.read_u64()?;
    Ok((blk, input.read_bytes(block_size)?))
}

fn is_block_sign(sign: &[u8; 4]) -> bool {
    sign == PACK_SIGN_TXH || sign == PACK_SIGN_LGR || sign == PACK_SIGN_WANDERED
}

impl Journal {
    /// 导出日志头、日志尾以及所有待重放事务引用的块
    ///
    /// 日志头/尾取内存中的值。遍历中遇到结构错误时导出失败。
    pub fn pack<D: BlockDevice>(&self, bdev: &mut BlockDev<D>, out: &mut PackWriter) -> Result<()> {
        let bs = self.block_size as usize;
        let mut buf = vec![0u8; bs];

        self.header.encode(&mut buf);
        write_record(out, PACK_SIGN_HEADER, self.area.header, &buf);
        self.footer.encode(&mut buf);
        write_record(out, PACK_SIGN_FOOTER, self.area.footer, &buf);

        let mut visited = BTreeSet::new();
        let mut blocks = self.tx_layout();
        let mut count = 0u64;
        while let Some((blk, kind)) = blocks.advance(bdev)? {
            let sign = match kind {
                BlockKind::TxHeader => {
                    count += 1;
                    PACK_SIGN_TXH
                }
                BlockKind::LogRecord => PACK_SIGN_LGR,
                _ => PACK_SIGN_WANDERED,
            };
            if visited.insert(blk) {
                let data = walk::read_journal_block(bdev, blk)?;
                write_record(out, sign, blk, &data);
            }
        }

        debug!("[journal] packed {} transactions", count);
        Ok(())
    }

    /// 从导出流读回日志头和日志尾
    ///
    /// 返回的日志是脏的，`sync` 后写到流中记录的位置。
    /// 流中后续的块记录不被消费，可交给 [`Journal::restore_blocks`]。
    pub fn unpack(input: &mut PackReader<'_>, block_size: u32) -> Result<Self> {
        layout::check_block_size(block_size)?;
        let bs = block_size as usize;
        let (hblk, hdata) = read_record(input, PACK_SIGN_HEADER, bs)?;
        let (fblk, fdata) = read_record(input, PACK_SIGN_FOOTER, bs)?;

        Ok(Self {
            area: JournalArea {
                header: hblk,
                footer: fblk,
            },
            block_size,
            header: JournalHeader::decode(hdata),
            footer: JournalFooter::decode(fdata),
            dirty: true,
        })
    }

    /// 把流中剩余的事务头、日志记录、wandered 块写回各自地址
    ///
    /// 遇到其他签名或流结束时停止，返回写入的块数。
    pub fn restore_blocks<D: BlockDevice>(
        input: &mut PackReader<'_>,
        bdev: &mut BlockDev<D>,
    ) -> Result<u64> {
        let bs = bdev.block_size() as usize;
        let mut count = 0;

        while let Some(sign) = input.peek_sign() {
            if !is_block_sign(&sign) {
                break;
            }
            let (blk, data) = read_record(input, &sign, bs)?;
            bdev.write_block(blk, data)?;
            count += 1;
        }

        debug!("[journal] restored {} blocks", count);
        Ok(count)
    }
}
