//! 日志文本转储

use super::{
    walk::{LogWalk, TxWalk},
    Journal,
};
use crate::{
    block::{BlockDev, BlockDevice},
    error::{Error, ErrorKind, Result},
};
use core::fmt::Write;

fn fmt_err(_: core::fmt::Error) -> Error {
    Error::new(ErrorKind::Io, "Formatter error")
}

impl Journal {
    /// 输出日志头、日志尾和每个待重放事务（从新到旧）
    pub fn print<D: BlockDevice, W: Write>(&self, bdev: &mut BlockDev<D>, out: &mut W) -> Result<()> {
        let snap = &self.footer.snapshot;
        writeln!(out, "journal header (block {}):", self.area.header).map_err(fmt_err)?;
        writeln!(out, "  last committed: {}", self.header.last_committed).map_err(fmt_err)?;
        writeln!(out, "journal footer (block {}):", self.area.footer).map_err(fmt_err)?;
        writeln!(out, "  last flushed:   {}", self.footer.last_flushed).map_err(fmt_err)?;
        writeln!(
            out,
            "  free blocks: {}, used oids: {}, next oid: {}",
            snap.free_blocks, snap.used_oids, snap.next_oid
        )
        .map_err(fmt_err)?;

        let mut txs = TxWalk::new(self.header.last_committed, self.footer.last_flushed);
        while let Some(tx) = txs.advance(bdev)? {
            let h = &tx.header;
            writeln!(
                out,
                "transaction {} (block {}): total {}, prev {}, next log {}",
                h.id, tx.addr, h.total, h.prev_tx, h.next_log
            )
            .map_err(fmt_err)?;

            let mut logs = LogWalk::new(&tx);
            while let Some((blk, lgr)) = logs.advance(bdev)? {
                writeln!(
                    out,
                    "  log record {}/{} (block {}): next {}, {} entries",
                    lgr.serial,
                    lgr.total,
                    blk,
                    lgr.next_log,
                    lgr.entries.len()
                )
                .map_err(fmt_err)?;
                for e in &lgr.entries {
                    writeln!(out, "    {} -> {}", e.wandered, e.original).map_err(fmt_err)?;
                }
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{block::MockDevice, journal::testutil::*, layout::JournalArea};
    use alloc::string::String;

    #[test]
    fn test_print() {
        let area = JournalArea::standard(512);
        let mut bdev = BlockDev::new(MockDevice::new(400, 512)).unwrap();
        write_tx(&mut bdev, 300, 0, 7, &[(301, &[(10, 50), (11, 51)])]);
        set_pointers(&mut bdev, area, 300, 0);

        let journal = Journal::open(&mut bdev, area).unwrap();
        let mut text = String::new();
        journal.print(&mut bdev, &mut text).unwrap();

        assert!(text.contains("last committed: 300"));
        assert!(text.contains("transaction 7 (block 300): total 2, prev 0, next log 301"));
        assert!(text.contains("log record 0/1 (block 301): next 300, 2 entries"));
        assert!(text.contains("    50 -> 10\n    51 -> 11\n"));
    }
}
