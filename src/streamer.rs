//! Sequential scan that publishes one digest per block.
//!
//! The scan covers `start_block * block_size .. observed_size` using the size
//! observed during the handshake, not the size the peer declared. Every block
//! is full-sized except possibly the last, which is never empty. A block that
//! comes back short (the file shrank, or the read failed) ends the scan with an
//! error packet and no terminal digest.

use std::sync::Arc;

use log::{debug, info, warn};

use crate::backends::BlockSource;
use crate::error::{Result, SyncError};
use crate::hash::{HashAlgorithm, Hasher};
use crate::protocols::{Packet, PacketSender};
use crate::records::BlockRecords;
use crate::utils::{short_hex, size_to_human_readable};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ScanPlan {
    pub start_block: u64,
    pub block_size: u64,
    /// File size reported in the handshake.
    pub observed_size: u64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScanOutcome {
    /// Terminal digest sent.
    Finished { blocks: u64, bytes: u64 },
    /// Error packet sent after `blocks` good blocks.
    Truncated { blocks: u64, bytes: u64 },
}

pub struct DigestStreamer<S> {
    source: S,
    algorithm: HashAlgorithm,
    plan: ScanPlan,
    records: Arc<BlockRecords>,
}

/// Closes the record list however the scan ends, so a waiting block server
/// never sleeps forever.
struct CloseOnDrop<'a>(&'a BlockRecords);

impl Drop for CloseOnDrop<'_> {
    fn drop(&mut self) {
        self.0.close();
    }
}

impl<S: BlockSource> DigestStreamer<S> {
    pub fn new(
        source: S,
        algorithm: HashAlgorithm,
        plan: ScanPlan,
        records: Arc<BlockRecords>,
    ) -> Self {
        Self {
            source,
            algorithm,
            plan,
            records,
        }
    }

    pub fn run(self, out: &PacketSender) -> Result<ScanOutcome> {
        self.run_with(out, |_, _| Ok(None))
    }

    /// Like [`run`](Self::run), but calls `after_block` with each block and
    /// the running aggregate right after its digest packet. A returned packet
    /// is sent before the scan moves on.
    pub fn run_with<F>(self, out: &PacketSender, mut after_block: F) -> Result<ScanOutcome>
    where
        F: FnMut(&[u8], &Hasher) -> Result<Option<Packet>>,
    {
        let records = Arc::clone(&self.records);
        let _close = CloseOnDrop(&records);

        let ScanPlan {
            start_block,
            block_size,
            observed_size,
        } = self.plan;
        let start = start_block.checked_mul(block_size).ok_or_else(|| {
            SyncError::InvalidHeader(format!(
                "start block {start_block} overflows at block size {block_size}"
            ))
        })?;

        if start > observed_size {
            warn!("Scan start {} is past end of file ({})", start, observed_size);
            out.send(Packet::Error)?;
            return Ok(ScanOutcome::Truncated {
                blocks: 0,
                bytes: 0,
            });
        }

        let block_len = usize::try_from(block_size)
            .map_err(|_| SyncError::InvalidHeader(format!("block size {block_size} too large")))?;
        let mut buf = vec![0u8; block_len];
        let mut aggregate = self.algorithm.hasher();
        let mut offset = start;
        let mut remaining = observed_size - start;
        let mut blocks = 0u64;

        info!(
            "Scanning {} from block {} in {} blocks",
            size_to_human_readable(remaining),
            start_block,
            size_to_human_readable(block_size)
        );

        while remaining > 0 {
            let want = remaining.min(block_size) as usize;
            let got = match self.source.read_at(&mut buf[..want], offset) {
                Ok(n) => n,
                Err(e) => {
                    warn!("Read failed at offset {}: {}", offset, e);
                    0
                }
            };
            if got != want {
                warn!(
                    "Block {} came back short ({} of {} bytes); file changed during scan",
                    start_block + blocks,
                    got,
                    want
                );
                out.send(Packet::Error)?;
                return Ok(ScanOutcome::Truncated {
                    blocks,
                    bytes: offset - start,
                });
            }

            let block = &buf[..want];
            aggregate.update(block);
            let digest = self.algorithm.digest(block);
            debug!("Block {} digest {}", start_block + blocks, short_hex(&digest));
            // Queue the digest packet first so a served block never reaches
            // the wire ahead of its own digest.
            out.send(Packet::Digest(digest.clone()))?;
            self.records.push(digest);

            if let Some(packet) = after_block(block, &aggregate)? {
                out.send(packet)?;
            }

            offset += want as u64;
            remaining -= want as u64;
            blocks += 1;
        }

        out.send(Packet::Terminal(aggregate.finalize()))?;
        info!("Scan finished after {} blocks", blocks);
        Ok(ScanOutcome::Finished {
            blocks,
            bytes: offset - start,
        })
    }
}
