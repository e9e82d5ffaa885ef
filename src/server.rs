//! On-demand block responder.
//!
//! Runs next to the digest streamer and answers `send` requests until the
//! peer closes its side of the stream. Each answer carries the block bytes
//! and the digest the streamer recorded for that block.

use std::io::Read;
use std::sync::Arc;

use log::{debug, info};

use crate::backends::BlockSource;
use crate::error::{Result, SyncError};
use crate::protocols::{read_request, Packet, PacketSender, Request};
use crate::records::BlockRecords;

pub struct BlockServer<S> {
    source: S,
    block_size: u64,
    /// Upper bound for served reads: the size the peer declared, or the
    /// observed size when the peer declared zero.
    read_bound: u64,
    records: Arc<BlockRecords>,
}

impl<S: BlockSource> BlockServer<S> {
    pub fn new(source: S, block_size: u64, read_bound: u64, records: Arc<BlockRecords>) -> Self {
        Self {
            source,
            block_size,
            read_bound,
            records,
        }
    }

    /// Serve requests until end of input. Returns the number of blocks sent.
    pub fn run<R: Read>(&self, input: &mut R, out: &PacketSender) -> Result<u64> {
        let mut served = 0u64;
        while let Some(request) = read_request(input)? {
            match request {
                Request::Send { index } => {
                    let packet = self.serve(index)?;
                    out.send(packet)?;
                    served += 1;
                }
            }
        }
        info!("Peer closed request stream after {} blocks served", served);
        Ok(served)
    }

    /// Build the block packet for `index`. Waits until the streamer has
    /// published the block's digest.
    pub fn serve(&self, index: u64) -> Result<Packet> {
        let offset = index.checked_mul(self.block_size).ok_or_else(|| {
            SyncError::Protocol(format!("block index {index} overflows the file offset"))
        })?;
        let len = self.read_bound.saturating_sub(offset).min(self.block_size) as usize;
        if len == 0 {
            return Err(SyncError::Protocol(format!(
                "block {index} starts past the remote size {}",
                self.read_bound
            )));
        }

        let digest = self.records.wait_for(index)?;

        let mut data = vec![0u8; len];
        let actual = self.source.read_at(&mut data, offset)?;
        if actual != len {
            return Err(SyncError::ShortRead {
                index,
                expected: len,
                actual,
            });
        }
        debug!("Serving block {} ({} bytes)", index, len);
        Ok(Packet::Block { data, digest })
    }
}
