//! One request from handshake to the last packet.

use std::io::{Read, Write};
use std::sync::Arc;
use std::thread;

use crossbeam_channel::unbounded;
use log::{debug, info};

use crate::backends::{BlockSource, LocalBackend};
use crate::error::{Result, SyncError};
use crate::protocols::header::{read_full, SEND_TAG};
use crate::protocols::{
    read_proceed, write_response, OutputWriter, Packet, PacketSender, RequestHeader,
};
use crate::records::BlockRecords;
use crate::server::BlockServer;
use crate::streamer::{DigestStreamer, ScanOutcome, ScanPlan};
use crate::utils::{short_hex, size_to_human_readable};

/// Knobs for the protocol variants a peer may speak.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServeOptions {
    /// The header carries a start block offset.
    pub offset_supported: bool,
    /// Serve blocks from a separate thread while the scan runs. When off,
    /// the peer answers each digest packet in lockstep.
    pub concurrent_serving: bool,
    /// Packets that may wait for the output writer before producers block.
    pub queue_depth: usize,
}

impl Default for ServeOptions {
    fn default() -> Self {
        Self {
            offset_supported: true,
            concurrent_serving: true,
            queue_depth: 64,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
    /// The peer did not send the proceed token.
    Declined,
    Finished { blocks: u64, bytes: u64 },
    /// The file shrank mid-scan and an error packet was sent.
    Truncated { blocks: u64, bytes: u64 },
}

impl From<ScanOutcome> for Outcome {
    fn from(outcome: ScanOutcome) -> Self {
        match outcome {
            ScanOutcome::Finished { blocks, bytes } => Outcome::Finished { blocks, bytes },
            ScanOutcome::Truncated { blocks, bytes } => Outcome::Truncated { blocks, bytes },
        }
    }
}

#[derive(Debug)]
pub struct SessionReport<W> {
    pub outcome: Outcome,
    pub blocks_served: u64,
    /// The output stream, handed back once every packet is written.
    pub output: W,
}

enum Finished {
    Streamer(Result<ScanOutcome>),
    Server(Result<u64>),
}

/// Run a full session over `input` and `output`.
///
/// The handshake is written straight to `output`; after the proceed token
/// the stream moves into the output writer thread. The first fatal error is
/// returned as soon as it happens, without waiting for the other unit.
pub fn serve<R, W>(mut input: R, mut output: W, options: &ServeOptions) -> Result<SessionReport<W>>
where
    R: Read + Send + 'static,
    W: Write + Send + 'static,
{
    let header = RequestHeader::read_from(&mut input, options.offset_supported)?;
    let algorithm = header.algorithm()?;
    let path = header.path();
    info!(
        "Request for {:?}: {} blocks from block {}, {}",
        path,
        size_to_human_readable(header.block_size),
        header.start_block_offset,
        algorithm
    );

    let sanity_hash = algorithm.digest(&header.file_path);
    let observed_size = LocalBackend::open(&path)?.len()?;
    write_response(&mut output, &sanity_hash, observed_size)?;
    debug!(
        "Sent sanity hash {} and size {}",
        short_hex(&sanity_hash),
        observed_size
    );

    if !read_proceed(&mut input)? {
        info!("Peer declined to proceed");
        return Ok(SessionReport {
            outcome: Outcome::Declined,
            blocks_served: 0,
            output,
        });
    }

    let records = Arc::new(BlockRecords::new(header.start_block_offset));
    let streamer = DigestStreamer::new(
        LocalBackend::open(&path)?,
        algorithm,
        ScanPlan {
            start_block: header.start_block_offset,
            block_size: header.block_size,
            observed_size,
        },
        Arc::clone(&records),
    );
    let (sender, writer) = OutputWriter::spawn(output, options.queue_depth);

    let (outcome, blocks_served) = if options.concurrent_serving {
        let read_bound = match header.declared_remote_size {
            0 => observed_size,
            declared => declared,
        };
        let server = BlockServer::new(
            LocalBackend::open(&path)?,
            header.block_size,
            read_bound,
            records,
        );
        run_concurrent(streamer, server, input, sender)?
    } else {
        run_lockstep(streamer, input, sender)?
    };

    let output = writer.join()?;
    info!("Session complete: {:?}, {} blocks served", outcome, blocks_served);
    Ok(SessionReport {
        outcome: outcome.into(),
        blocks_served,
        output,
    })
}

fn run_concurrent<S, R>(
    streamer: DigestStreamer<S>,
    server: BlockServer<S>,
    mut input: R,
    sender: PacketSender,
) -> Result<(ScanOutcome, u64)>
where
    S: BlockSource + 'static,
    R: Read + Send + 'static,
{
    let (done_tx, done_rx) = unbounded();

    let streamer_handle = {
        let sender = sender.clone();
        let done_tx = done_tx.clone();
        thread::spawn(move || {
            let result = streamer.run(&sender);
            let _ = done_tx.send(Finished::Streamer(result));
        })
    };
    let server_handle = {
        let sender = sender.clone();
        let done_tx = done_tx.clone();
        thread::spawn(move || {
            let result = server.run(&mut input, &sender);
            let _ = done_tx.send(Finished::Server(result));
        })
    };
    drop(sender);
    drop(done_tx);

    let mut outcome = None;
    let mut served = None;
    while outcome.is_none() || served.is_none() {
        match done_rx.recv() {
            Ok(Finished::Streamer(result)) => {
                let scanned = result?;
                debug!("Digest streamer done: {:?}", scanned);
                outcome = Some(scanned);
            }
            Ok(Finished::Server(result)) => {
                let count = result?;
                debug!("Block server done after {} blocks", count);
                served = Some(count);
            }
            // Both senders dropped without reporting: a unit panicked.
            Err(_) => break,
        }
    }

    streamer_handle
        .join()
        .map_err(|_| SyncError::WorkerPanicked("digest streamer"))?;
    server_handle
        .join()
        .map_err(|_| SyncError::WorkerPanicked("block server"))?;

    match (outcome, served) {
        (Some(outcome), Some(served)) => Ok((outcome, served)),
        _ => Err(SyncError::WorkerPanicked("session")),
    }
}

/// Single-threaded variant: after every digest packet the peer sends one
/// 4-byte tag, and `send` asks for that block right away. The reply carries
/// the running aggregate digest rather than the block digest.
fn run_lockstep<S, R>(
    streamer: DigestStreamer<S>,
    mut input: R,
    sender: PacketSender,
) -> Result<(ScanOutcome, u64)>
where
    S: BlockSource,
    R: Read,
{
    let mut served = 0u64;
    let outcome = streamer.run_with(&sender, |block, aggregate| {
        let mut tag = [0u8; 4];
        if read_full(&mut input, &mut tag)? == tag.len() && &tag == SEND_TAG {
            served += 1;
            return Ok(Some(Packet::Block {
                data: block.to_vec(),
                digest: aggregate.snapshot(),
            }));
        }
        Ok(None)
    })?;
    drop(sender);
    Ok((outcome, served))
}
