//! Streaming packets and the single writer that owns the output stream.
//!
//! Producers never touch the output directly. They hand whole packets to
//! [`PacketSender`], and one writer thread encodes them in arrival order, so
//! two packets can never interleave on the wire.

use std::io::{self, Write};
use std::thread::{self, JoinHandle};

use crossbeam_channel::{bounded, Receiver, Sender};
use log::debug;

use crate::error::{Result, SyncError};

pub const TAG_DIGEST: u8 = b'd';
pub const TAG_BLOCK: u8 = b'b';
pub const TAG_TERMINAL: u8 = b't';
pub const TAG_ERROR: u8 = b'x';

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Packet {
    /// Digest of the next scanned block.
    Digest(Vec<u8>),
    /// Requested block contents followed by a digest.
    Block { data: Vec<u8>, digest: Vec<u8> },
    /// Aggregate digest over the whole scan range.
    Terminal(Vec<u8>),
    /// The scan ended early.
    Error,
}

impl Packet {
    pub fn tag(&self) -> u8 {
        match self {
            Packet::Digest(_) => TAG_DIGEST,
            Packet::Block { .. } => TAG_BLOCK,
            Packet::Terminal(_) => TAG_TERMINAL,
            Packet::Error => TAG_ERROR,
        }
    }

    pub fn write_to<W: Write>(&self, writer: &mut W) -> io::Result<()> {
        writer.write_all(&[self.tag()])?;
        match self {
            Packet::Digest(digest) | Packet::Terminal(digest) => writer.write_all(digest),
            Packet::Block { data, digest } => {
                writer.write_all(data)?;
                writer.write_all(digest)
            }
            Packet::Error => Ok(()),
        }
    }
}

/// Cloneable handle used by the streamer and the block server.
#[derive(Debug, Clone)]
pub struct PacketSender {
    tx: Sender<Packet>,
}

impl PacketSender {
    pub fn send(&self, packet: Packet) -> Result<()> {
        self.tx.send(packet).map_err(|_| SyncError::OutputClosed)
    }
}

/// The thread that owns the output stream.
pub struct OutputWriter<W> {
    handle: JoinHandle<io::Result<W>>,
}

impl<W: Write + Send + 'static> OutputWriter<W> {
    /// Start the writer. `queue_depth` bounds how many packets may be
    /// waiting before producers block.
    pub fn spawn(writer: W, queue_depth: usize) -> (PacketSender, Self) {
        let (tx, rx) = bounded(queue_depth.max(1));
        let handle = thread::spawn(move || write_loop(writer, rx));
        (PacketSender { tx }, Self { handle })
    }

    /// Wait for every sender to drop and the queue to drain, then hand the
    /// stream back.
    pub fn join(self) -> Result<W> {
        match self.handle.join() {
            Ok(result) => Ok(result?),
            Err(_) => Err(SyncError::WorkerPanicked("output writer")),
        }
    }
}

fn write_loop<W: Write>(mut writer: W, rx: Receiver<Packet>) -> io::Result<W> {
    let mut written = 0u64;
    while let Ok(packet) = rx.recv() {
        packet.write_to(&mut writer)?;
        written += 1;
        // Only flush when nothing else is queued; the peer waits on each
        // packet, but bursts can share a flush.
        if rx.is_empty() {
            writer.flush()?;
        }
    }
    writer.flush()?;
    debug!("Output writer exiting after {} packets", written);
    Ok(writer)
}
