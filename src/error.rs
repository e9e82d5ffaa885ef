use thiserror::Error;

/// Errors that abort a session.
///
/// A peer declining to proceed and a file shrinking mid-scan are not errors;
/// they show up as [`crate::Outcome`] values instead.
#[derive(Debug, Error)]
pub enum SyncError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// The input stream closed before a fixed-size field was complete.
    #[error("stream closed while reading {context}")]
    UnexpectedEof { context: &'static str },

    #[error("invalid request header: {0}")]
    InvalidHeader(String),

    #[error("unknown hash algorithm: {0:?}")]
    UnknownAlgorithm(String),

    #[error("protocol error: {0}")]
    Protocol(String),

    /// The peer asked for a block whose digest was never published.
    #[error("block {index} has not been hashed")]
    BlockNotHashed { index: u64 },

    #[error("short read on block {index}: expected {expected} bytes, got {actual}")]
    ShortRead {
        index: u64,
        expected: usize,
        actual: usize,
    },

    /// The output writer thread is gone, usually because stdout broke.
    #[error("output channel closed")]
    OutputClosed,

    #[error("{0} thread panicked")]
    WorkerPanicked(&'static str),
}

pub type Result<T> = std::result::Result<T, SyncError>;
