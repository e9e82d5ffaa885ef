//! Remote side of a block-level file synchronizer.
//!
//! The local peer connects over a duplex byte stream (usually an ssh pipe),
//! names a file, a block size and a digest algorithm, and this crate:
//! - answers with a digest of the file path and the file's current size
//! - waits for the `go` token, then streams one digest per block followed by
//!   an aggregate digest of the whole scanned range
//! - meanwhile serves the contents of any already-hashed block on request
//!
//! Both activities run on their own threads and share a single output writer,
//! so packets never interleave. Deciding which blocks differ is left entirely
//! to the peer.
//!
//! Variants:
//! - offset_supported: the header names the first block to scan
//! - concurrent_serving: off selects the older lockstep exchange
pub mod backends;
pub mod error;
pub mod hash;
pub mod protocols;
pub mod records;
pub mod server;
pub mod session;
pub mod streamer;
pub mod utils;

pub use backends::{BlockSource, LocalBackend};
pub use error::{Result, SyncError};
pub use hash::HashAlgorithm;
pub use session::{serve, Outcome, ServeOptions, SessionReport};
