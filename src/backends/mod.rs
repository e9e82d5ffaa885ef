pub mod local;

use std::io;

pub use local::LocalBackend;

/// Positioned, read-only access to the file being synchronized.
///
/// Readers never share a cursor: every call names its own offset, so the
/// digest streamer and the block server can each hold a source without
/// disturbing the other.
pub trait BlockSource: Send {
    /// Current length of the underlying file.
    fn len(&self) -> io::Result<u64>;

    /// Fill `buf` starting at `offset`, stopping early only at end of file.
    /// Returns the number of bytes read.
    fn read_at(&self, buf: &mut [u8], offset: u64) -> io::Result<usize>;
}
