//! Request header, handshake response and request framing.
//!
//! All integers are little-endian u64. The header is
//! `remote_size, block_size, [start_block_offset], filename_len, hashname_len`
//! followed by the filename and hash name bytes. The start offset is only
//! present in the offset-capable layout.

use std::io::{self, Read, Write};
use std::path::PathBuf;

use crate::error::{Result, SyncError};
use crate::hash::HashAlgorithm;

/// Sent by the peer after the handshake to start streaming.
pub const PROCEED_TOKEN: &[u8; 2] = b"go";
/// Tag of a block request.
pub const SEND_TAG: &[u8; 4] = b"send";

pub const MAX_BLOCK_SIZE: u64 = 256 << 20;
pub const MAX_FILENAME_LEN: u64 = 64 << 10;
pub const MAX_HASHNAME_LEN: u64 = 256;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RequestHeader {
    /// The peer's idea of the file size. Only bounds served blocks.
    pub declared_remote_size: u64,
    pub block_size: u64,
    pub start_block_offset: u64,
    pub file_path: Vec<u8>,
    pub hash_name: String,
}

impl RequestHeader {
    pub fn read_from<R: Read>(reader: &mut R, offset_supported: bool) -> Result<Self> {
        let declared_remote_size = read_u64(reader, "remote size")?;
        let block_size = read_u64(reader, "block size")?;
        let start_block_offset = if offset_supported {
            read_u64(reader, "start block offset")?
        } else {
            0
        };
        let filename_len = read_u64(reader, "filename length")?;
        let hashname_len = read_u64(reader, "hash name length")?;

        if block_size == 0 {
            return Err(SyncError::InvalidHeader("block size is zero".into()));
        }
        if block_size > MAX_BLOCK_SIZE {
            return Err(SyncError::InvalidHeader(format!(
                "block size {block_size} exceeds {MAX_BLOCK_SIZE}"
            )));
        }
        if filename_len > MAX_FILENAME_LEN {
            return Err(SyncError::InvalidHeader(format!(
                "filename length {filename_len} exceeds {MAX_FILENAME_LEN}"
            )));
        }
        if hashname_len > MAX_HASHNAME_LEN {
            return Err(SyncError::InvalidHeader(format!(
                "hash name length {hashname_len} exceeds {MAX_HASHNAME_LEN}"
            )));
        }

        let file_path = read_bytes(reader, filename_len as usize, "filename")?;
        let hash_name = String::from_utf8(read_bytes(reader, hashname_len as usize, "hash name")?)
            .map_err(|_| SyncError::InvalidHeader("hash name is not UTF-8".into()))?;

        Ok(Self {
            declared_remote_size,
            block_size,
            start_block_offset,
            file_path,
            hash_name,
        })
    }

    /// Encode the header as a peer would send it.
    pub fn write_to<W: Write>(&self, writer: &mut W, offset_supported: bool) -> io::Result<()> {
        writer.write_all(&self.declared_remote_size.to_le_bytes())?;
        writer.write_all(&self.block_size.to_le_bytes())?;
        if offset_supported {
            writer.write_all(&self.start_block_offset.to_le_bytes())?;
        }
        writer.write_all(&(self.file_path.len() as u64).to_le_bytes())?;
        writer.write_all(&(self.hash_name.len() as u64).to_le_bytes())?;
        writer.write_all(&self.file_path)?;
        writer.write_all(self.hash_name.as_bytes())
    }

    pub fn algorithm(&self) -> Result<HashAlgorithm> {
        self.hash_name.parse()
    }

    #[cfg(unix)]
    pub fn path(&self) -> PathBuf {
        use std::ffi::OsStr;
        use std::os::unix::ffi::OsStrExt;
        PathBuf::from(OsStr::from_bytes(&self.file_path))
    }

    #[cfg(not(unix))]
    pub fn path(&self) -> PathBuf {
        PathBuf::from(String::from_utf8_lossy(&self.file_path).into_owned())
    }
}

/// Write the sanity hash and observed size, then flush.
pub fn write_response<W: Write>(
    writer: &mut W,
    sanity_hash: &[u8],
    observed_size: u64,
) -> io::Result<()> {
    writer.write_all(sanity_hash)?;
    writer.write_all(&observed_size.to_le_bytes())?;
    writer.flush()
}

/// True only if the peer sent exactly the proceed token. A closed stream
/// counts as declining.
pub fn read_proceed<R: Read>(reader: &mut R) -> io::Result<bool> {
    let mut token = [0u8; 2];
    let n = read_full(reader, &mut token)?;
    Ok(n == token.len() && &token == PROCEED_TOKEN)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Request {
    Send { index: u64 },
}

/// Read the next block request. `None` means the peer closed its side.
pub fn read_request<R: Read>(reader: &mut R) -> Result<Option<Request>> {
    let mut tag = [0u8; 4];
    match read_full(reader, &mut tag)? {
        0 => return Ok(None),
        4 => {}
        n => {
            return Err(SyncError::Protocol(format!(
                "truncated request tag {:?}",
                String::from_utf8_lossy(&tag[..n])
            )))
        }
    }
    if &tag != SEND_TAG {
        return Err(SyncError::Protocol(format!(
            "unknown request tag {:?}",
            String::from_utf8_lossy(&tag)
        )));
    }
    let index = read_u64(reader, "block index")?;
    Ok(Some(Request::Send { index }))
}

/// Fill `buf` unless the stream ends first. Returns how much was filled.
pub(crate) fn read_full<R: Read>(reader: &mut R, buf: &mut [u8]) -> io::Result<usize> {
    let mut filled = 0;
    while filled < buf.len() {
        match reader.read(&mut buf[filled..]) {
            Ok(0) => break,
            Ok(n) => filled += n,
            Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
            Err(e) => return Err(e),
        }
    }
    Ok(filled)
}

fn read_u64<R: Read>(reader: &mut R, context: &'static str) -> Result<u64> {
    let mut raw = [0u8; 8];
    if read_full(reader, &mut raw)? != raw.len() {
        return Err(SyncError::UnexpectedEof { context });
    }
    Ok(u64::from_le_bytes(raw))
}

fn read_bytes<R: Read>(reader: &mut R, len: usize, context: &'static str) -> Result<Vec<u8>> {
    let mut buf = vec![0u8; len];
    if read_full(reader, &mut buf)? != len {
        return Err(SyncError::UnexpectedEof { context });
    }
    Ok(buf)
}
