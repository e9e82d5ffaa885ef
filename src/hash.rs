//! Named digest algorithms.
//!
//! The peer picks the algorithm by name in the request header. Names follow
//! the hashlib spelling (`sha256`, `sha3_256`, `blake2b`, ...) and are matched
//! case-insensitively. Digest lengths are fixed per algorithm and never sent
//! on the wire.

use std::fmt;
use std::str::FromStr;

use digest::DynDigest;

use crate::error::SyncError;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HashAlgorithm {
    Md5,
    Sha1,
    Sha224,
    Sha256,
    Sha384,
    Sha512,
    Sha3_256,
    Sha3_512,
    Blake2b,
    Blake2s,
    Blake3,
}

impl HashAlgorithm {
    pub const ALL: [HashAlgorithm; 11] = [
        HashAlgorithm::Md5,
        HashAlgorithm::Sha1,
        HashAlgorithm::Sha224,
        HashAlgorithm::Sha256,
        HashAlgorithm::Sha384,
        HashAlgorithm::Sha512,
        HashAlgorithm::Sha3_256,
        HashAlgorithm::Sha3_512,
        HashAlgorithm::Blake2b,
        HashAlgorithm::Blake2s,
        HashAlgorithm::Blake3,
    ];

    pub fn name(self) -> &'static str {
        match self {
            HashAlgorithm::Md5 => "md5",
            HashAlgorithm::Sha1 => "sha1",
            HashAlgorithm::Sha224 => "sha224",
            HashAlgorithm::Sha256 => "sha256",
            HashAlgorithm::Sha384 => "sha384",
            HashAlgorithm::Sha512 => "sha512",
            HashAlgorithm::Sha3_256 => "sha3_256",
            HashAlgorithm::Sha3_512 => "sha3_512",
            HashAlgorithm::Blake2b => "blake2b",
            HashAlgorithm::Blake2s => "blake2s",
            HashAlgorithm::Blake3 => "blake3",
        }
    }

    /// Digest length in bytes.
    pub fn output_len(self) -> usize {
        match self {
            HashAlgorithm::Md5 => 16,
            HashAlgorithm::Sha1 => 20,
            HashAlgorithm::Sha224 => 28,
            HashAlgorithm::Sha256 | HashAlgorithm::Sha3_256 => 32,
            HashAlgorithm::Sha384 => 48,
            HashAlgorithm::Sha512 | HashAlgorithm::Sha3_512 => 64,
            HashAlgorithm::Blake2b => 64,
            HashAlgorithm::Blake2s | HashAlgorithm::Blake3 => 32,
        }
    }

    /// One-shot digest of `data`.
    pub fn digest(self, data: &[u8]) -> Vec<u8> {
        let mut hasher = self.hasher();
        hasher.update(data);
        hasher.finalize()
    }

    /// Fresh incremental hasher.
    pub fn hasher(self) -> Hasher {
        let state = match self {
            HashAlgorithm::Blake3 => State::Blake3(Box::new(blake3::Hasher::new())),
            HashAlgorithm::Md5 => State::Dyn(Box::new(md5::Md5::default())),
            HashAlgorithm::Sha1 => State::Dyn(Box::new(sha1::Sha1::default())),
            HashAlgorithm::Sha224 => State::Dyn(Box::new(sha2::Sha224::default())),
            HashAlgorithm::Sha256 => State::Dyn(Box::new(sha2::Sha256::default())),
            HashAlgorithm::Sha384 => State::Dyn(Box::new(sha2::Sha384::default())),
            HashAlgorithm::Sha512 => State::Dyn(Box::new(sha2::Sha512::default())),
            HashAlgorithm::Sha3_256 => State::Dyn(Box::new(sha3::Sha3_256::default())),
            HashAlgorithm::Sha3_512 => State::Dyn(Box::new(sha3::Sha3_512::default())),
            HashAlgorithm::Blake2b => State::Dyn(Box::new(blake2::Blake2b512::default())),
            HashAlgorithm::Blake2s => State::Dyn(Box::new(blake2::Blake2s256::default())),
        };
        Hasher {
            algorithm: self,
            state,
        }
    }
}

impl FromStr for HashAlgorithm {
    type Err = SyncError;

    fn from_str(name: &str) -> Result<Self, Self::Err> {
        HashAlgorithm::ALL
            .into_iter()
            .find(|algo| algo.name().eq_ignore_ascii_case(name))
            .ok_or_else(|| SyncError::UnknownAlgorithm(name.to_string()))
    }
}

impl fmt::Display for HashAlgorithm {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

enum State {
    Dyn(Box<dyn DynDigest + Send>),
    Blake3(Box<blake3::Hasher>),
}

/// Incremental digest. `finalize` consumes it, so each hasher yields exactly
/// one digest.
pub struct Hasher {
    algorithm: HashAlgorithm,
    state: State,
}

impl Hasher {
    pub fn update(&mut self, data: &[u8]) {
        match &mut self.state {
            State::Dyn(d) => d.update(data),
            State::Blake3(h) => {
                h.update(data);
            }
        }
    }

    /// Digest of everything absorbed so far, without consuming the hasher.
    pub fn snapshot(&self) -> Vec<u8> {
        match &self.state {
            State::Dyn(d) => DynDigest::finalize(d.box_clone()).into_vec(),
            State::Blake3(h) => h.finalize().as_bytes().to_vec(),
        }
    }

    pub fn finalize(self) -> Vec<u8> {
        match self.state {
            State::Dyn(d) => DynDigest::finalize(d).into_vec(),
            State::Blake3(h) => h.finalize().as_bytes().to_vec(),
        }
    }
}

impl fmt::Debug for Hasher {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Hasher")
            .field("algorithm", &self.algorithm)
            .finish_non_exhaustive()
    }
}
