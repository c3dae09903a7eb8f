use cloudmux_protocol::HashAlgorithm;
use md5::Md5;
use sha2::{Digest, Sha256};

use crate::source::RangeSource;
use crate::{HASH_WINDOW, TransferError};

/// Finished content digest together with the algorithm that produced it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ContentDigest {
    algorithm: HashAlgorithm,
    bytes: Vec<u8>,
}

impl ContentDigest {
    pub fn algorithm(&self) -> HashAlgorithm {
        self.algorithm
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.bytes
    }

    /// Lower-case hex encoding, the form every remote expects.
    pub fn hex(&self) -> String {
        hex::encode(&self.bytes)
    }

    /// Compares against a hex digest reported by a remote, ignoring case.
    pub fn matches_hex(&self, other: &str) -> bool {
        self.hex().eq_ignore_ascii_case(other.trim())
    }
}

impl std::fmt::Display for ContentDigest {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.hex())
    }
}

/// Incremental hasher over either supported algorithm.
///
/// Feed bytes with [`update`](Self::update) in any number of pieces; the
/// result only depends on the concatenated input.
pub enum ContentHasher {
    Md5(Md5),
    Sha256(Sha256),
}

impl ContentHasher {
    pub fn new(algorithm: HashAlgorithm) -> Self {
        match algorithm {
            HashAlgorithm::Md5 => ContentHasher::Md5(Md5::new()),
            HashAlgorithm::Sha256 => ContentHasher::Sha256(Sha256::new()),
        }
    }

    pub fn update(&mut self, data: &[u8]) {
        match self {
            ContentHasher::Md5(h) => h.update(data),
            ContentHasher::Sha256(h) => h.update(data),
        }
    }

    pub fn finalize(self) -> ContentDigest {
        match self {
            ContentHasher::Md5(h) => ContentDigest {
                algorithm: HashAlgorithm::Md5,
                bytes: h.finalize().to_vec(),
            },
            ContentHasher::Sha256(h) => ContentDigest {
                algorithm: HashAlgorithm::Sha256,
                bytes: h.finalize().to_vec(),
            },
        }
    }
}

/// Digest of an in-memory buffer.
pub fn digest_bytes(algorithm: HashAlgorithm, data: &[u8]) -> ContentDigest {
    let mut hasher = ContentHasher::new(algorithm);
    hasher.update(data);
    hasher.finalize()
}

/// Digest of an entire source, read front to back in [`HASH_WINDOW`] pieces.
pub fn digest_source(
    algorithm: HashAlgorithm,
    source: &dyn RangeSource,
) -> Result<ContentDigest, TransferError> {
    digest_range(algorithm, source, 0, source.len())
}

/// Digest of `len` bytes starting at `offset`.
pub fn digest_range(
    algorithm: HashAlgorithm,
    source: &dyn RangeSource,
    offset: u64,
    len: u64,
) -> Result<ContentDigest, TransferError> {
    let mut hasher = ContentHasher::new(algorithm);
    let end = offset.saturating_add(len);
    let mut pos = offset;
    while pos < end {
        let want = (end - pos).min(HASH_WINDOW as u64) as usize;
        let buf = source.read_range(pos, want)?;
        hasher.update(&buf);
        pos += want as u64;
    }
    Ok(hasher.finalize())
}
