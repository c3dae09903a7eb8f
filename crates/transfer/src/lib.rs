//! Byte-level building blocks of the chunked upload engine.
//!
//! Content hashing, chunk planning, progress accounting and the
//! random-access sources chunk workers read from. Nothing in this crate
//! talks to the network.

mod hasher;
mod planner;
mod progress;
mod source;
mod validation;

pub use hasher::{ContentDigest, ContentHasher, digest_bytes, digest_range, digest_source};
pub use planner::{ChunkDescriptor, ChunkPlan, ChunkState, EmptyFile, plan};
pub use progress::{ProgressAggregator, ProgressCallback, ThroughputMeter};
pub use source::{FileSource, MemorySource, RangeSource, TempFileSource, buffer_stream};
pub use validation::validate_object_name;

/// Read window used when hashing or buffering a whole source: 1 MiB.
pub const HASH_WINDOW: usize = 1024 * 1024;

/// Errors produced by the transfer crate.
#[derive(Debug, thiserror::Error)]
pub enum TransferError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("short read at offset {offset}: expected {expected} bytes, got {actual}")]
    ShortRead {
        offset: u64,
        expected: usize,
        actual: usize,
    },

    #[error("range {offset}+{len} is outside a source of {size} bytes")]
    OutOfRange { offset: u64, len: usize, size: u64 },

    #[error("chunk size must be at least 1 byte")]
    ZeroChunkSize,

    #[error("invalid name: {0}")]
    InvalidName(String),
}
