use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};

use crate::TransferError;

/// Lifecycle of one chunk within an upload attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChunkState {
    Pending,
    Uploading,
    Done,
    Failed,
}

/// One contiguous byte range of the source, uploaded as a single request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChunkDescriptor {
    pub index: u64,
    pub offset: u64,
    pub length: u64,
    pub state: ChunkState,
}

impl ChunkDescriptor {
    /// Exclusive end offset.
    pub fn end(&self) -> u64 {
        self.offset + self.length
    }
}

/// How a zero-byte file is represented.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum EmptyFile {
    /// No chunks at all; go straight to completion.
    #[default]
    NoChunks,
    /// One zero-length chunk, already `Done` since there is nothing to send.
    SingleEmptyChunk,
}

/// Ordered chunk descriptors covering `[0, total_size)`.
#[derive(Debug, Clone)]
pub struct ChunkPlan {
    total_size: u64,
    chunk_size: u64,
    chunks: Vec<ChunkDescriptor>,
}

impl ChunkPlan {
    pub fn total_size(&self) -> u64 {
        self.total_size
    }

    pub fn chunk_size(&self) -> u64 {
        self.chunk_size
    }

    pub fn chunks(&self) -> &[ChunkDescriptor] {
        &self.chunks
    }

    pub fn into_chunks(self) -> Vec<ChunkDescriptor> {
        self.chunks
    }

    pub fn len(&self) -> usize {
        self.chunks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.chunks.is_empty()
    }

    pub fn pending(&self) -> impl Iterator<Item = &ChunkDescriptor> {
        self.chunks
            .iter()
            .filter(|c| c.state == ChunkState::Pending)
    }

    pub fn pending_count(&self) -> usize {
        self.pending().count()
    }

    /// Bytes already accepted by the remote before this attempt.
    pub fn done_bytes(&self) -> u64 {
        self.chunks
            .iter()
            .filter(|c| c.state == ChunkState::Done)
            .map(|c| c.length)
            .sum()
    }
}

/// Splits `total_size` bytes into `chunk_size` units.
///
/// Chunk `i` covers `[i * chunk_size, min((i + 1) * chunk_size, total_size))`.
/// Indices in `uploaded` start out `Done`; indices past the last chunk are
/// ignored.
pub fn plan(
    total_size: u64,
    chunk_size: u64,
    uploaded: &BTreeSet<u64>,
    empty: EmptyFile,
) -> Result<ChunkPlan, TransferError> {
    if chunk_size == 0 {
        return Err(TransferError::ZeroChunkSize);
    }

    let chunks = if total_size == 0 {
        match empty {
            EmptyFile::NoChunks => Vec::new(),
            EmptyFile::SingleEmptyChunk => vec![ChunkDescriptor {
                index: 0,
                offset: 0,
                length: 0,
                state: ChunkState::Done,
            }],
        }
    } else {
        let count = total_size.div_ceil(chunk_size);
        (0..count)
            .map(|index| {
                let offset = index * chunk_size;
                let length = chunk_size.min(total_size - offset);
                let state = if uploaded.contains(&index) {
                    ChunkState::Done
                } else {
                    ChunkState::Pending
                };
                ChunkDescriptor {
                    index,
                    offset,
                    length,
                    state,
                }
            })
            .collect()
    };

    Ok(ChunkPlan {
        total_size,
        chunk_size,
        chunks,
    })
}
