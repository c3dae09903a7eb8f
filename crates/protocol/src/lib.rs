//! Wire types shared by the upload engine and remote implementations.
//!
//! Everything here is plain data: JSON request/response bodies for the
//! three upstream calls (open session, upload chunk, complete upload), the
//! `{code, message, data}` response envelope used by most backends, and the
//! bit-packed resume bitmap codec.

pub mod bitmap;
pub mod constants;
pub mod envelope;
pub mod messages;
pub mod types;

pub use bitmap::ResumeBitmap;
pub use envelope::{ApiError, ApiResponse};
pub use messages::{
    ChunkAck, CompleteUploadRequest, CompleteUploadResponse, OpenSessionRequest,
    OpenSessionResponse,
};
pub use types::{HashAlgorithm, ObjectMeta};

/// Errors produced while decoding wire data.
#[derive(Debug, thiserror::Error)]
pub enum ProtocolError {
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("invalid bitmap word {index}: {value:?}")]
    InvalidBitmapWord { index: usize, value: String },

    #[error("remote error {code}: {message}")]
    Remote { code: i32, message: String },

    #[error("response has no data")]
    MissingData,
}
