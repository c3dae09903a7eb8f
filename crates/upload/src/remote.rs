//! Remote upload API trait.
//!
//! `UploadRemote` is implemented per backend (see `cloudmux-remote-http`
//! for the JSON-over-HTTPS flavour). Using a trait keeps the engine
//! decoupled from transport and testable with mocks.

use std::future::Future;
use std::pin::Pin;

use cloudmux_protocol::{
    ChunkAck, CompleteUploadRequest, CompleteUploadResponse, HashAlgorithm, OpenSessionRequest,
    OpenSessionResponse,
};

use crate::credentials::AuthHeaders;
use crate::error::UploadError;

/// Boxed future returned by remote and credential calls.
pub type RemoteFuture<'a, T> = Pin<Box<dyn Future<Output = Result<T, UploadError>> + Send + 'a>>;

/// One chunk ready to send.
#[derive(Debug, Clone)]
pub struct ChunkUpload {
    pub session_key: String,
    pub index: u64,
    pub offset: u64,
    /// Hex digest of `data`.
    pub digest: String,
    pub data: Vec<u8>,
}

/// The three calls a backend must answer for chunked uploads.
///
/// Implementations map transport failures onto the engine's error
/// taxonomy: refused credentials become [`UploadError::Auth`], transient
/// transport problems [`UploadError::Network`], and explicit refusals
/// [`UploadError::RemoteRejected`].
pub trait UploadRemote: Send + Sync {
    /// Digest the backend expects for dedup and chunk verification.
    fn hash_algorithm(&self) -> HashAlgorithm {
        HashAlgorithm::Md5
    }

    /// Opens or resumes a session.
    fn open_session(
        &self,
        request: OpenSessionRequest,
        auth: AuthHeaders,
    ) -> RemoteFuture<'_, OpenSessionResponse>;

    /// Sends one chunk to `endpoint`. Re-sending an accepted index must be
    /// harmless.
    fn upload_chunk(
        &self,
        endpoint: String,
        chunk: ChunkUpload,
        auth: AuthHeaders,
    ) -> RemoteFuture<'_, ChunkAck>;

    /// Asks whether the session has been assembled.
    fn complete_upload(
        &self,
        request: CompleteUploadRequest,
        auth: AuthHeaders,
    ) -> RemoteFuture<'_, CompleteUploadResponse>;
}
