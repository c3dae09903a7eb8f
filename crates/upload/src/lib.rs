//! Resumable, concurrent chunked upload engine.
//!
//! This crate holds the upload pipeline only. It knows nothing about HTTP:
//! a backend provides an [`UploadRemote`] implementation and a
//! [`CredentialSupplier`], and the engine drives them.
//!
//! # Pipeline
//!
//! 1. **Hash** the whole source (spooling non-seekable streams to disk)
//! 2. **Negotiate** a session; a dedup hit ends the upload here
//! 3. **Plan** chunks, skipping indices the remote already holds
//! 4. **Upload** pending chunks with a bounded worker pool
//! 5. **Poll** until the remote has assembled the object

pub mod config;
pub mod credentials;
pub mod error;
pub mod negotiator;
pub mod orchestrator;
pub mod poller;
pub mod remote;
pub mod session;
pub mod uploader;

#[cfg(test)]
mod testing;

pub use config::EngineConfig;
pub use credentials::{AuthHeaders, CredentialSupplier, StaticCredentials, Token, TokenManager, TokenSource};
pub use error::{Stage, UploadError};
pub use negotiator::SessionNegotiator;
pub use orchestrator::{UploadOrchestrator, UploadRequest, UploadSource};
pub use poller::{CompletionPoller, CompletionStatus, PollInterrupt, PollState, PollStep, poll_until};
pub use remote::{ChunkUpload, RemoteFuture, UploadRemote};
pub use session::UploadSession;
pub use uploader::{ChunkUploader, UploadOutcome};

use std::future::Future;

use tokio_util::sync::CancellationToken;

/// Runs `fut` unless `cancel` fires first.
pub(crate) async fn until_cancelled<T>(
    cancel: &CancellationToken,
    fut: impl Future<Output = Result<T, UploadError>>,
) -> Result<T, UploadError> {
    tokio::select! {
        biased;
        _ = cancel.cancelled() => Err(UploadError::Cancelled),
        result = fut => result,
    }
}
