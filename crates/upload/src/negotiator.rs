//! Opens upload sessions.

use std::sync::Arc;

use cloudmux_protocol::OpenSessionRequest;
use cloudmux_transfer::ContentDigest;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

use crate::credentials::CredentialSupplier;
use crate::error::UploadError;
use crate::remote::UploadRemote;
use crate::session::UploadSession;
use crate::until_cancelled;

/// Calls the remote to open a session and validates what it offers.
pub struct SessionNegotiator {
    remote: Arc<dyn UploadRemote>,
    credentials: Arc<dyn CredentialSupplier>,
}

impl SessionNegotiator {
    pub fn new(remote: Arc<dyn UploadRemote>, credentials: Arc<dyn CredentialSupplier>) -> Self {
        Self {
            remote,
            credentials,
        }
    }

    /// Opens a session for `file_name` in `folder_id`.
    ///
    /// `digest` must be the digest of exactly the bytes that will be sent;
    /// remotes use it to detect content they already hold. A dedup hit
    /// comes back as a session with [`UploadSession::reuse_existing`] set and
    /// no endpoints. Otherwise the session has a chunk size of at least one
    /// byte and at least one endpoint.
    pub async fn open(
        &self,
        folder_id: &str,
        file_name: &str,
        total_size: u64,
        digest: &ContentDigest,
        cancel: &CancellationToken,
    ) -> Result<UploadSession, UploadError> {
        let auth = until_cancelled(cancel, self.credentials.auth_headers()).await?;
        let request = OpenSessionRequest {
            folder_id: folder_id.to_string(),
            file_name: file_name.to_string(),
            size: total_size,
            digest: digest.hex(),
        };

        let resp = match until_cancelled(cancel, self.remote.open_session(request, auth)).await {
            Ok(resp) => resp,
            Err(e) => {
                if e.is_auth() {
                    self.credentials.invalidate();
                }
                return Err(e);
            }
        };

        if resp.reuse_existing {
            info!(
                file = %file_name,
                object = resp.existing_object_id.as_deref().unwrap_or(""),
                "remote already holds this content"
            );
            return Ok(UploadSession::reused(
                resp.session_key,
                total_size,
                resp.existing_object_id,
            ));
        }

        if resp.session_key.is_empty() {
            return Err(UploadError::RemoteRejected("session key missing".into()));
        }
        if resp.chunk_size == 0 {
            return Err(UploadError::RemoteRejected("chunk size is zero".into()));
        }
        if resp.endpoints.is_empty() {
            return Err(UploadError::RemoteRejected("no upload endpoints offered".into()));
        }

        let uploaded = match &resp.uploaded_bitmap {
            Some(bitmap) => bitmap.decode()?,
            None => Default::default(),
        };

        debug!(
            session = %resp.session_key,
            chunk_size = resp.chunk_size,
            endpoints = resp.endpoints.len(),
            already_uploaded = uploaded.len(),
            "session opened"
        );

        Ok(
            UploadSession::new(resp.session_key, resp.chunk_size, total_size, resp.endpoints)
                .with_uploaded(uploaded),
        )
    }
}
