//! Completion polling.
//!
//! [`poll_until`] is the bare loop: check, wait, repeat, honouring
//! cancellation at every wait. [`CompletionPoller`] runs it against the
//! remote's completion endpoint and tracks the state machine
//! `Submitted -> Polling -> {Finalized | Failed | Canceled}`.

use std::future::Future;
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

use cloudmux_protocol::CompleteUploadRequest;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::credentials::CredentialSupplier;
use crate::error::{Stage, UploadError};
use crate::remote::UploadRemote;

/// Result of one poll check.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PollStep<T> {
    Ready(T),
    Pending,
}

/// Why [`poll_until`] stopped without a result.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PollInterrupt {
    Cancelled,
    Exhausted { attempts: u32 },
}

impl From<PollInterrupt> for UploadError {
    fn from(i: PollInterrupt) -> Self {
        match i {
            PollInterrupt::Cancelled => UploadError::Cancelled,
            PollInterrupt::Exhausted { attempts } => UploadError::PollTimeout { attempts },
        }
    }
}

/// Calls `check` with attempt numbers 1, 2, ... until it is ready or fails.
///
/// The first check runs immediately; later ones wait `interval` after the
/// previous answer. With `max_attempts` unset the loop only ends on an
/// answer, an error or cancellation. Cancellation is observed before each
/// check and interrupts both waits and in-flight checks.
pub async fn poll_until<T, E, F, Fut>(
    interval: Duration,
    max_attempts: Option<u32>,
    cancel: &CancellationToken,
    mut check: F,
) -> Result<T, E>
where
    E: From<PollInterrupt>,
    F: FnMut(u32) -> Fut,
    Fut: Future<Output = Result<PollStep<T>, E>>,
{
    let mut attempt = 0u32;
    loop {
        if cancel.is_cancelled() {
            return Err(PollInterrupt::Cancelled.into());
        }
        attempt = attempt.saturating_add(1);

        let step = tokio::select! {
            biased;
            _ = cancel.cancelled() => return Err(PollInterrupt::Cancelled.into()),
            step = check(attempt) => step?,
        };
        if let PollStep::Ready(value) = step {
            return Ok(value);
        }

        if max_attempts.is_some_and(|max| attempt >= max) {
            return Err(PollInterrupt::Exhausted { attempts: attempt }.into());
        }

        tokio::select! {
            biased;
            _ = cancel.cancelled() => return Err(PollInterrupt::Cancelled.into()),
            _ = tokio::time::sleep(interval) => {}
        }
    }
}

// ---------------------------------------------------------------------------
// CompletionPoller
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PollState {
    Submitted,
    Polling { attempt: u32 },
    Finalized,
    Failed,
    Canceled,
}

/// Latest completion answer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CompletionStatus {
    pub finalized: bool,
    /// Present only once finalized.
    pub remote_object_id: Option<String>,
}

/// Polls the remote until the uploaded chunks are assembled.
pub struct CompletionPoller {
    remote: Arc<dyn UploadRemote>,
    credentials: Arc<dyn CredentialSupplier>,
    interval: Duration,
    max_attempts: Option<u32>,
    state: Mutex<PollState>,
}

impl CompletionPoller {
    pub fn new(
        remote: Arc<dyn UploadRemote>,
        credentials: Arc<dyn CredentialSupplier>,
        interval: Duration,
        max_attempts: Option<u32>,
    ) -> Self {
        Self {
            remote,
            credentials,
            interval,
            max_attempts,
            state: Mutex::new(PollState::Submitted),
        }
    }

    pub fn state(&self) -> PollState {
        *self.lock_state()
    }

    fn lock_state(&self) -> MutexGuard<'_, PollState> {
        self.state.lock().unwrap_or_else(|p| p.into_inner())
    }

    fn set_state(&self, state: PollState) {
        *self.lock_state() = state;
    }

    /// Waits until `key` is finalized.
    ///
    /// A remote "not yet" keeps polling; an explicit error code fails
    /// immediately with the attempt number attached.
    pub async fn await_completion(
        &self,
        key: &str,
        cancel: &CancellationToken,
    ) -> Result<CompletionStatus, UploadError> {
        let this = self;
        let result = poll_until(self.interval, self.max_attempts, cancel, move |attempt| {
            this.check(key, attempt)
        })
        .await;

        match &result {
            Ok(status) => {
                self.set_state(PollState::Finalized);
                info!(
                    key,
                    object = status.remote_object_id.as_deref().unwrap_or(""),
                    "upload finalized"
                );
            }
            Err(e) if e.is_cancelled() => self.set_state(PollState::Canceled),
            Err(e) => {
                self.set_state(PollState::Failed);
                warn!(key, error = %e, "completion polling failed");
            }
        }
        result
    }

    async fn check(&self, key: &str, attempt: u32) -> Result<PollStep<CompletionStatus>, UploadError> {
        self.set_state(PollState::Polling { attempt });
        let stage = Stage::Poll { attempt };

        let auth = self
            .credentials
            .auth_headers()
            .await
            .map_err(|e| e.at(stage))?;
        let request = CompleteUploadRequest {
            key: key.to_string(),
        };
        let resp = match self.remote.complete_upload(request, auth).await {
            Ok(resp) => resp,
            Err(e) => {
                if e.is_auth() {
                    self.credentials.invalidate();
                }
                return Err(e.at(stage));
            }
        };

        if let Some(code) = resp.error_code.filter(|c| *c != 0) {
            let message = if resp.message.is_empty() {
                format!("assembly failed with code {code}")
            } else {
                format!("assembly failed with code {code}: {}", resp.message)
            };
            return Err(UploadError::RemoteRejected(message).at(stage));
        }

        match resp.object_id.filter(|id| !id.is_empty()) {
            Some(id) if resp.finalized => Ok(PollStep::Ready(CompletionStatus {
                finalized: true,
                remote_object_id: Some(id),
            })),
            _ => {
                if resp.finalized {
                    warn!(key, attempt, "finalized without object id, polling again");
                } else {
                    debug!(key, attempt, "assembly in progress");
                }
                Ok(PollStep::Pending)
            }
        }
    }
}
