//! Upload error types.

use cloudmux_protocol::ProtocolError;
use cloudmux_transfer::TransferError;

/// Pipeline stage an error happened in.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    Hashing,
    Negotiation,
    Chunk { index: u64 },
    Poll { attempt: u32 },
}

impl std::fmt::Display for Stage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Stage::Hashing => f.write_str("hashing"),
            Stage::Negotiation => f.write_str("session negotiation"),
            Stage::Chunk { index } => write!(f, "upload of chunk {index}"),
            Stage::Poll { attempt } => write!(f, "completion poll attempt {attempt}"),
        }
    }
}

/// Errors produced by the upload engine.
#[derive(Debug, thiserror::Error)]
pub enum UploadError {
    /// Credentials were refused. Re-authenticate before retrying.
    #[error("authentication failed: {0}")]
    Auth(String),

    /// Transient transport failure. Retrying the whole upload may succeed.
    #[error("network error: {0}")]
    Network(String),

    /// The remote refused the request (quota, name, validation).
    #[error("rejected by remote: {0}")]
    RemoteRejected(String),

    /// Bytes on the remote do not match what was sent.
    #[error("integrity check failed for {what}: expected {expected}, got {actual}")]
    Integrity {
        what: String,
        expected: String,
        actual: String,
    },

    /// The local source could not be read.
    #[error("read error: {0}")]
    Read(#[from] TransferError),

    /// A response could not be decoded.
    #[error("malformed response: {0}")]
    Malformed(String),

    #[error("cancelled")]
    Cancelled,

    #[error("completion not confirmed after {attempts} polls")]
    PollTimeout { attempts: u32 },

    /// A chunk worker task panicked or was aborted.
    #[error("worker task failed: {0}")]
    Worker(String),

    #[error("during {stage}: {source}")]
    Stage {
        stage: Stage,
        #[source]
        source: Box<UploadError>,
    },
}

impl UploadError {
    /// Attaches stage context. Cancellation and already-staged errors pass
    /// through untouched.
    pub fn at(self, stage: Stage) -> Self {
        match self {
            UploadError::Cancelled | UploadError::Stage { .. } => self,
            other => UploadError::Stage {
                stage,
                source: Box::new(other),
            },
        }
    }

    /// The underlying cause, with stage context peeled off.
    pub fn root(&self) -> &UploadError {
        match self {
            UploadError::Stage { source, .. } => source.root(),
            other => other,
        }
    }

    /// The stage the error was attributed to, if any.
    pub fn stage(&self) -> Option<Stage> {
        match self {
            UploadError::Stage { stage, .. } => Some(*stage),
            _ => None,
        }
    }

    pub fn is_cancelled(&self) -> bool {
        matches!(self.root(), UploadError::Cancelled)
    }

    pub fn is_auth(&self) -> bool {
        matches!(self.root(), UploadError::Auth(_))
    }

    /// Transient failures a caller may retry by re-running the upload.
    pub fn is_retryable(&self) -> bool {
        matches!(self.root(), UploadError::Network(_))
    }
}

impl From<ProtocolError> for UploadError {
    fn from(e: ProtocolError) -> Self {
        match e {
            ProtocolError::Remote { code, message } => {
                UploadError::RemoteRejected(format!("code {code}: {message}"))
            }
            other => UploadError::Malformed(other.to_string()),
        }
    }
}
