use cloudmux_upload::{PollInterrupt, UploadError};

/// Errors from driver operations.
#[derive(Debug, thiserror::Error)]
pub enum DriverError {
    #[error("not found: {0}")]
    NotFound(String),

    #[error("remote error: {0}")]
    Remote(String),

    #[error("operation not supported by {driver}: {operation}")]
    Unsupported {
        driver: String,
        operation: &'static str,
    },

    #[error("upload failed: {0}")]
    Upload(#[from] UploadError),

    #[error("copy task {task_id} failed: {message}")]
    CopyFailed { task_id: String, message: String },

    #[error("copy task did not finish after {attempts} checks")]
    CopyTimeout { attempts: u32 },

    #[error("cancelled")]
    Cancelled,
}

impl From<PollInterrupt> for DriverError {
    fn from(i: PollInterrupt) -> Self {
        match i {
            PollInterrupt::Cancelled => DriverError::Cancelled,
            PollInterrupt::Exhausted { attempts } => DriverError::CopyTimeout { attempts },
        }
    }
}

impl DriverError {
    pub fn is_cancelled(&self) -> bool {
        match self {
            DriverError::Cancelled => true,
            DriverError::Upload(e) => e.is_cancelled(),
            _ => false,
        }
    }
}
