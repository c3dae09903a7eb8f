use serde::{Deserialize, Serialize};

use crate::ProtocolError;
use crate::constants::CODE_OK;

/// Error details reported by a remote in a response envelope.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ApiError {
    pub code: i32,
    pub message: String,
}

/// Envelope wrapping every JSON response body.
///
/// A non-zero `code` means the call failed and `message` describes why;
/// `data` is only meaningful when `code` is zero.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApiResponse<T> {
    pub code: i32,
    #[serde(default)]
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<T>,
}

impl<T> ApiResponse<T> {
    /// Wraps a successful payload.
    pub fn ok(data: T) -> Self {
        Self {
            code: CODE_OK,
            message: String::new(),
            data: Some(data),
        }
    }

    /// Creates a failure envelope.
    pub fn error(code: i32, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
            data: None,
        }
    }

    /// Returns `true` if the remote reported success.
    pub fn is_ok(&self) -> bool {
        self.code == CODE_OK
    }

    /// Returns the error details if the remote reported failure.
    pub fn api_error(&self) -> Option<ApiError> {
        if self.is_ok() {
            None
        } else {
            Some(ApiError {
                code: self.code,
                message: self.message.clone(),
            })
        }
    }

    /// Unwraps the payload, turning a non-zero code or a missing payload
    /// into an error.
    pub fn into_data(self) -> Result<T, ProtocolError> {
        if !self.is_ok() {
            return Err(ProtocolError::Remote {
                code: self.code,
                message: self.message,
            });
        }
        self.data.ok_or(ProtocolError::MissingData)
    }
}

impl<T: for<'de> Deserialize<'de>> ApiResponse<T> {
    /// Parses an envelope from a raw response body.
    pub fn parse(body: &[u8]) -> Result<Self, ProtocolError> {
        Ok(serde_json::from_slice(body)?)
    }
}
