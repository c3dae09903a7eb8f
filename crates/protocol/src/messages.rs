use serde::{Deserialize, Serialize};

use crate::bitmap::ResumeBitmap;

// ---------------------------------------------------------------------------
// Request payloads
// ---------------------------------------------------------------------------

/// Opens (or resumes) an upload session for one file.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OpenSessionRequest {
    pub folder_id: String,
    pub file_name: String,
    pub size: u64,
    /// Hex digest of the whole file.
    pub digest: String,
}

/// Asks the remote whether the uploaded chunks have been assembled.
///
/// `key` is the assembly key returned by the last chunk acknowledgement,
/// or the session key when the remote never issued one.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CompleteUploadRequest {
    pub key: String,
}

// ---------------------------------------------------------------------------
// Response payloads
// ---------------------------------------------------------------------------

/// Result of opening an upload session.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OpenSessionResponse {
    #[serde(default)]
    pub session_key: String,
    #[serde(default)]
    pub chunk_size: u64,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub endpoints: Vec<String>,
    #[serde(default)]
    pub reuse_existing: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub existing_object_id: Option<String>,
    /// Chunks the remote already holds for this session, if it tracks them.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub uploaded_bitmap: Option<ResumeBitmap>,
}

/// Acknowledgement for one uploaded chunk.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChunkAck {
    pub accepted: bool,
    /// Key to poll for assembly, issued by some remotes on each chunk.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub assembly_key: Option<String>,
    /// Digest of the bytes the remote actually received.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub digest: Option<String>,
}

/// One completion poll result.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CompleteUploadResponse {
    #[serde(default)]
    pub finalized: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub object_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error_code: Option<i32>,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub message: String,
}

impl CompleteUploadResponse {
    /// Assembly still in progress.
    pub fn pending() -> Self {
        Self {
            finalized: false,
            object_id: None,
            error_code: None,
            message: String::new(),
        }
    }

    /// Assembly finished and produced `object_id`.
    pub fn finalized(object_id: impl Into<String>) -> Self {
        Self {
            finalized: true,
            object_id: Some(object_id.into()),
            error_code: None,
            message: String::new(),
        }
    }

    /// Assembly failed on the remote.
    pub fn failed(code: i32, message: impl Into<String>) -> Self {
        Self {
            finalized: false,
            object_id: None,
            error_code: Some(code),
            message: message.into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn open_session_request_camel_case() {
        let req = OpenSessionRequest {
            folder_id: "0".into(),
            file_name: "backup.tar".into(),
            size: 10,
            digest: "abc".into(),
        };
        let json = serde_json::to_value(&req).unwrap();
        assert_eq!(json["folderId"], "0");
        assert_eq!(json["fileName"], "backup.tar");
    }

    #[test]
    fn open_session_response_dedup_needs_no_endpoints() {
        let resp: OpenSessionResponse = serde_json::from_str(
            r#"{"sessionKey":"","reuseExisting":true,"existingObjectId":"991"}"#,
        )
        .unwrap();
        assert!(resp.reuse_existing);
        assert!(resp.endpoints.is_empty());
        assert_eq!(resp.chunk_size, 0);
        assert_eq!(resp.existing_object_id.as_deref(), Some("991"));
        assert!(resp.uploaded_bitmap.is_none());
    }

    #[test]
    fn open_session_response_with_bitmap() {
        let resp: OpenSessionResponse = serde_json::from_str(
            r#"{"sessionKey":"k","chunkSize":4,"endpoints":["https://up"],
                "uploadedBitmap":{"words":["5"]}}"#,
        )
        .unwrap();
        let uploaded = resp.uploaded_bitmap.unwrap().decode().unwrap();
        assert_eq!(uploaded.into_iter().collect::<Vec<_>>(), vec![0, 2]);
    }

    #[test]
    fn chunk_ack_optional_fields_omitted() {
        let ack = ChunkAck {
            accepted: true,
            assembly_key: None,
            digest: None,
        };
        assert_eq!(serde_json::to_string(&ack).unwrap(), r#"{"accepted":true}"#);
    }

    #[test]
    fn complete_response_constructors() {
        assert!(!CompleteUploadResponse::pending().finalized);
        let done = CompleteUploadResponse::finalized("obj");
        assert_eq!(done.object_id.as_deref(), Some("obj"));
        let failed = CompleteUploadResponse::failed(500, "assembly failed");
        assert_eq!(failed.error_code, Some(500));
        let json = serde_json::to_string(&CompleteUploadResponse::pending()).unwrap();
        assert_eq!(json, r#"{"finalized":false}"#);
    }
}
