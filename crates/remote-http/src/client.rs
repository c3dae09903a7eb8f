//! Upload API client.
//!
//! Async HTTP client using `reqwest`. Auth headers come from the engine's
//! credential supplier on every call, so token refresh stays out of here.

use std::time::Duration;

use cloudmux_protocol::constants::{
    CHUNK_REQUEST_TIMEOUT, HEADER_CHUNK_DIGEST, HEADER_CHUNK_INDEX, HEADER_CHUNK_SIZE,
    HEADER_SESSION_KEY, REQUEST_TIMEOUT,
};
use cloudmux_protocol::{
    ApiResponse, ChunkAck, CompleteUploadRequest, CompleteUploadResponse, HashAlgorithm,
    OpenSessionRequest, OpenSessionResponse, ProtocolError,
};
use cloudmux_upload::{AuthHeaders, ChunkUpload, RemoteFuture, UploadError, UploadRemote};
use reqwest::header::CONTENT_TYPE;
use serde::Serialize;
use serde::de::DeserializeOwned;
use tracing::debug;

const OPEN_SESSION_PATH: &str = "/upload/v1/session/open";
const COMPLETE_UPLOAD_PATH: &str = "/upload/v1/session/complete";

/// Errors from the HTTP layer, before they are mapped onto [`UploadError`].
#[derive(Debug, thiserror::Error)]
pub enum HttpRemoteError {
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("API error {status}: {body}")]
    Api { status: u16, body: String },

    #[error("invalid base URL: {0}")]
    InvalidUrl(String),
}

impl From<HttpRemoteError> for UploadError {
    fn from(e: HttpRemoteError) -> Self {
        match e {
            HttpRemoteError::Http(e) => UploadError::Network(e.to_string()),
            HttpRemoteError::Api { status, body } => map_status(status, body),
            HttpRemoteError::InvalidUrl(url) => UploadError::RemoteRejected(format!("invalid URL: {url}")),
        }
    }
}

/// Maps a non-success HTTP status onto the engine's error taxonomy.
pub fn map_status(status: u16, body: String) -> UploadError {
    match status {
        401 | 403 => UploadError::Auth(format!("HTTP {status}: {body}")),
        408 | 429 => UploadError::Network(format!("HTTP {status}: {body}")),
        400..=499 => UploadError::RemoteRejected(format!("HTTP {status}: {body}")),
        _ => UploadError::Network(format!("HTTP {status}: {body}")),
    }
}

/// Decodes an enveloped response body.
///
/// Envelope codes 401 and 403 are treated as auth failures; some backends
/// answer HTTP 200 with an auth error inside the envelope.
pub fn decode_envelope<T: DeserializeOwned>(body: &[u8]) -> Result<T, UploadError> {
    let resp: ApiResponse<T> = ApiResponse::parse(body)?;
    match resp.into_data() {
        Ok(data) => Ok(data),
        Err(ProtocolError::Remote { code, message }) if code == 401 || code == 403 => {
            Err(UploadError::Auth(format!("code {code}: {message}")))
        }
        Err(e) => Err(e.into()),
    }
}

/// Upload remote speaking JSON over HTTPS.
pub struct HttpRemote {
    http: reqwest::Client,
    base_url: String,
    algorithm: HashAlgorithm,
}

impl HttpRemote {
    /// Creates a client for the API rooted at `base_url`.
    pub fn new(base_url: &str) -> Result<Self, HttpRemoteError> {
        let base_url = base_url.trim_end_matches('/').to_string();
        if !(base_url.starts_with("http://") || base_url.starts_with("https://")) {
            return Err(HttpRemoteError::InvalidUrl(base_url));
        }
        let http = reqwest::Client::builder()
            .connect_timeout(Duration::from_secs(10))
            .build()?;
        Ok(Self {
            http,
            base_url,
            algorithm: HashAlgorithm::Md5,
        })
    }

    /// Sets the digest this backend expects.
    pub fn with_hash_algorithm(mut self, algorithm: HashAlgorithm) -> Self {
        self.algorithm = algorithm;
        self
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    async fn post_json<Req: Serialize, Resp: DeserializeOwned>(
        &self,
        path: &str,
        body: &Req,
        auth: &AuthHeaders,
    ) -> Result<Resp, UploadError> {
        let url = format!("{}{}", self.base_url, path);
        let mut req = self.http.post(&url).timeout(REQUEST_TIMEOUT).json(body);
        for (name, value) in auth.iter() {
            req = req.header(name, value);
        }
        let resp = req.send().await.map_err(HttpRemoteError::from)?;
        read_envelope(resp).await
    }
}

async fn read_envelope<T: DeserializeOwned>(resp: reqwest::Response) -> Result<T, UploadError> {
    let status = resp.status();
    if !status.is_success() {
        let body = resp.text().await.unwrap_or_default();
        return Err(HttpRemoteError::Api {
            status: status.as_u16(),
            body,
        }
        .into());
    }
    let body = resp.bytes().await.map_err(HttpRemoteError::from)?;
    decode_envelope(&body)
}

impl UploadRemote for HttpRemote {
    fn hash_algorithm(&self) -> HashAlgorithm {
        self.algorithm
    }

    fn open_session(
        &self,
        request: OpenSessionRequest,
        auth: AuthHeaders,
    ) -> RemoteFuture<'_, OpenSessionResponse> {
        Box::pin(async move {
            debug!(file = %request.file_name, size = request.size, "opening upload session");
            self.post_json(OPEN_SESSION_PATH, &request, &auth).await
        })
    }

    fn upload_chunk(
        &self,
        endpoint: String,
        chunk: ChunkUpload,
        auth: AuthHeaders,
    ) -> RemoteFuture<'_, ChunkAck> {
        Box::pin(async move {
            let mut req = self
                .http
                .post(&endpoint)
                .timeout(CHUNK_REQUEST_TIMEOUT)
                .header(CONTENT_TYPE, "application/octet-stream")
                .header(HEADER_SESSION_KEY, chunk.session_key.as_str())
                .header(HEADER_CHUNK_INDEX, chunk.index.to_string())
                .header(HEADER_CHUNK_DIGEST, chunk.digest.as_str())
                .header(HEADER_CHUNK_SIZE, chunk.data.len().to_string());
            for (name, value) in auth.iter() {
                req = req.header(name, value);
            }
            let resp = req
                .body(chunk.data)
                .send()
                .await
                .map_err(HttpRemoteError::from)?;
            read_envelope(resp).await
        })
    }

    fn complete_upload(
        &self,
        request: CompleteUploadRequest,
        auth: AuthHeaders,
    ) -> RemoteFuture<'_, CompleteUploadResponse> {
        Box::pin(async move { self.post_json(COMPLETE_UPLOAD_PATH, &request, &auth).await })
    }
}
