//! Mock remote and credentials shared by the engine tests.

use std::collections::VecDeque;
use std::sync::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use cloudmux_protocol::{
    ChunkAck, CompleteUploadRequest, CompleteUploadResponse, HashAlgorithm, OpenSessionRequest,
    OpenSessionResponse,
};
use cloudmux_transfer::digest_bytes;

use crate::credentials::{AuthHeaders, CredentialSupplier};
use crate::error::UploadError;
use crate::remote::{ChunkUpload, RemoteFuture, UploadRemote};

/// A recorded remote call, in the order the remote finished handling it.
#[derive(Debug, Clone, PartialEq)]
pub enum Call {
    Open(OpenSessionRequest),
    Chunk { index: u64, len: usize },
    Complete(String),
}

type ChunkHandler = Box<dyn Fn(&ChunkUpload) -> Result<ChunkAck, UploadError> + Send + Sync>;

pub struct MockRemote {
    algorithm: HashAlgorithm,
    open: Mutex<VecDeque<Result<OpenSessionResponse, UploadError>>>,
    chunk_handler: ChunkHandler,
    chunk_delay: Option<Duration>,
    complete: Mutex<VecDeque<Result<CompleteUploadResponse, UploadError>>>,
    calls: Mutex<Vec<Call>>,
    in_flight: AtomicUsize,
    max_in_flight: AtomicUsize,
}

/// Acknowledges a chunk and echoes the digest of what actually arrived.
pub fn echo_ack(algorithm: HashAlgorithm, chunk: &ChunkUpload) -> ChunkAck {
    ChunkAck {
        accepted: true,
        assembly_key: None,
        digest: Some(digest_bytes(algorithm, &chunk.data).hex()),
    }
}

pub fn session_response(key: &str, chunk_size: u64) -> OpenSessionResponse {
    OpenSessionResponse {
        session_key: key.into(),
        chunk_size,
        endpoints: vec!["https://upload.example/slice".into()],
        reuse_existing: false,
        existing_object_id: None,
        uploaded_bitmap: None,
    }
}

impl MockRemote {
    pub fn new() -> Self {
        Self {
            algorithm: HashAlgorithm::Md5,
            open: Mutex::new(VecDeque::new()),
            chunk_handler: Box::new(|c| Ok(echo_ack(HashAlgorithm::Md5, c))),
            chunk_delay: None,
            complete: Mutex::new(VecDeque::new()),
            calls: Mutex::new(Vec::new()),
            in_flight: AtomicUsize::new(0),
            max_in_flight: AtomicUsize::new(0),
        }
    }

    pub fn with_algorithm(mut self, algorithm: HashAlgorithm) -> Self {
        self.algorithm = algorithm;
        self.chunk_handler = Box::new(move |c| Ok(echo_ack(algorithm, c)));
        self
    }

    pub fn with_open(self, response: Result<OpenSessionResponse, UploadError>) -> Self {
        self.open.lock().unwrap().push_back(response);
        self
    }

    pub fn with_chunk_handler(
        mut self,
        handler: impl Fn(&ChunkUpload) -> Result<ChunkAck, UploadError> + Send + Sync + 'static,
    ) -> Self {
        self.chunk_handler = Box::new(handler);
        self
    }

    pub fn with_chunk_delay(mut self, delay: Duration) -> Self {
        self.chunk_delay = Some(delay);
        self
    }

    pub fn with_complete(self, response: Result<CompleteUploadResponse, UploadError>) -> Self {
        self.complete.lock().unwrap().push_back(response);
        self
    }

    pub fn calls(&self) -> Vec<Call> {
        self.calls.lock().unwrap().clone()
    }

    pub fn chunk_indices(&self) -> Vec<u64> {
        self.calls()
            .into_iter()
            .filter_map(|c| match c {
                Call::Chunk { index, .. } => Some(index),
                _ => None,
            })
            .collect()
    }

    pub fn complete_count(&self) -> usize {
        self.calls()
            .iter()
            .filter(|c| matches!(c, Call::Complete(_)))
            .count()
    }

    pub fn max_in_flight(&self) -> usize {
        self.max_in_flight.load(Ordering::SeqCst)
    }
}

impl UploadRemote for MockRemote {
    fn hash_algorithm(&self) -> HashAlgorithm {
        self.algorithm
    }

    fn open_session(
        &self,
        request: OpenSessionRequest,
        _auth: AuthHeaders,
    ) -> RemoteFuture<'_, OpenSessionResponse> {
        Box::pin(async move {
            self.calls.lock().unwrap().push(Call::Open(request));
            self.open
                .lock()
                .unwrap()
                .pop_front()
                .unwrap_or_else(|| Err(UploadError::Network("no mock open response".into())))
        })
    }

    fn upload_chunk(
        &self,
        _endpoint: String,
        chunk: ChunkUpload,
        _auth: AuthHeaders,
    ) -> RemoteFuture<'_, ChunkAck> {
        Box::pin(async move {
            let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
            self.max_in_flight.fetch_max(now, Ordering::SeqCst);
            if let Some(delay) = self.chunk_delay {
                tokio::time::sleep(delay).await;
            }
            let result = (self.chunk_handler)(&chunk);
            self.in_flight.fetch_sub(1, Ordering::SeqCst);
            self.calls.lock().unwrap().push(Call::Chunk {
                index: chunk.index,
                len: chunk.data.len(),
            });
            result
        })
    }

    fn complete_upload(
        &self,
        request: CompleteUploadRequest,
        _auth: AuthHeaders,
    ) -> RemoteFuture<'_, CompleteUploadResponse> {
        Box::pin(async move {
            self.calls.lock().unwrap().push(Call::Complete(request.key));
            self.complete
                .lock()
                .unwrap()
                .pop_front()
                .unwrap_or_else(|| Ok(CompleteUploadResponse::finalized("obj-final")))
        })
    }
}

/// Static credentials that count invalidations.
#[derive(Default)]
pub struct CountingCredentials {
    pub invalidations: AtomicUsize,
}

impl CredentialSupplier for CountingCredentials {
    fn auth_headers(&self) -> RemoteFuture<'_, AuthHeaders> {
        Box::pin(async move { Ok(AuthHeaders::bearer("test-token")) })
    }

    fn invalidate(&self) {
        self.invalidations.fetch_add(1, Ordering::SeqCst);
    }
}
