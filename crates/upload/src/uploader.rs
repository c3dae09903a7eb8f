//! Bounded worker pool that uploads pending chunks.
//!
//! Workers pull chunk positions from a shared queue. The first fatal error
//! halts claiming; chunks already in flight run to completion so the
//! remote session is not left with half-written parts. Cancellation is the
//! exception: it aborts in-flight calls too.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};

use cloudmux_protocol::{ChunkAck, HashAlgorithm};
use cloudmux_transfer::{
    ChunkDescriptor, ChunkState, ProgressAggregator, RangeSource, TransferError, digest_bytes,
};
use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::credentials::CredentialSupplier;
use crate::error::{Stage, UploadError};
use crate::remote::{ChunkUpload, UploadRemote};
use crate::session::UploadSession;
use crate::until_cancelled;

/// What a completed upload pass produced.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct UploadOutcome {
    /// Latest non-empty assembly key from a chunk acknowledgement, in
    /// completion order.
    pub assembly_key: Option<String>,
    pub chunks_sent: usize,
    pub bytes_sent: u64,
}

/// Uploads chunks with at most `concurrency` requests in flight.
pub struct ChunkUploader {
    remote: Arc<dyn UploadRemote>,
    credentials: Arc<dyn CredentialSupplier>,
    algorithm: HashAlgorithm,
    concurrency: usize,
    endpoint_index: usize,
}

/// State shared by the workers of one `upload_all` call.
struct Pool {
    session_key: String,
    endpoint: String,
    chunks: Vec<ChunkDescriptor>,
    queue: Mutex<VecDeque<usize>>,
    states: Mutex<Vec<ChunkState>>,
    halted: AtomicBool,
    first_error: Mutex<Option<UploadError>>,
    outcome: Mutex<UploadOutcome>,
}

fn lock<T>(m: &Mutex<T>) -> MutexGuard<'_, T> {
    m.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

impl Pool {
    fn new(
        session_key: String,
        endpoint: String,
        chunks: &[ChunkDescriptor],
        queue: VecDeque<usize>,
    ) -> Self {
        Self {
            session_key,
            endpoint,
            chunks: chunks.to_vec(),
            queue: Mutex::new(queue),
            states: Mutex::new(chunks.iter().map(|c| c.state).collect()),
            halted: AtomicBool::new(false),
            first_error: Mutex::new(None),
            outcome: Mutex::new(UploadOutcome::default()),
        }
    }

    /// `halted` is read and written only under the queue lock, so nothing is
    /// claimed once `halt` has returned.
    fn claim(&self) -> Option<usize> {
        let mut queue = lock(&self.queue);
        if self.halted.load(Ordering::Acquire) {
            return None;
        }
        let pos = queue.pop_front()?;
        lock(&self.states)[pos] = ChunkState::Uploading;
        Some(pos)
    }

    fn succeed(&self, pos: usize, ack: ChunkAck) {
        lock(&self.states)[pos] = ChunkState::Done;
        let mut outcome = lock(&self.outcome);
        outcome.chunks_sent += 1;
        outcome.bytes_sent += self.chunks[pos].length;
        if let Some(key) = ack.assembly_key.filter(|k| !k.is_empty()) {
            outcome.assembly_key = Some(key);
        }
    }

    fn fail(&self, pos: usize, err: UploadError) {
        lock(&self.states)[pos] = ChunkState::Failed;
        self.halt(err);
    }

    /// Stops further claims and keeps `err` if it is the first one.
    fn halt(&self, err: UploadError) {
        {
            let _queue = lock(&self.queue);
            self.halted.store(true, Ordering::Release);
        }
        let mut first = lock(&self.first_error);
        if first.is_none() {
            *first = Some(err);
        }
    }
}

impl ChunkUploader {
    pub fn new(
        remote: Arc<dyn UploadRemote>,
        credentials: Arc<dyn CredentialSupplier>,
        algorithm: HashAlgorithm,
        concurrency: usize,
    ) -> Self {
        Self {
            remote,
            credentials,
            algorithm,
            concurrency: concurrency.max(1),
            endpoint_index: 0,
        }
    }

    /// Selects which negotiated endpoint receives chunks.
    pub fn with_endpoint_index(mut self, index: usize) -> Self {
        self.endpoint_index = index;
        self
    }

    /// Uploads every `Pending` chunk in `chunks`.
    ///
    /// Chunk states are written back into `chunks` whether the pass
    /// succeeds or not. On failure the first fatal error is returned with
    /// the failing chunk index attached; accepted chunks stay accepted.
    pub async fn upload_all(
        &self,
        session: &UploadSession,
        chunks: &mut [ChunkDescriptor],
        source: Arc<dyn RangeSource>,
        progress: Arc<ProgressAggregator>,
        cancel: &CancellationToken,
    ) -> Result<UploadOutcome, UploadError> {
        let queue: VecDeque<usize> = chunks
            .iter()
            .enumerate()
            .filter(|(_, c)| c.state == ChunkState::Pending)
            .map(|(pos, _)| pos)
            .collect();
        if queue.is_empty() {
            debug!(session = %session.session_key(), "no pending chunks");
            return Ok(UploadOutcome::default());
        }

        let endpoint = session
            .endpoint(self.endpoint_index)
            .ok_or_else(|| UploadError::RemoteRejected("session has no upload endpoint".into()))?
            .to_string();

        let workers = self.concurrency.min(queue.len());
        info!(
            session = %session.session_key(),
            pending = queue.len(),
            workers,
            "uploading chunks"
        );

        let pool = Arc::new(Pool::new(
            session.session_key().to_string(),
            endpoint,
            chunks,
            queue,
        ));

        let mut set = JoinSet::new();
        for worker in 0..workers {
            let pool = Arc::clone(&pool);
            let ctx = WorkerCtx {
                remote: Arc::clone(&self.remote),
                credentials: Arc::clone(&self.credentials),
                source: Arc::clone(&source),
                progress: Arc::clone(&progress),
                algorithm: self.algorithm,
                cancel: cancel.clone(),
            };
            set.spawn(async move { ctx.run(worker, &pool).await });
        }

        while let Some(joined) = set.join_next().await {
            if let Err(e) = joined {
                pool.halt(UploadError::Worker(e.to_string()));
            }
        }

        for (chunk, state) in chunks.iter_mut().zip(lock(&pool.states).iter()) {
            chunk.state = *state;
        }

        if let Some(err) = lock(&pool.first_error).take() {
            if !err.is_cancelled() {
                warn!(session = %pool.session_key, error = %err, "chunk upload failed");
            }
            return Err(err);
        }
        Ok(lock(&pool.outcome).clone())
    }
}

struct WorkerCtx {
    remote: Arc<dyn UploadRemote>,
    credentials: Arc<dyn CredentialSupplier>,
    source: Arc<dyn RangeSource>,
    progress: Arc<ProgressAggregator>,
    algorithm: HashAlgorithm,
    cancel: CancellationToken,
}

impl WorkerCtx {
    async fn run(&self, worker: usize, pool: &Pool) {
        loop {
            if self.cancel.is_cancelled() {
                pool.halt(UploadError::Cancelled);
                return;
            }
            let Some(pos) = pool.claim() else {
                return;
            };
            let chunk = &pool.chunks[pos];
            match self.upload_one(pool, chunk).await {
                Ok(ack) => {
                    debug!(worker, index = chunk.index, bytes = chunk.length, "chunk accepted");
                    pool.succeed(pos, ack);
                    self.progress.add(chunk.length);
                }
                Err(e) => pool.fail(pos, e.at(Stage::Chunk { index: chunk.index })),
            }
        }
    }

    async fn upload_one(&self, pool: &Pool, chunk: &ChunkDescriptor) -> Result<ChunkAck, UploadError> {
        if chunk.length == 0 {
            return Ok(ChunkAck {
                accepted: true,
                assembly_key: None,
                digest: None,
            });
        }

        let source = Arc::clone(&self.source);
        let algorithm = self.algorithm;
        let (offset, len) = (chunk.offset, chunk.length as usize);
        let read = tokio::task::spawn_blocking(move || {
            let data = source.read_range(offset, len)?;
            let digest = digest_bytes(algorithm, &data);
            Ok::<_, TransferError>((data, digest))
        });
        let joined = until_cancelled(&self.cancel, async {
            read.await.map_err(|e| UploadError::Worker(e.to_string()))
        })
        .await?;
        let (data, digest) = joined?;

        let auth = until_cancelled(&self.cancel, self.credentials.auth_headers()).await?;
        let upload = ChunkUpload {
            session_key: pool.session_key.clone(),
            index: chunk.index,
            offset: chunk.offset,
            digest: digest.hex(),
            data,
        };
        let call = self.remote.upload_chunk(pool.endpoint.clone(), upload, auth);
        let ack = match until_cancelled(&self.cancel, call).await {
            Ok(ack) => ack,
            Err(e) => {
                if e.is_auth() {
                    self.credentials.invalidate();
                }
                return Err(e);
            }
        };

        if !ack.accepted {
            return Err(UploadError::RemoteRejected(format!(
                "chunk {} not accepted",
                chunk.index
            )));
        }
        if let Some(echoed) = ack.digest.as_deref()
            && !digest.matches_hex(echoed)
        {
            return Err(UploadError::Integrity {
                what: format!("chunk {}", chunk.index),
                expected: digest.hex(),
                actual: echoed.to_string(),
            });
        }
        Ok(ack)
    }
}
