//! Upload orchestrator: hash, negotiate, plan, upload, poll.

use std::io::Read;
use std::path::Path;
use std::sync::Arc;

use cloudmux_protocol::{HashAlgorithm, ObjectMeta};
use cloudmux_transfer::{
    ChunkPlan, ContentDigest, EmptyFile, FileSource, MemorySource, ProgressAggregator,
    ProgressCallback, RangeSource, TransferError, buffer_stream, digest_source, plan,
    validate_object_name,
};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info};

use crate::config::EngineConfig;
use crate::credentials::CredentialSupplier;
use crate::error::{Stage, UploadError};
use crate::negotiator::SessionNegotiator;
use crate::poller::CompletionPoller;
use crate::remote::UploadRemote;
use crate::session::UploadSession;
use crate::uploader::ChunkUploader;
use crate::until_cancelled;

/// Where the bytes come from.
pub enum UploadSource {
    /// Supports concurrent ranged reads; chunks are read in place.
    RandomAccess(Arc<dyn RangeSource>),
    /// Forward-only; spooled to a temporary file before upload.
    Stream(Box<dyn Read + Send>),
}

impl UploadSource {
    pub fn file(path: &Path) -> Result<Self, TransferError> {
        Ok(UploadSource::RandomAccess(Arc::new(FileSource::open(path)?)))
    }

    pub fn memory(data: Vec<u8>) -> Self {
        UploadSource::RandomAccess(Arc::new(MemorySource::new(data)))
    }

    pub fn stream(reader: impl Read + Send + 'static) -> Self {
        UploadSource::Stream(Box::new(reader))
    }
}

/// Destination and declared size of one upload.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UploadRequest {
    pub destination_id: String,
    pub file_name: String,
    pub total_size: u64,
}

/// Runs complete uploads against one remote.
///
/// Each call to [`upload`](Self::upload) owns its session and chunk set;
/// nothing is shared between concurrent uploads of different files.
pub struct UploadOrchestrator {
    remote: Arc<dyn UploadRemote>,
    credentials: Arc<dyn CredentialSupplier>,
    config: EngineConfig,
}

impl UploadOrchestrator {
    pub fn new(
        remote: Arc<dyn UploadRemote>,
        credentials: Arc<dyn CredentialSupplier>,
        config: EngineConfig,
    ) -> Self {
        Self {
            remote,
            credentials,
            config,
        }
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    fn algorithm(&self) -> HashAlgorithm {
        self.config
            .hash_algorithm
            .unwrap_or_else(|| self.remote.hash_algorithm())
    }

    /// Uploads `source` as `request.file_name` into `request.destination_id`.
    ///
    /// `on_progress` receives non-decreasing percentages and ends at 100 on
    /// success; it stops advancing on failure. Errors carry the stage they
    /// happened in. Nothing is retried here.
    pub async fn upload(
        &self,
        request: UploadRequest,
        source: UploadSource,
        on_progress: Option<ProgressCallback>,
        cancel: &CancellationToken,
    ) -> Result<ObjectMeta, UploadError> {
        let result = self.run(&request, source, on_progress, cancel).await;
        match &result {
            Ok(meta) => info!(file = %request.file_name, object = %meta.id, "upload complete"),
            Err(e) if e.is_cancelled() => info!(file = %request.file_name, "upload cancelled"),
            Err(e) => error!(file = %request.file_name, error = %e, "upload failed"),
        }
        result
    }

    async fn run(
        &self,
        request: &UploadRequest,
        source: UploadSource,
        on_progress: Option<ProgressCallback>,
        cancel: &CancellationToken,
    ) -> Result<ObjectMeta, UploadError> {
        validate_object_name(&request.file_name)
            .map_err(|e| UploadError::RemoteRejected(e.to_string()))?;
        if cancel.is_cancelled() {
            return Err(UploadError::Cancelled);
        }

        // 1. Hash
        let algorithm = self.algorithm();
        let (source, digest) = self
            .prepare_source(source, algorithm, request.total_size, cancel)
            .await
            .map_err(|e| e.at(Stage::Hashing))?;
        debug!(file = %request.file_name, %algorithm, digest = %digest, "content hashed");

        // 2. Negotiate
        let negotiator = SessionNegotiator::new(Arc::clone(&self.remote), Arc::clone(&self.credentials));
        let session = negotiator
            .open(
                &request.destination_id,
                &request.file_name,
                request.total_size,
                &digest,
                cancel,
            )
            .await
            .map_err(|e| e.at(Stage::Negotiation))?;

        let progress_total = request.total_size;
        if session.reuse_existing() {
            let progress = ProgressAggregator::new(progress_total, on_progress);
            progress.complete();
            let id = session
                .existing_object_id()
                .unwrap_or(session.session_key())
                .to_string();
            return Ok(self.object_meta(id, request, &digest));
        }

        // 3. Plan
        let plan = plan_session(&session, request.total_size, self.config.empty_file)?;
        let progress = Arc::new(ProgressAggregator::with_completed(
            progress_total,
            plan.done_bytes(),
            on_progress,
        ));
        info!(
            session = %session.session_key(),
            chunks = plan.len(),
            pending = plan.pending_count(),
            chunk_size = plan.chunk_size(),
            "chunk plan ready"
        );

        // 4. Upload
        let mut chunks = plan.into_chunks();
        let uploader = ChunkUploader::new(
            Arc::clone(&self.remote),
            Arc::clone(&self.credentials),
            algorithm,
            self.config.effective_concurrency(),
        )
        .with_endpoint_index(self.config.endpoint_index);
        let outcome = uploader
            .upload_all(&session, &mut chunks, source, Arc::clone(&progress), cancel)
            .await?;

        // 5. Poll
        let key = outcome
            .assembly_key
            .unwrap_or_else(|| session.session_key().to_string());
        let poller = CompletionPoller::new(
            Arc::clone(&self.remote),
            Arc::clone(&self.credentials),
            self.config.poll_interval(),
            self.config.max_poll_attempts,
        );
        let status = poller.await_completion(&key, cancel).await?;

        progress.complete();
        let id = status
            .remote_object_id
            .unwrap_or_else(|| session.session_key().to_string());
        Ok(self.object_meta(id, request, &digest))
    }

    /// Hashes the source, spooling forward-only streams to disk first, and
    /// checks its length against the declared size.
    async fn prepare_source(
        &self,
        source: UploadSource,
        algorithm: HashAlgorithm,
        total_size: u64,
        cancel: &CancellationToken,
    ) -> Result<(Arc<dyn RangeSource>, ContentDigest), UploadError> {
        let task = tokio::task::spawn_blocking(move || -> Result<_, TransferError> {
            match source {
                UploadSource::RandomAccess(src) => {
                    let digest = digest_source(algorithm, src.as_ref())?;
                    Ok((src, digest))
                }
                UploadSource::Stream(reader) => {
                    let (spooled, digest) = buffer_stream(reader, algorithm)?;
                    let src: Arc<dyn RangeSource> = Arc::new(spooled);
                    Ok((src, digest))
                }
            }
        });
        let joined = until_cancelled(cancel, async {
            task.await.map_err(|e| UploadError::Worker(e.to_string()))
        })
        .await?;
        let (src, digest) = joined?;

        if src.len() != total_size {
            return Err(UploadError::Integrity {
                what: "source size".into(),
                expected: total_size.to_string(),
                actual: src.len().to_string(),
            });
        }
        Ok((src, digest))
    }

    fn object_meta(&self, id: String, request: &UploadRequest, digest: &ContentDigest) -> ObjectMeta {
        let mut meta = ObjectMeta::file(id, request.file_name.clone(), request.total_size);
        meta.hash = Some(digest.hex());
        meta
    }
}

/// Splits the file by the negotiated chunk size. An unusable chunk size is the
/// remote's fault and is reported against negotiation.
fn plan_session(
    session: &UploadSession,
    total_size: u64,
    empty_file: EmptyFile,
) -> Result<ChunkPlan, UploadError> {
    plan(total_size, session.chunk_size(), session.uploaded(), empty_file).map_err(|e| match e {
        TransferError::ZeroChunkSize => {
            UploadError::RemoteRejected("chunk size is zero".into()).at(Stage::Negotiation)
        }
        other => UploadError::from(other),
    })
}
