use std::sync::Arc;
use std::time::Duration;

use cloudmux_protocol::ObjectMeta;
use cloudmux_transfer::ProgressCallback;
use cloudmux_upload::{PollStep, UploadOrchestrator, UploadRequest, UploadSource, poll_until};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

use crate::driver::{CopyOutcome, CopyStatus, StorageDriver};
use crate::error::DriverError;

/// Delay between copy-task status checks.
pub const COPY_POLL_INTERVAL: Duration = Duration::from_secs(1);

/// Status checks before a copy task is given up on.
pub const COPY_POLL_ATTEMPTS: u32 = 60;

/// One mounted backend: its driver plus the upload engine bound to it.
pub struct Storage {
    driver: Arc<dyn StorageDriver>,
    uploads: UploadOrchestrator,
}

impl Storage {
    pub fn new(driver: Arc<dyn StorageDriver>, uploads: UploadOrchestrator) -> Self {
        Self { driver, uploads }
    }

    pub fn driver(&self) -> &dyn StorageDriver {
        self.driver.as_ref()
    }

    /// Uploads `source` into `folder_id` through the chunked engine.
    pub async fn put(
        &self,
        folder_id: &str,
        file_name: &str,
        total_size: u64,
        source: UploadSource,
        on_progress: Option<ProgressCallback>,
        cancel: &CancellationToken,
    ) -> Result<ObjectMeta, DriverError> {
        debug!(driver = self.driver.name(), folder = folder_id, file = file_name, size = total_size, "put");
        let request = UploadRequest {
            destination_id: folder_id.to_string(),
            file_name: file_name.to_string(),
            total_size,
        };
        Ok(self.uploads.upload(request, source, on_progress, cancel).await?)
    }

    /// Copies `object_id` into `dest_folder_id` and waits for the result.
    ///
    /// Backends that queue copies are polled every [`COPY_POLL_INTERVAL`]
    /// up to [`COPY_POLL_ATTEMPTS`] times.
    pub async fn copy_and_wait(
        &self,
        object_id: &str,
        dest_folder_id: &str,
        cancel: &CancellationToken,
    ) -> Result<ObjectMeta, DriverError> {
        let outcome = tokio::select! {
            biased;
            _ = cancel.cancelled() => return Err(DriverError::Cancelled),
            outcome = self.driver.copy(object_id, dest_folder_id) => outcome?,
        };

        let task_id = match outcome {
            CopyOutcome::Done(meta) => return Ok(meta),
            CopyOutcome::Submitted { task_id } => task_id,
        };
        info!(driver = self.driver.name(), object = object_id, task = %task_id, "copy task submitted");

        let driver = self.driver.as_ref();
        let task = task_id.as_str();
        let meta = poll_until(COPY_POLL_INTERVAL, Some(COPY_POLL_ATTEMPTS), cancel, move |attempt| async move {
            match driver.copy_status(task).await {
                Ok(CopyStatus::Done(meta)) => Ok(PollStep::Ready(meta)),
                Ok(CopyStatus::Running) => {
                    debug!(task, attempt, "copy task running");
                    Ok(PollStep::Pending)
                }
                Ok(CopyStatus::Failed(message)) => Err(DriverError::CopyFailed {
                    task_id: task.to_string(),
                    message,
                }),
                Err(e) => Err(e),
            }
        })
        .await?;

        info!(task = %task_id, object = %meta.id, "copy task finished");
        Ok(meta)
    }
}
