//! Storage drivers and the glue between them and the upload engine.
//!
//! A [`StorageDriver`] is a thin adapter over one backend's REST API for
//! everything except uploads. [`Storage`] pairs a driver with an
//! [`UploadOrchestrator`](cloudmux_upload::UploadOrchestrator) so `put`
//! runs through the chunked engine, and waits for asynchronous copy tasks.

mod driver;
mod error;
mod storage;

pub use driver::{CopyOutcome, CopyStatus, DriverFuture, StorageDriver};
pub use error::DriverError;
pub use storage::{COPY_POLL_ATTEMPTS, COPY_POLL_INTERVAL, Storage};
