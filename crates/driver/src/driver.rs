use std::future::Future;
use std::pin::Pin;

use cloudmux_protocol::ObjectMeta;

use crate::error::DriverError;

pub type DriverFuture<'a, T> = Pin<Box<dyn Future<Output = Result<T, DriverError>> + Send + 'a>>;

/// Result of starting a copy.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CopyOutcome {
    /// The backend copied synchronously.
    Done(ObjectMeta),
    /// The backend queued a task; poll it with [`StorageDriver::copy_status`].
    Submitted { task_id: String },
}

/// State of a queued copy task.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CopyStatus {
    Running,
    Done(ObjectMeta),
    Failed(String),
}

/// Non-upload operations of one storage backend.
///
/// Identifiers are the backend's own object ids. Implementations obtain
/// auth headers from their credential supplier per call.
pub trait StorageDriver: Send + Sync {
    /// Short backend name for logs and errors.
    fn name(&self) -> &str;

    fn list<'a>(&'a self, folder_id: &'a str) -> DriverFuture<'a, Vec<ObjectMeta>>;

    /// Returns a URL the object can be downloaded from.
    fn link<'a>(&'a self, object_id: &'a str) -> DriverFuture<'a, String>;

    fn make_dir<'a>(&'a self, parent_id: &'a str, name: &'a str) -> DriverFuture<'a, ObjectMeta>;

    fn move_object<'a>(&'a self, object_id: &'a str, dest_folder_id: &'a str) -> DriverFuture<'a, ObjectMeta>;

    fn rename<'a>(&'a self, object_id: &'a str, new_name: &'a str) -> DriverFuture<'a, ObjectMeta>;

    fn copy<'a>(&'a self, object_id: &'a str, dest_folder_id: &'a str) -> DriverFuture<'a, CopyOutcome>;

    /// Reports on a task returned by [`copy`](Self::copy).
    ///
    /// The default suits backends that only ever copy synchronously.
    fn copy_status<'a>(&'a self, task_id: &'a str) -> DriverFuture<'a, CopyStatus> {
        let _ = task_id;
        Box::pin(async move {
            Err(DriverError::Unsupported {
                driver: self.name().to_string(),
                operation: "copy_status",
            })
        })
    }

    fn remove<'a>(&'a self, object_id: &'a str) -> DriverFuture<'a, ()>;
}
