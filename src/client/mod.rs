//! Remote archive client
//!
//! [`ArchiveClient`] is the seam between the orchestration in this crate and
//! the remote service. The awaiter and provisioner only ever talk to a
//! `dyn ArchiveClient`, so tests substitute an in-memory implementation and
//! production code uses [`HttpArchiveClient`].

mod http;

pub use http::HttpArchiveClient;

use crate::error::Result;
use crate::types::{ItemId, ItemMetadata, PutRequest, TaskCommand, TaskSummary};
use async_trait::async_trait;

/// Operations consumed from the remote archive service
///
/// Implementations must be safe to share across tasks: several identifiers
/// may be awaited concurrently through one handle.
#[async_trait]
pub trait ArchiveClient: Send + Sync {
    /// Query outstanding task counters for an item
    ///
    /// A response that does not report success is returned as an error,
    /// never as an empty summary.
    async fn task_summary(&self, identifier: &ItemId) -> Result<TaskSummary>;

    /// Enqueue an administrative task against an item
    async fn submit_task(
        &self,
        identifier: &ItemId,
        command: TaskCommand,
        comment: &str,
    ) -> Result<()>;

    /// Create the bucket (if requested), upload one file and attach metadata
    async fn put_item(&self, request: &PutRequest) -> Result<()>;

    /// Read the current metadata and file listing of an item
    async fn read_metadata(&self, identifier: &ItemId) -> Result<ItemMetadata>;
}

impl std::fmt::Debug for dyn ArchiveClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("dyn ArchiveClient")
    }
}
