//! Provisioning test items
//!
//! Provisioning is two-phase: one upload that creates the bucket, stores the
//! test file and attaches metadata, then a wait for the task queue to settle.
//! Callers never see an item that exists but is still being processed. An
//! upload that succeeds followed by a wait that fails is still a failure.

use crate::awaiter::TaskAwaiter;
use crate::client::ArchiveClient;
use crate::config::ProvisionConfig;
use crate::error::Result;
use crate::types::{ItemId, ItemMetadata, MetadataEntry, PutRequest, TaskCommand};
use std::path::PathBuf;
use std::sync::Arc;

/// Creates test items and makes them visible
#[derive(Clone, Debug)]
pub struct ItemProvisioner {
    client: Arc<dyn ArchiveClient>,
    awaiter: TaskAwaiter,
    config: ProvisionConfig,
    local_path: PathBuf,
    remote_filename: String,
}

impl ItemProvisioner {
    /// Create a provisioner uploading `local_path` as `remote_filename`
    pub fn new(
        client: Arc<dyn ArchiveClient>,
        awaiter: TaskAwaiter,
        config: ProvisionConfig,
        local_path: impl Into<PathBuf>,
        remote_filename: impl Into<String>,
    ) -> Self {
        Self {
            client,
            awaiter,
            config,
            local_path: local_path.into(),
            remote_filename: remote_filename.into(),
        }
    }

    /// Metadata every provisioned item starts with: collection, media type, index suppression
    pub fn baseline_metadata(&self) -> Vec<MetadataEntry> {
        vec![
            MetadataEntry::new("collection", &self.config.collection),
            MetadataEntry::new("mediatype", &self.config.mediatype),
            MetadataEntry::new("noindex", self.config.noindex.to_string()),
        ]
    }

    /// Baseline entries followed by `extra`, in order and unmodified
    pub fn merged_metadata(
        &self,
        extra: impl IntoIterator<Item = MetadataEntry>,
    ) -> Vec<MetadataEntry> {
        let mut metadata = self.baseline_metadata();
        metadata.extend(extra);
        metadata
    }

    /// Build the single upload request for `identifier`
    pub fn put_request(
        &self,
        identifier: ItemId,
        extra: impl IntoIterator<Item = MetadataEntry>,
    ) -> PutRequest {
        PutRequest {
            bucket: identifier,
            local_path: self.local_path.clone(),
            remote_filename: self.remote_filename.clone(),
            metadata: self.merged_metadata(extra),
            create_bucket: true,
            no_derive: true,
        }
    }

    /// Ensure an item exists with the test file and baseline metadata, then wait for it to settle
    ///
    /// Generates a fresh `etc-tmp-…` identifier when none is given. Upload
    /// failures are returned unchanged; a wait failure is returned as
    /// [`Error::Await`](crate::Error::Await).
    ///
    /// Provisioning the same identifier twice is not guaranteed to be safe.
    pub async fn provision(
        &self,
        identifier: Option<ItemId>,
        extra: impl IntoIterator<Item = MetadataEntry>,
    ) -> Result<ItemId> {
        let identifier = identifier.unwrap_or_else(ItemId::generate);
        let request = self.put_request(identifier.clone(), extra);

        tracing::info!(
            identifier = %identifier,
            file = %request.remote_filename,
            entries = request.metadata.len(),
            "provisioning test item"
        );

        self.client.put_item(&request).await?;
        let settled = self.awaiter.wait_for_settled(&identifier).await?;

        tracing::info!(
            identifier = %identifier,
            attempts = settled.attempts,
            "test item provisioned"
        );
        Ok(identifier)
    }

    /// Undark `identifier` if it is dark, and wait for the visibility task to settle
    ///
    /// Returns the metadata as read before any undark task was submitted.
    pub async fn ensure_visible(&self, identifier: &ItemId) -> Result<ItemMetadata> {
        let metadata = self.client.read_metadata(identifier).await?;
        if metadata.is_dark() {
            self.undark(identifier).await?;
        }
        Ok(metadata)
    }

    /// Submit an undark task for `identifier` and wait for the queue to settle
    pub async fn undark(&self, identifier: &ItemId) -> Result<()> {
        tracing::info!(identifier = %identifier, "item is dark, requesting undark");
        self.client
            .submit_task(identifier, TaskCommand::MakeUndark, &self.config.task_comment)
            .await?;
        let settled = self.awaiter.wait_for_settled(identifier).await?;
        tracing::info!(identifier = %identifier, attempts = settled.attempts, "item undarked");
        Ok(())
    }

    /// Local file uploaded into provisioned items
    pub fn local_path(&self) -> &std::path::Path {
        &self.local_path
    }

    /// File name used inside provisioned items
    pub fn remote_filename(&self) -> &str {
        &self.remote_filename
    }
}

// unwrap/expect are acceptable in tests for concise failure-on-error assertions
#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::WaitConfig;
    use crate::error::{AwaitError, Error};
    use crate::test_helpers::{Reply, ScriptedClient};
    use crate::types::{GENERATED_ID_PREFIX, TaskSummary};
    use std::time::Duration;

    fn provisioner(client: Arc<ScriptedClient>, max_retries: u32) -> ItemProvisioner {
        let wait = WaitConfig {
            max_retries,
            interval: Duration::ZERO,
            ..Default::default()
        };
        let awaiter = TaskAwaiter::new(client.clone(), wait);
        ItemProvisioner::new(
            client,
            awaiter,
            ProvisionConfig::default(),
            "hello.txt",
            "hello.txt",
        )
    }

    #[test]
    fn baseline_only_without_extras() {
        let client = Arc::new(ScriptedClient::default());
        let p = provisioner(client, 1);

        let metadata = p.merged_metadata(Vec::new());
        assert_eq!(
            metadata,
            vec![
                MetadataEntry::new("collection", "test_collection"),
                MetadataEntry::new("mediatype", "texts"),
                MetadataEntry::new("noindex", "true"),
            ]
        );
    }

    #[test]
    fn extras_appended_after_baseline() {
        let client = Arc::new(ScriptedClient::default());
        let p = provisioner(client, 1);

        let metadata = p.merged_metadata([
            MetadataEntry::new("title", "Some Title"),
            MetadataEntry::new("collection", "second"),
        ]);
        assert_eq!(metadata.len(), 5);
        assert_eq!(metadata[3], MetadataEntry::new("title", "Some Title"));
        // repeated keys are kept, not merged
        assert_eq!(metadata[4], MetadataEntry::new("collection", "second"));
        assert_eq!(metadata[0], MetadataEntry::new("collection", "test_collection"));
    }

    #[tokio::test]
    async fn provision_generates_identifier_and_waits() {
        let client = Arc::new(ScriptedClient::new([Reply::busy(), Reply::settled()]));
        let p = provisioner(client.clone(), 10);

        let id = p.provision(None, Vec::new()).await.unwrap();

        assert!(id.as_str().starts_with(GENERATED_ID_PREFIX));
        let puts = client.puts.lock().unwrap();
        assert_eq!(puts.len(), 1);
        let put = &puts[0];
        assert_eq!(put.bucket, id);
        assert!(put.create_bucket);
        assert!(put.no_derive);
        assert_eq!(put.remote_filename, "hello.txt");
        assert_eq!(put.metadata.len(), 3);
        assert_eq!(client.query_count(), 2);
    }

    #[tokio::test]
    async fn provision_with_extra_entry_keeps_it_fourth() {
        let client = Arc::new(ScriptedClient::new([Reply::settled()]));
        let p = provisioner(client.clone(), 10);
        let id = ItemId::new("named-item").unwrap();

        let returned = p
            .provision(Some(id.clone()), [MetadataEntry::new("title", "hello")])
            .await
            .unwrap();

        assert_eq!(returned, id);
        let puts = client.puts.lock().unwrap();
        assert_eq!(puts[0].metadata[3], MetadataEntry::new("title", "hello"));
        assert_eq!(client.queries.lock().unwrap()[0], id);
    }

    #[tokio::test]
    async fn upload_failure_propagates_unchanged_without_waiting() {
        let client = Arc::new(ScriptedClient::new([Reply::settled()]));
        *client.fail_put.lock().unwrap() = Some(403);
        let p = provisioner(client.clone(), 10);

        let err = p.provision(None, Vec::new()).await.unwrap_err();

        assert!(matches!(err, Error::Api { status: 403, .. }));
        assert_eq!(client.query_count(), 0);
    }

    #[tokio::test]
    async fn wait_timeout_fails_provisioning() {
        let client = Arc::new(ScriptedClient::new([Reply::busy()]));
        let p = provisioner(client.clone(), 3);

        let err = p.provision(None, Vec::new()).await.unwrap_err();

        assert!(matches!(err, Error::Await(ref e) if e.is_timeout()));
        assert_eq!(client.puts.lock().unwrap().len(), 1, "upload itself succeeded");
    }

    #[tokio::test]
    async fn wait_error_count_fails_provisioning() {
        let client = Arc::new(ScriptedClient::new([Reply::Summary(TaskSummary::new(
            0, 0, 1,
        ))]));
        let p = provisioner(client.clone(), 3);

        let err = p.provision(None, Vec::new()).await.unwrap_err();
        assert!(matches!(err, Error::Await(AwaitError::RemoteTask { .. })));
    }

    #[tokio::test]
    async fn dark_item_is_undarked_and_awaited() {
        let client = Arc::new(
            ScriptedClient::new([Reply::busy(), Reply::settled()]).with_metadata(ItemMetadata {
                is_dark: Some(true),
                ..Default::default()
            }),
        );
        let p = provisioner(client.clone(), 10);
        let id = ItemId::new("dark-item").unwrap();

        assert!(p.ensure_visible(&id).await.unwrap().is_dark());

        let tasks = client.tasks.lock().unwrap();
        assert_eq!(tasks.len(), 1);
        assert_eq!(tasks[0].0, id);
        assert_eq!(tasks[0].1, TaskCommand::MakeUndark);
        assert_eq!(tasks[0].2, "used in automated tests");
        assert_eq!(client.query_count(), 2);
    }

    #[tokio::test]
    async fn visible_item_needs_no_task() {
        let client = Arc::new(ScriptedClient::new([Reply::settled()]));
        let p = provisioner(client.clone(), 10);

        let metadata = p.ensure_visible(&ItemId::new("open").unwrap()).await.unwrap();
        assert!(!metadata.is_dark());
        assert!(client.tasks.lock().unwrap().is_empty());
        assert_eq!(client.query_count(), 0);
    }
}
