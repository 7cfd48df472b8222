//! Test environment bootstrap
//!
//! [`FixtureContext`] is built once per test run and passed to whatever needs
//! the client or the resolved configuration. There is no global state, so
//! independent contexts (for example against different mock servers) can
//! coexist in one process.

use crate::awaiter::TaskAwaiter;
use crate::client::{ArchiveClient, HttpArchiveClient};
use crate::config::Config;
use crate::error::Result;
use crate::provision::ItemProvisioner;
use crate::types::{ItemId, MetadataEntry};
use chrono::{Days, Local, NaiveDate, NaiveDateTime};
use std::sync::Arc;

/// Contents written to the local test file when it does not exist yet
pub const LOCAL_FILE_CONTENTS: &str = "test file for unit tests - ok to delete";

/// Format tag the archive assigns to plain text uploads
pub const TEXT_FORMAT: &str = "Text";

/// Date window used by tests that query time-bounded data
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct DateRange {
    /// First day of the window
    pub start: NaiveDate,
    /// Last day of the window
    pub end: NaiveDate,
}

impl DateRange {
    /// The seven days ending the day before `today`
    pub fn ending_before(today: NaiveDate) -> Self {
        let end = today.checked_sub_days(Days::new(1)).unwrap_or(today);
        let start = end.checked_sub_days(Days::new(7)).unwrap_or(end);
        Self { start, end }
    }

    /// Start of the window at midnight
    pub fn start_datetime(&self) -> NaiveDateTime {
        self.start.and_time(chrono::NaiveTime::MIN)
    }

    /// End of the window at midnight
    pub fn end_datetime(&self) -> NaiveDateTime {
        self.end.and_time(chrono::NaiveTime::MIN)
    }
}

/// Everything a test needs to talk to the archive
#[derive(Clone, Debug)]
pub struct FixtureContext {
    config: Config,
    client: Arc<dyn ArchiveClient>,
    awaiter: TaskAwaiter,
    provisioner: ItemProvisioner,
    dates: DateRange,
}

impl FixtureContext {
    /// Wire up components around an existing client without touching the network
    pub fn new(config: Config, client: Arc<dyn ArchiveClient>) -> Self {
        let awaiter = TaskAwaiter::new(client.clone(), config.wait.clone());
        let provisioner = ItemProvisioner::new(
            client.clone(),
            awaiter.clone(),
            config.provision.clone(),
            config.local_filename.clone(),
            config.remote_filename.clone(),
        );
        Self {
            config,
            client,
            awaiter,
            provisioner,
            dates: DateRange::ending_before(Local::now().date_naive()),
        }
    }

    /// Bootstrap the test environment against the real service
    ///
    /// Requires credentials, builds an [`HttpArchiveClient`] and then runs
    /// [`setup_with_client`](Self::setup_with_client).
    pub async fn setup(config: Config) -> Result<Self> {
        config.validate()?;
        config.require_credentials()?;
        let client = HttpArchiveClient::new(&config)?;
        Self::setup_with_client(config, Arc::new(client)).await
    }

    /// Bootstrap the test environment with any client
    ///
    /// 1. creates the local test file if missing
    /// 2. undarks the configured test item if it is dark, waiting for the task
    /// 3. provisions the test item if the test file is not in it yet
    pub async fn setup_with_client(
        config: Config,
        client: Arc<dyn ArchiveClient>,
    ) -> Result<Self> {
        config.validate()?;
        let test_item = ItemId::new(config.test_item.clone())?;
        let context = Self::new(config, client);

        context.ensure_local_file().await?;

        let metadata = context.provisioner.ensure_visible(&test_item).await?;

        if !metadata.has_file(&context.config.remote_filename, TEXT_FORMAT) {
            tracing::info!(identifier = %test_item, "test file missing from test item");
            context
                .provisioner
                .provision(Some(test_item.clone()), Vec::new())
                .await?;
        }

        tracing::info!(
            identifier = %test_item,
            start = %context.dates.start,
            end = %context.dates.end,
            "test environment ready"
        );
        Ok(context)
    }

    /// Create the local upload file with placeholder contents when it does not exist
    pub async fn ensure_local_file(&self) -> Result<()> {
        let path = &self.config.local_filename;
        if !tokio::fs::try_exists(path).await? {
            tracing::debug!(path = %path.display(), "creating local test file");
            tokio::fs::write(path, LOCAL_FILE_CONTENTS).await?;
        }
        Ok(())
    }

    /// Provision a fresh temporary item with optional extra metadata
    pub async fn create_test_item(
        &self,
        extra: impl IntoIterator<Item = MetadataEntry>,
    ) -> Result<ItemId> {
        self.provisioner.provision(None, extra).await
    }

    /// Wait for an item's task queue to settle using the configured budget
    pub async fn wait_for_server(&self, identifier: &ItemId) -> Result<()> {
        let _settled = self.awaiter.wait_for_settled(identifier).await?;
        Ok(())
    }

    /// Identifier of the long-lived test item
    pub fn test_item(&self) -> Result<ItemId> {
        ItemId::new(self.config.test_item.clone())
    }

    /// Resolved configuration
    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Shared client handle
    pub fn client(&self) -> &Arc<dyn ArchiveClient> {
        &self.client
    }

    /// Settlement awaiter
    pub fn awaiter(&self) -> &TaskAwaiter {
        &self.awaiter
    }

    /// Item provisioner
    pub fn provisioner(&self) -> &ItemProvisioner {
        &self.provisioner
    }

    /// Date window for time-bounded queries
    pub fn dates(&self) -> DateRange {
        self.dates
    }
}
