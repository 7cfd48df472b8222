//! # archive-fixture
//!
//! Test-fixture bootstrapper for clients of a remote digital archive.
//!
//! The archive processes uploads and administrative changes on an asynchronous
//! task queue, so "the call returned" does not mean "the item is ready". This
//! crate turns that eventually-consistent backend into a synchronous
//! precondition:
//!
//! - [`TaskAwaiter`] polls an item's task summary until nothing is queued or
//!   running, failing fast when the queue reports errors
//! - [`ItemProvisioner`] creates a test item with baseline metadata and one
//!   uploaded file, and only returns once the item has settled
//! - [`FixtureContext`] bootstraps a whole test run: configuration, client,
//!   undarking and provisioning of the shared test item
//!
//! ## Quick Start
//!
//! ```no_run
//! use archive_fixture::{Config, FixtureContext, MetadataEntry, init_logging};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let config = Config::load(".")?;
//!     init_logging(&config.log_level);
//!
//!     let context = FixtureContext::setup(config).await?;
//!
//!     let item = context
//!         .create_test_item([MetadataEntry::new("title", "scratch item")])
//!         .await?;
//!     println!("provisioned {item}");
//!
//!     Ok(())
//! }
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::unwrap_used)]
#![warn(clippy::expect_used)]

/// Waiting for task queues to settle
pub mod awaiter;
/// Remote archive client
pub mod client;
/// Configuration types
pub mod config;
/// Error types
pub mod error;
/// Test environment bootstrap
pub mod fixture;
/// Logging setup
pub mod logging;
/// Test item provisioning
pub mod provision;
/// Retry logic with exponential backoff
pub mod retry;
/// Core types
pub mod types;

#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
pub(crate) mod test_helpers;

// Re-export commonly used types
pub use awaiter::{DelayStrategy, ExponentialBackoff, FixedDelay, Settled, TaskAwaiter, WaitState};
pub use client::{ArchiveClient, HttpArchiveClient};
pub use config::{Config, ProvisionConfig, RetryConfig, WaitConfig};
pub use error::{AwaitError, Error, Result};
pub use fixture::{DateRange, FixtureContext};
pub use logging::init_logging;
pub use provision::ItemProvisioner;
pub use types::{
    ItemFile, ItemId, ItemMetadata, MetadataEntry, PutRequest, TaskCommand, TaskSummary,
};
