//! End-to-end tests against the real archive service
//!
//! These tests create real (temporary, unindexed) items. They only compile
//! with the `live-tests` feature and are additionally marked `#[ignore]`.
//!
//! # Running the tests
//!
//! ```bash
//! cargo test --features live-tests --test live_archive -- --ignored --nocapture
//! ```
//!
//! # Required settings
//!
//! `appsettings.json` in `ARCHIVE_SETTINGS_DIR` (default: current directory),
//! with credentials either in `appsettings.private.json` or in
//! `ARCHIVE_ACCESS_KEY` / `ARCHIVE_SECRET_KEY` (a `.env` file works too).

#![cfg(feature = "live-tests")]

mod common;

use archive_fixture::{FixtureContext, MetadataEntry, init_logging};
use common::{has_live_credentials, load_live_config};
use serial_test::serial;

#[tokio::test]
#[ignore]
#[serial]
async fn test_live_setup_and_provision() {
    if !has_live_credentials() {
        eprintln!("Skipping: archive credentials not found");
        return;
    }

    let config = load_live_config().expect("settings should load");
    init_logging(&config.log_level);

    let context = FixtureContext::setup(config)
        .await
        .expect("environment bootstrap should succeed");

    let id = context
        .create_test_item([MetadataEntry::new("title", "archive-fixture live test")])
        .await
        .expect("provisioning should settle");

    let metadata = context.client().read_metadata(&id).await.unwrap();
    assert!(metadata.has_file(&context.config().remote_filename, "Text"));
}

#[tokio::test]
#[ignore]
#[serial]
async fn test_live_test_item_is_settled() {
    if !has_live_credentials() {
        eprintln!("Skipping: archive credentials not found");
        return;
    }

    let context = FixtureContext::setup(load_live_config().unwrap())
        .await
        .unwrap();
    let item = context.test_item().unwrap();

    let settled = context
        .awaiter()
        .wait_for_settled_with(&item, 1, std::time::Duration::ZERO)
        .await
        .expect("setup leaves the test item settled");
    assert_eq!(settled.attempts, 1);
}
