//! Common test utilities for archive-fixture integration tests

#[allow(dead_code)]
pub mod config;
#[allow(dead_code)]
pub mod mock_archive;

pub use config::*;
#[allow(unused_imports)]
pub use mock_archive::*;
