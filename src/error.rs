//! Error types for archive-fixture
//!
//! Two layers:
//! - [`AwaitError`] describes why waiting for an item's task queue to settle failed
//! - [`Error`] is the crate-wide error, wrapping client, configuration and await failures
//!
//! None of these are recovered locally. A failure is always a definitive outcome
//! for the caller.

use crate::types::TaskSummary;
use thiserror::Error;

/// Result type alias for archive-fixture operations
pub type Result<T> = std::result::Result<T, Error>;

/// Main error type for archive-fixture
#[derive(Debug, Error)]
pub enum Error {
    /// Configuration error with context about which setting is invalid
    #[error("configuration error: {message}")]
    Config {
        /// Human-readable error message describing the configuration issue
        message: String,
        /// The configuration key that caused the error (e.g., "AccessKey")
        key: Option<String>,
    },

    /// Item identifier was empty
    #[error("invalid item identifier: {0:?}")]
    InvalidIdentifier(String),

    /// Network error
    #[error("network error: {0}")]
    Network(#[from] reqwest::Error),

    /// The service answered but reported failure
    #[error("API error (HTTP {status}): {message}")]
    Api {
        /// HTTP status code of the response
        status: u16,
        /// Error message reported by the service
        message: String,
    },

    /// Invalid endpoint URL
    #[error("invalid URL: {0}")]
    Url(#[from] url::ParseError),

    /// Serialization error
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// I/O error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Waiting for the task queue to settle failed
    #[error(transparent)]
    Await(#[from] AwaitError),
}

impl Error {
    /// Shorthand for a configuration error tied to a settings key
    pub fn config(key: &str, message: impl Into<String>) -> Self {
        Error::Config {
            message: message.into(),
            key: Some(key.to_string()),
        }
    }
}

/// Why waiting for an item's task queue to settle failed
#[derive(Debug, Error)]
pub enum AwaitError {
    /// The task status query itself did not complete successfully
    #[error("task status query for {identifier} failed: {source}")]
    Query {
        /// Item being awaited
        identifier: String,
        /// Underlying client failure
        #[source]
        source: Box<Error>,
    },

    /// The task queue reports failed tasks for the item
    #[error("task queue reports {} failed task(s) for {identifier} ({summary})", .summary.error)]
    RemoteTask {
        /// Item being awaited
        identifier: String,
        /// Summary that contained the error count
        summary: TaskSummary,
    },

    /// Retry budget exhausted while work was still queued or running
    #[error(
        "timeout exceeded: {identifier} not settled after {attempts} queries{}",
        .last.map(|s| format!(" ({s})")).unwrap_or_default()
    )]
    Timeout {
        /// Item being awaited
        identifier: String,
        /// Number of status queries issued
        attempts: u32,
        /// Last summary observed, `None` when the budget allowed no query
        last: Option<TaskSummary>,
    },

    /// Waiting was cancelled between queries
    #[error("waiting for {identifier} cancelled after {attempts} queries")]
    Cancelled {
        /// Item being awaited
        identifier: String,
        /// Number of status queries issued before cancellation
        attempts: u32,
    },
}

impl AwaitError {
    /// The item did not settle within the retry budget
    pub fn is_timeout(&self) -> bool {
        matches!(self, AwaitError::Timeout { .. })
    }

    /// The task queue reported failed tasks
    pub fn is_remote_error(&self) -> bool {
        matches!(self, AwaitError::RemoteTask { .. })
    }

    /// Identifier of the item being awaited
    pub fn identifier(&self) -> &str {
        match self {
            AwaitError::Query { identifier, .. }
            | AwaitError::RemoteTask { identifier, .. }
            | AwaitError::Timeout { identifier, .. }
            | AwaitError::Cancelled { identifier, .. } => identifier,
        }
    }
}
