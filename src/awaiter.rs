//! Waiting for an item's task queue to settle
//!
//! The archive processes administrative work (uploads, visibility changes,
//! derivatives) on an asynchronous task queue. The only externally visible
//! completion signal is the absence of queued and running tasks for the
//! identifier, so [`TaskAwaiter`] polls the task summary until that holds.
//!
//! Each poll is one status query. The first query runs immediately and every
//! later query is preceded by exactly one delay, so a budget of `n` queries
//! blocks for at most `n - 1` delays plus query time.
//!
//! # Example
//!
//! ```no_run
//! use archive_fixture::{Config, HttpArchiveClient, ItemId, TaskAwaiter};
//! use std::sync::Arc;
//!
//! # async fn example() -> archive_fixture::Result<()> {
//! let config = Config::load(".")?;
//! let client = Arc::new(HttpArchiveClient::new(&config)?);
//! let awaiter = TaskAwaiter::new(client, config.wait.clone());
//!
//! let settled = awaiter.wait_for_settled(&ItemId::new("my-item")?).await?;
//! println!("settled after {} queries", settled.attempts);
//! # Ok(())
//! # }
//! ```

use crate::client::ArchiveClient;
use crate::config::{RetryConfig, WaitConfig};
use crate::error::AwaitError;
use crate::retry::{add_jitter, next_backoff, with_retry_cancellable};
use crate::types::{ItemId, TaskSummary};
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;

/// Decides how long to sleep between status queries
pub trait DelayStrategy: Send + Sync + std::fmt::Debug {
    /// Delay to wait after `attempt` unsettled queries (1-based) before the next one
    fn delay(&self, attempt: u32) -> Duration;
}

/// Same delay between every query
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct FixedDelay(pub Duration);

impl DelayStrategy for FixedDelay {
    fn delay(&self, _attempt: u32) -> Duration {
        self.0
    }
}

/// Exponentially growing delay, capped, with optional jitter
#[derive(Clone, Debug, PartialEq)]
pub struct ExponentialBackoff {
    /// Delay after the first unsettled query
    pub initial: Duration,
    /// Growth factor per query
    pub multiplier: f64,
    /// Upper bound before jitter
    pub max: Duration,
    /// Stretch each delay by a random factor in `[1, 2]`
    pub jitter: bool,
}

impl ExponentialBackoff {
    /// Build from the backoff parameters of a retry policy
    pub fn from_retry_config(config: &RetryConfig) -> Self {
        Self {
            initial: config.initial_delay,
            multiplier: config.backoff_multiplier,
            max: config.max_delay,
            jitter: config.jitter,
        }
    }

    fn base_delay(&self, attempt: u32) -> Duration {
        let mut delay = self.initial.min(self.max);
        for _ in 1..attempt {
            delay = next_backoff(delay, self.multiplier, self.max);
            if delay == self.max {
                break;
            }
        }
        delay
    }
}

impl DelayStrategy for ExponentialBackoff {
    fn delay(&self, attempt: u32) -> Duration {
        let delay = self.base_delay(attempt);
        if self.jitter { add_jitter(delay) } else { delay }
    }
}

/// Polling state, driven only by the counters and the query count
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum WaitState {
    /// Work remains; `attempt` is the next query number
    Polling {
        /// 1-based number of the next query
        attempt: u32,
    },
    /// No queued or running work
    Settled,
    /// The queue reports failed tasks
    Errored,
    /// Budget spent while work remained
    TimedOut,
}

impl WaitState {
    /// State after observing `summary` on query number `attempt` of `max_retries`
    ///
    /// Errors win over settlement: a summary with failed tasks is never
    /// reported as settled even when nothing is queued or running.
    pub fn after(summary: &TaskSummary, attempt: u32, max_retries: u32) -> Self {
        if summary.has_errors() {
            WaitState::Errored
        } else if summary.is_settled() {
            WaitState::Settled
        } else if attempt >= max_retries {
            WaitState::TimedOut
        } else {
            WaitState::Polling {
                attempt: attempt + 1,
            }
        }
    }
}

/// Successful wait outcome
#[must_use]
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Settled {
    /// Number of status queries issued, including the settling one
    pub attempts: u32,
    /// The settled summary
    pub summary: TaskSummary,
}

/// Polls an item's task summary until the queue settles
///
/// Holds no mutable state, so one awaiter can wait on several identifiers
/// from different tasks at once. Waiting twice concurrently on the same
/// identifier is not coordinated.
#[derive(Clone)]
pub struct TaskAwaiter {
    client: Arc<dyn ArchiveClient>,
    config: WaitConfig,
    delay: Arc<dyn DelayStrategy>,
    cancel: CancellationToken,
}

impl std::fmt::Debug for TaskAwaiter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TaskAwaiter")
            .field("config", &self.config)
            .field("delay", &self.delay)
            .field("cancelled", &self.cancel.is_cancelled())
            .finish_non_exhaustive()
    }
}

impl TaskAwaiter {
    /// Create an awaiter with a fixed delay of `config.interval`
    pub fn new(client: Arc<dyn ArchiveClient>, config: WaitConfig) -> Self {
        let delay = Arc::new(FixedDelay(config.interval));
        Self {
            client,
            config,
            delay,
            cancel: CancellationToken::new(),
        }
    }

    /// Replace the delay strategy
    pub fn with_delay(mut self, delay: Arc<dyn DelayStrategy>) -> Self {
        self.delay = delay;
        self
    }

    /// Attach a cancellation token
    ///
    /// Checked before each query, and raced against both the delay between
    /// queries and the backoff between transport retries.
    pub fn with_cancellation(mut self, token: CancellationToken) -> Self {
        self.cancel = token;
        self
    }

    /// Polling settings in use
    pub fn config(&self) -> &WaitConfig {
        &self.config
    }

    /// Wait until `identifier` has no queued or running tasks
    ///
    /// Uses the configured budget and delay strategy. Returns as soon as the
    /// queue settles, reports failed tasks, the budget runs out, or the
    /// cancellation token fires between queries.
    pub async fn wait_for_settled(&self, identifier: &ItemId) -> Result<Settled, AwaitError> {
        self.poll(identifier, self.config.max_retries, self.delay.as_ref())
            .await
    }

    /// Like [`wait_for_settled`](Self::wait_for_settled) with an explicit budget and fixed interval
    ///
    /// A budget of zero issues no query and times out immediately.
    pub async fn wait_for_settled_with(
        &self,
        identifier: &ItemId,
        max_retries: u32,
        interval: Duration,
    ) -> Result<Settled, AwaitError> {
        self.poll(identifier, max_retries, &FixedDelay(interval))
            .await
    }

    async fn poll(
        &self,
        identifier: &ItemId,
        max_retries: u32,
        delay: &dyn DelayStrategy,
    ) -> Result<Settled, AwaitError> {
        if max_retries == 0 {
            return Err(AwaitError::Timeout {
                identifier: identifier.to_string(),
                attempts: 0,
                last: None,
            });
        }

        let mut attempt = 1;
        loop {
            if self.cancel.is_cancelled() {
                return Err(self.cancelled(identifier, attempt - 1));
            }

            let summary = self.query(identifier, attempt).await?;
            tracing::debug!(
                identifier = %identifier,
                attempt,
                max_retries,
                queued = summary.queued,
                running = summary.running,
                error = summary.error,
                "task summary"
            );

            match WaitState::after(&summary, attempt, max_retries) {
                WaitState::Settled => {
                    tracing::info!(identifier = %identifier, attempts = attempt, "task queue settled");
                    return Ok(Settled {
                        attempts: attempt,
                        summary,
                    });
                }
                WaitState::Errored => {
                    tracing::error!(
                        identifier = %identifier,
                        error = summary.error,
                        "task queue reports failed tasks"
                    );
                    return Err(AwaitError::RemoteTask {
                        identifier: identifier.to_string(),
                        summary,
                    });
                }
                WaitState::TimedOut => {
                    tracing::warn!(
                        identifier = %identifier,
                        attempts = attempt,
                        queued = summary.queued,
                        running = summary.running,
                        "task queue did not settle within budget"
                    );
                    return Err(AwaitError::Timeout {
                        identifier: identifier.to_string(),
                        attempts: attempt,
                        last: Some(summary),
                    });
                }
                WaitState::Polling { attempt: next } => {
                    let wait = delay.delay(attempt);
                    tokio::select! {
                        biased;
                        _ = self.cancel.cancelled() => {
                            return Err(self.cancelled(identifier, attempt));
                        }
                        _ = tokio::time::sleep(wait) => {}
                    }
                    attempt = next;
                }
            }
        }
    }

    /// One status query; transport retries stop as soon as the token fires
    async fn query(&self, identifier: &ItemId, attempt: u32) -> Result<TaskSummary, AwaitError> {
        with_retry_cancellable(
            &self.config.transport_retry,
            &self.cancel,
            || self.cancelled(identifier, attempt - 1),
            || async {
                self.client
                    .task_summary(identifier)
                    .await
                    .map_err(|e| AwaitError::Query {
                        identifier: identifier.to_string(),
                        source: Box::new(e),
                    })
            },
        )
        .await
        .inspect_err(|e| {
            if !matches!(e, AwaitError::Cancelled { .. }) {
                tracing::error!(identifier = %identifier, error = %e, "task status query failed");
            }
        })
    }

    fn cancelled(&self, identifier: &ItemId, attempts: u32) -> AwaitError {
        tracing::info!(identifier = %identifier, attempts, "waiting cancelled");
        AwaitError::Cancelled {
            identifier: identifier.to_string(),
            attempts,
        }
    }
}
