//! Shared test helpers: an in-memory [`ArchiveClient`] driven by a script.

use crate::awaiter::DelayStrategy;
use crate::client::ArchiveClient;
use crate::error::{Error, Result};
use crate::types::{ItemId, ItemMetadata, PutRequest, TaskCommand, TaskSummary};
use async_trait::async_trait;
use std::collections::VecDeque;
use std::sync::Mutex;
use std::sync::atomic::{AtomicU32, Ordering};
use std::time::Duration;

/// One scripted answer to a task status query
#[derive(Clone, Debug)]
pub(crate) enum Reply {
    Summary(TaskSummary),
    /// Service answered with this HTTP status
    Fail(u16),
}

impl Reply {
    pub(crate) fn busy() -> Self {
        Reply::Summary(TaskSummary::new(1, 0, 0))
    }

    pub(crate) fn settled() -> Self {
        Reply::Summary(TaskSummary::new(0, 0, 0))
    }

    fn into_result(self) -> Result<TaskSummary> {
        match self {
            Reply::Summary(s) => Ok(s),
            Reply::Fail(status) => Err(Error::Api {
                status,
                message: "scripted failure".to_string(),
            }),
        }
    }
}

/// Client that replays scripted status replies and records every call
///
/// The last scripted reply is sticky: once the script is down to one entry
/// it is returned for every further query.
#[derive(Debug, Default)]
pub(crate) struct ScriptedClient {
    replies: Mutex<VecDeque<Reply>>,
    pub(crate) metadata: Mutex<ItemMetadata>,
    pub(crate) fail_put: Mutex<Option<u16>>,
    pub(crate) queries: Mutex<Vec<ItemId>>,
    pub(crate) metadata_reads: AtomicU32,
    pub(crate) tasks: Mutex<Vec<(ItemId, TaskCommand, String)>>,
    pub(crate) puts: Mutex<Vec<PutRequest>>,
}

impl ScriptedClient {
    pub(crate) fn new(replies: impl IntoIterator<Item = Reply>) -> Self {
        Self {
            replies: Mutex::new(replies.into_iter().collect()),
            ..Default::default()
        }
    }

    pub(crate) fn with_metadata(self, metadata: ItemMetadata) -> Self {
        *self.metadata.lock().unwrap() = metadata;
        self
    }

    pub(crate) fn query_count(&self) -> usize {
        self.queries.lock().unwrap().len()
    }
}

#[async_trait]
impl ArchiveClient for ScriptedClient {
    async fn task_summary(&self, identifier: &ItemId) -> Result<TaskSummary> {
        self.queries.lock().unwrap().push(identifier.clone());
        let mut replies = self.replies.lock().unwrap();
        let reply = if replies.len() > 1 {
            replies.pop_front()
        } else {
            replies.front().cloned()
        };
        reply.unwrap_or_else(Reply::settled).into_result()
    }

    async fn submit_task(
        &self,
        identifier: &ItemId,
        command: TaskCommand,
        comment: &str,
    ) -> Result<()> {
        self.tasks
            .lock()
            .unwrap()
            .push((identifier.clone(), command, comment.to_string()));
        Ok(())
    }

    async fn put_item(&self, request: &PutRequest) -> Result<()> {
        if let Some(status) = *self.fail_put.lock().unwrap() {
            return Err(Error::Api {
                status,
                message: "upload rejected".to_string(),
            });
        }
        self.puts.lock().unwrap().push(request.clone());
        Ok(())
    }

    async fn read_metadata(&self, _identifier: &ItemId) -> Result<ItemMetadata> {
        self.metadata_reads.fetch_add(1, Ordering::SeqCst);
        Ok(self.metadata.lock().unwrap().clone())
    }
}

/// Zero-length delay that counts how often it was asked for
#[derive(Debug, Default)]
pub(crate) struct CountingDelay {
    pub(crate) calls: AtomicU32,
}

impl CountingDelay {
    pub(crate) fn count(&self) -> u32 {
        self.calls.load(Ordering::SeqCst)
    }
}

impl DelayStrategy for CountingDelay {
    fn delay(&self, _attempt: u32) -> Duration {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Duration::ZERO
    }
}
