//! HTTP implementation of [`ArchiveClient`] on top of `reqwest`

use super::ArchiveClient;
use crate::config::{Config, EndpointsConfig};
use crate::error::{Error, Result};
use crate::types::{ItemId, ItemMetadata, MetadataEntry, PutRequest, TaskCommand, TaskSummary};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use url::Url;

/// Envelope shared by every tasks endpoint response
#[derive(Debug, Deserialize)]
struct TasksEnvelope<T> {
    #[serde(default)]
    success: bool,
    #[serde(default)]
    error: Option<String>,
    value: Option<T>,
}

#[derive(Debug, Deserialize)]
struct SummaryValue {
    #[serde(default)]
    summary: Option<TaskSummary>,
}

#[derive(Debug, Serialize)]
struct SubmitTask<'a> {
    identifier: &'a str,
    cmd: &'static str,
    args: SubmitArgs<'a>,
    #[serde(skip_serializing_if = "Option::is_none")]
    priority: Option<i32>,
}

#[derive(Debug, Serialize)]
struct SubmitArgs<'a> {
    comment: &'a str,
}

/// Archive client speaking the service's public HTTP APIs
///
/// Cloning is cheap: the underlying connection pool is shared.
#[derive(Clone)]
pub struct HttpArchiveClient {
    http: reqwest::Client,
    endpoints: EndpointsConfig,
    authorization: String,
    interactive_priority: bool,
}

impl std::fmt::Debug for HttpArchiveClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HttpArchiveClient")
            .field("endpoints", &self.endpoints)
            .field("interactive_priority", &self.interactive_priority)
            .finish_non_exhaustive()
    }
}

impl HttpArchiveClient {
    /// Build a client from resolved configuration
    ///
    /// Endpoint URLs are validated up front so a typo fails here rather than
    /// on the first poll.
    pub fn new(config: &Config) -> Result<Self> {
        for url in [
            &config.endpoints.metadata,
            &config.endpoints.tasks,
            &config.endpoints.s3,
        ] {
            Url::parse(url)?;
        }

        let http = reqwest::Client::builder()
            .timeout(config.request_timeout)
            .user_agent(concat!("archive-fixture/", env!("CARGO_PKG_VERSION")))
            .build()?;

        Ok(Self {
            http,
            endpoints: config.endpoints.clone(),
            authorization: format!("LOW {}:{}", config.access_key, config.secret_key),
            interactive_priority: config.interactive_priority,
        })
    }

    /// Ask the service to run tasks and uploads from this client at interactive priority
    pub fn request_interactive_priority(&mut self) {
        self.interactive_priority = true;
    }

    fn upload_url(&self, request: &PutRequest) -> Result<Url> {
        let url = format!(
            "{}/{}/{}",
            self.endpoints.s3.trim_end_matches('/'),
            urlencoding::encode(request.bucket.as_str()),
            urlencoding::encode(&request.remote_filename)
        );
        Ok(Url::parse(&url)?)
    }

    fn metadata_url(&self, identifier: &ItemId) -> Result<Url> {
        let url = format!(
            "{}/{}",
            self.endpoints.metadata.trim_end_matches('/'),
            urlencoding::encode(identifier.as_str())
        );
        Ok(Url::parse(&url)?)
    }
}

#[async_trait]
impl ArchiveClient for HttpArchiveClient {
    async fn task_summary(&self, identifier: &ItemId) -> Result<TaskSummary> {
        let response = self
            .http
            .get(&self.endpoints.tasks)
            .header("Authorization", &self.authorization)
            .query(&[
                ("identifier", identifier.as_str()),
                ("summary", "1"),
                ("history", "0"),
                ("catalog", "0"),
            ])
            .send()
            .await?;

        let envelope: TasksEnvelope<SummaryValue> = read_envelope(response).await?;
        envelope
            .value
            .and_then(|v| v.summary)
            .ok_or_else(|| Error::Api {
                status: 200,
                message: "response did not include a task summary".to_string(),
            })
    }

    async fn submit_task(
        &self,
        identifier: &ItemId,
        command: TaskCommand,
        comment: &str,
    ) -> Result<()> {
        let body = SubmitTask {
            identifier: identifier.as_str(),
            cmd: command.as_cmd(),
            args: SubmitArgs { comment },
            priority: self.interactive_priority.then_some(1),
        };

        tracing::debug!(identifier = %identifier, command = %command, "submitting task");

        let response = self
            .http
            .post(&self.endpoints.tasks)
            .header("Authorization", &self.authorization)
            .json(&body)
            .send()
            .await?;

        let _: TasksEnvelope<serde_json::Value> = read_envelope(response).await?;
        Ok(())
    }

    async fn put_item(&self, request: &PutRequest) -> Result<()> {
        let url = self.upload_url(request)?;
        let body = tokio::fs::read(&request.local_path).await?;

        tracing::debug!(
            bucket = %request.bucket,
            file = %request.remote_filename,
            bytes = body.len(),
            "uploading file"
        );

        let mut builder = self
            .http
            .put(url)
            .header("Authorization", &self.authorization)
            .body(body);

        if request.create_bucket {
            builder = builder.header("x-amz-auto-make-bucket", "1");
        }
        if request.no_derive {
            builder = builder.header("x-archive-queue-derive", "0");
        }
        if self.interactive_priority {
            builder = builder.header("x-archive-interactive-priority", "1");
        }
        for (name, value) in metadata_headers(&request.metadata) {
            builder = builder.header(name, value);
        }

        let response = builder.send().await?;
        if !response.status().is_success() {
            return Err(api_error(response).await);
        }
        Ok(())
    }

    async fn read_metadata(&self, identifier: &ItemId) -> Result<ItemMetadata> {
        let response = self
            .http
            .get(self.metadata_url(identifier)?)
            .header("Authorization", &self.authorization)
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(api_error(response).await);
        }
        let text = response.text().await?;
        Ok(serde_json::from_str(&text)?)
    }
}

/// Encode metadata entries as upload headers
///
/// Repeated keys are numbered per key (`x-archive-meta01-collection`,
/// `x-archive-meta02-collection`). Underscores in keys are written as `--`,
/// and values that are not plain printable ASCII are wrapped as `uri(...)`.
pub(crate) fn metadata_headers(entries: &[MetadataEntry]) -> Vec<(String, String)> {
    let mut seen: HashMap<&str, u32> = HashMap::new();
    entries
        .iter()
        .map(|entry| {
            let index = seen.entry(entry.key.as_str()).or_insert(0);
            *index += 1;
            let name = format!(
                "x-archive-meta{:02}-{}",
                index,
                entry.key.to_ascii_lowercase().replace('_', "--")
            );
            let value = if entry
                .value
                .chars()
                .all(|c| c.is_ascii() && !c.is_ascii_control())
            {
                entry.value.clone()
            } else {
                format!("uri({})", urlencoding::encode(&entry.value))
            };
            (name, value)
        })
        .collect()
}

async fn read_envelope<T>(response: reqwest::Response) -> Result<TasksEnvelope<T>>
where
    T: serde::de::DeserializeOwned,
{
    let status = response.status();
    if !status.is_success() {
        return Err(api_error(response).await);
    }

    let text = response.text().await?;
    let envelope: TasksEnvelope<T> = serde_json::from_str(&text)?;
    if !envelope.success {
        return Err(Error::Api {
            status: status.as_u16(),
            message: envelope
                .error
                .clone()
                .unwrap_or_else(|| "request was not successful".to_string()),
        });
    }
    Ok(envelope)
}

async fn api_error(response: reqwest::Response) -> Error {
    let status = response.status().as_u16();
    let body = response.text().await.unwrap_or_default();
    let message = serde_json::from_str::<serde_json::Value>(&body)
        .ok()
        .and_then(|v| v.get("error").and_then(|e| e.as_str()).map(str::to_string))
        .unwrap_or(body);
    Error::Api { status, message }
}
