//! Core types for archive-fixture

use rand::Rng;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

use crate::error::{Error, Result};

/// Prefix used for generated item identifiers so temporary items are easy to spot
pub const GENERATED_ID_PREFIX: &str = "etc-tmp-";

/// Identifier of a remote item (a bucket of files plus metadata)
#[derive(Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct ItemId(String);

impl ItemId {
    /// Create an identifier, rejecting empty or whitespace-only input
    pub fn new(id: impl Into<String>) -> Result<Self> {
        let id = id.into();
        if id.trim().is_empty() {
            return Err(Error::InvalidIdentifier(id));
        }
        Ok(Self(id))
    }

    /// Generate a fresh identifier: the temporary prefix followed by a random 128-bit hex token
    pub fn generate() -> Self {
        let token: u128 = rand::thread_rng().r#gen();
        Self(format!("{GENERATED_ID_PREFIX}{token:032x}"))
    }

    /// Borrow the identifier as a string slice
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl TryFrom<String> for ItemId {
    type Error = Error;

    fn try_from(value: String) -> Result<Self> {
        Self::new(value)
    }
}

impl From<ItemId> for String {
    fn from(id: ItemId) -> Self {
        id.0
    }
}

impl AsRef<str> for ItemId {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for ItemId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

impl std::str::FromStr for ItemId {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        Self::new(s)
    }
}

/// Snapshot of outstanding administrative work for one item
///
/// Fetched fresh on every poll, never cached.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TaskSummary {
    /// Tasks waiting in the queue
    #[serde(default)]
    pub queued: u32,
    /// Tasks currently executing
    #[serde(default)]
    pub running: u32,
    /// Tasks that failed and need operator attention
    #[serde(default)]
    pub error: u32,
    /// Tasks paused by the service (reported for logging only)
    #[serde(default)]
    pub paused: u32,
}

impl TaskSummary {
    /// Build a summary from the three counters that drive settlement
    pub fn new(queued: u32, running: u32, error: u32) -> Self {
        Self {
            queued,
            running,
            error,
            paused: 0,
        }
    }

    /// No queued and no running work remains
    pub fn is_settled(&self) -> bool {
        self.queued == 0 && self.running == 0
    }

    /// The queue reports at least one failed task
    pub fn has_errors(&self) -> bool {
        self.error > 0
    }
}

impl std::fmt::Display for TaskSummary {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "queued={} running={} error={}",
            self.queued, self.running, self.error
        )
    }
}

/// One key/value pair of item metadata
///
/// Keys may repeat within a list (e.g. several `collection` entries).
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct MetadataEntry {
    /// Metadata field name
    pub key: String,
    /// Metadata field value
    pub value: String,
}

impl MetadataEntry {
    /// Create a metadata entry
    pub fn new(key: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            key: key.into(),
            value: value.into(),
        }
    }
}

impl<K: Into<String>, V: Into<String>> From<(K, V)> for MetadataEntry {
    fn from((key, value): (K, V)) -> Self {
        Self::new(key, value)
    }
}

/// Single upload that creates (if needed) and fills a bucket
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct PutRequest {
    /// Target bucket (item identifier)
    pub bucket: ItemId,
    /// Local file to upload
    pub local_path: PathBuf,
    /// Name of the file inside the bucket
    pub remote_filename: String,
    /// Metadata attached to the item, in order
    pub metadata: Vec<MetadataEntry>,
    /// Create the bucket when it does not exist
    pub create_bucket: bool,
    /// Skip derivative generation for the upload
    pub no_derive: bool,
}

/// A file listed in an item's metadata
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ItemFile {
    /// File name inside the item
    pub name: String,
    /// Format tag assigned by the archive (e.g. "Text")
    #[serde(default)]
    pub format: Option<String>,
}

/// Current metadata of a remote item
///
/// An item that does not exist reads back as an empty document, so every
/// field is optional.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct ItemMetadata {
    /// Item visibility is administratively suppressed
    #[serde(default)]
    pub is_dark: Option<bool>,
    /// Files stored in the item
    #[serde(default)]
    pub files: Vec<ItemFile>,
    /// Raw metadata fields
    #[serde(default)]
    pub metadata: serde_json::Map<String, serde_json::Value>,
}

impl ItemMetadata {
    /// Whether the item is marked dark
    pub fn is_dark(&self) -> bool {
        self.is_dark == Some(true)
    }

    /// Whether a file with the given name and format tag is present
    pub fn has_file(&self, name: &str, format: &str) -> bool {
        self.files
            .iter()
            .any(|f| f.name == name && f.format.as_deref() == Some(format))
    }
}

/// Administrative task kinds that can be submitted against an item
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TaskCommand {
    /// Hide the item from public access
    MakeDark,
    /// Restore public access to a dark item
    MakeUndark,
}

impl TaskCommand {
    /// Command name understood by the tasks endpoint
    pub fn as_cmd(&self) -> &'static str {
        match self {
            TaskCommand::MakeDark => "make_dark.php",
            TaskCommand::MakeUndark => "make_undark.php",
        }
    }
}

impl std::fmt::Display for TaskCommand {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_cmd())
    }
}
