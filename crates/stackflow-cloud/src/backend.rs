//! Backend trait definition

use crate::diff::Change;
use crate::error::Result;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use stackflow_core::{ResourceView, Tag};

/// Remote store the executor provisions against
///
/// A real cloud API client or the [`InMemoryBackend`](crate::InMemoryBackend)
/// implements this trait. The executor never issues concurrent calls.
#[async_trait]
pub trait Backend: Send + Sync {
    /// Returns the backend name (e.g., "in-memory")
    fn name(&self) -> &str;

    /// Look up a record by remote identity
    async fn find_by_id(&self, id: &str) -> Result<Option<RemoteRecord>>;

    /// Records with the given name
    async fn find_by_name(&self, name: &str) -> Result<Vec<RemoteRecord>>;

    /// Records carrying every tag in `tags`
    async fn find_by_tags(&self, tags: &[Tag]) -> Result<Vec<RemoteRecord>>;

    /// Create the resource; names must be unique among existing records
    async fn create_resource(&self, resource: ResourceView<'_>) -> Result<CreateResponse>;

    /// Apply `value` at `path` (collection, child, ..., keyword) below `resource`
    async fn modify_resource(
        &self,
        resource: ResourceView<'_>,
        path: &[String],
        value: &serde_json::Value,
    ) -> Result<serde_json::Value>;

    /// Apply the changes of a Modify diff to an existing record
    async fn update_resource(&self, id: &str, changes: &[Change]) -> Result<()>;

    /// Remove a record. Removing a missing record succeeds.
    async fn destroy_resource(&self, id: &str) -> Result<()>;
}

/// Current state of a remote resource
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RemoteRecord {
    /// Remote identity
    pub id: String,

    /// Resource type
    pub kind: String,

    pub name: String,

    #[serde(default)]
    pub tags: Vec<Tag>,

    /// Rendered attributes and collections
    #[serde(default)]
    pub attributes: serde_json::Map<String, serde_json::Value>,
}

impl RemoteRecord {
    pub fn new(id: impl Into<String>, kind: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            kind: kind.into(),
            name: name.into(),
            tags: Vec::new(),
            attributes: serde_json::Map::new(),
        }
    }

    pub fn with_tag(mut self, tag: Tag) -> Self {
        self.tags.push(tag);
        self
    }

    pub fn with_attribute(mut self, key: impl Into<String>, value: serde_json::Value) -> Self {
        self.attributes.insert(key.into(), value);
        self
    }

    /// Whether the record carries every tag in `tags`
    pub fn has_tags(&self, tags: &[Tag]) -> bool {
        tags.iter().all(|tag| self.tags.contains(tag))
    }
}

/// Response of a successful create
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CreateResponse {
    pub id: String,
}
