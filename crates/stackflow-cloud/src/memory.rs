//! In-memory backend
//!
//! An explicit store owned by whoever runs the executor. Ids are assigned
//! sequentially (`"1"`, `"2"`, ...). Every `modify_resource` call is recorded
//! so tests can inspect how mutable references were attached.

use crate::backend::{Backend, CreateResponse, RemoteRecord};
use crate::diff::Change;
use crate::error::{CloudError, Result};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use stackflow_core::{RenderMode, ResourceView, Tag, schema};
use std::sync::{Mutex, MutexGuard, PoisonError};

/// One recorded `modify_resource` call
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Modification {
    pub id: String,
    pub resource: String,
    pub path: Vec<String>,
    pub value: serde_json::Value,
}

#[derive(Debug, Default)]
struct Store {
    records: Vec<RemoteRecord>,
    next_id: u64,
    modifications: Vec<Modification>,
}

impl Store {
    fn record_mut(&mut self, id: &str) -> Result<&mut RemoteRecord> {
        self.records
            .iter_mut()
            .find(|r| r.id == id)
            .ok_or_else(|| CloudError::ResourceNotFound(id.to_string()))
    }
}

#[derive(Debug, Default)]
pub struct InMemoryBackend {
    store: Mutex<Store>,
}

impl InMemoryBackend {
    pub fn new() -> Self {
        Self::default()
    }

    fn store(&self) -> MutexGuard<'_, Store> {
        self.store.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Add a pre-existing record; numeric ids advance the id sequence
    pub fn seed(&self, record: RemoteRecord) {
        let mut store = self.store();
        if let Ok(n) = record.id.parse::<u64>() {
            store.next_id = store.next_id.max(n);
        }
        store.records.push(record);
    }

    pub fn records(&self) -> Vec<RemoteRecord> {
        self.store().records.clone()
    }

    pub fn record(&self, id: &str) -> Option<RemoteRecord> {
        self.store().records.iter().find(|r| r.id == id).cloned()
    }

    pub fn modifications(&self) -> Vec<Modification> {
        self.store().modifications.clone()
    }
}

#[async_trait]
impl Backend for InMemoryBackend {
    fn name(&self) -> &str {
        "in-memory"
    }

    async fn find_by_id(&self, id: &str) -> Result<Option<RemoteRecord>> {
        Ok(self.record(id))
    }

    async fn find_by_name(&self, name: &str) -> Result<Vec<RemoteRecord>> {
        Ok(self
            .store()
            .records
            .iter()
            .filter(|r| r.name == name)
            .cloned()
            .collect())
    }

    async fn find_by_tags(&self, tags: &[Tag]) -> Result<Vec<RemoteRecord>> {
        if tags.is_empty() {
            return Ok(Vec::new());
        }
        Ok(self
            .store()
            .records
            .iter()
            .filter(|r| r.has_tags(tags))
            .cloned()
            .collect())
    }

    async fn create_resource(&self, resource: ResourceView<'_>) -> Result<CreateResponse> {
        let pending = resource.unresolved_immutable_references();
        if !pending.is_empty() {
            return Err(CloudError::IncompleteResource(format!(
                "{} has unresolved references: {}",
                resource.name(),
                pending.join(", ")
            )));
        }

        let mut store = self.store();
        if store.records.iter().any(|r| r.name == resource.name()) {
            return Err(CloudError::ResourceAlreadyExists(resource.name().to_string()));
        }

        store.next_id += 1;
        let id = store.next_id.to_string();
        let mut attributes = resource.render(RenderMode::Create);
        attributes.insert(schema::ID.to_string(), serde_json::Value::String(id.clone()));
        store.records.push(RemoteRecord {
            id: id.clone(),
            kind: resource.kind().to_string(),
            name: resource.name().to_string(),
            tags: resource.tags(),
            attributes,
        });

        tracing::debug!("Stored {} {} as {}", resource.kind(), resource.name(), id);
        Ok(CreateResponse { id })
    }

    async fn modify_resource(
        &self,
        resource: ResourceView<'_>,
        path: &[String],
        value: &serde_json::Value,
    ) -> Result<serde_json::Value> {
        let Some((keyword, parents)) = path.split_last() else {
            return Err(CloudError::InvalidModification(format!(
                "empty path for {}",
                resource.name()
            )));
        };
        let id = resource
            .identity()
            .ok_or_else(|| CloudError::ResourceNotFound(resource.name().to_string()))?;
        let rendered = resource.render_at(path).unwrap_or_else(|| value.clone());

        let mut store = self.store();
        let record = store.record_mut(id)?;
        let mut target = &mut record.attributes;
        for segment in parents {
            let entry = target
                .entry(segment.clone())
                .or_insert_with(|| serde_json::Value::Object(serde_json::Map::new()));
            target = entry.as_object_mut().ok_or_else(|| {
                CloudError::InvalidModification(format!(
                    "{}: {} is not a collection",
                    resource.name(),
                    segment
                ))
            })?;
        }
        target.insert(keyword.clone(), rendered.clone());

        store.modifications.push(Modification {
            id: id.to_string(),
            resource: resource.name().to_string(),
            path: path.to_vec(),
            value: value.clone(),
        });
        Ok(rendered)
    }

    async fn update_resource(&self, id: &str, changes: &[Change]) -> Result<()> {
        let mut store = self.store();
        let record = store.record_mut(id)?;
        let tags = changes
            .iter()
            .filter(|change| change.attribute == schema::TAGS)
            .map(|change| {
                serde_json::from_value::<Vec<Tag>>(change.desired.clone()).map_err(|e| {
                    CloudError::InvalidModification(format!("{}: tags: {}", record.name, e))
                })
            })
            .last()
            .transpose()?;
        if let Some(tags) = tags {
            record.tags = tags;
        }
        for change in changes {
            record
                .attributes
                .insert(change.attribute.clone(), change.desired.clone());
        }
        Ok(())
    }

    async fn destroy_resource(&self, id: &str) -> Result<()> {
        self.store().records.retain(|r| r.id != id);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use stackflow_core::catalog::{network, security_group};
    use stackflow_core::{DefinitionTree, ResourceNode};

    fn tree() -> DefinitionTree {
        let mut tree = DefinitionTree::new("t");
        let mut net = ResourceNode::new(network::schema(), "main").unwrap();
        net.set("tags", vec![Tag::new("env", "test")]).unwrap();
        net.set("cidr_block", "10.0.0.0/16").unwrap();
        tree.add(net).unwrap();

        let mut group = ResourceNode::new(security_group::schema(), "web").unwrap();
        group.set("network", tree.reference(&["main", "id"])).unwrap();
        group.set("description", "web").unwrap();
        tree.add(group).unwrap();
        tree
    }

    #[tokio::test]
    async fn test_sequential_ids_and_duplicates() {
        let backend = InMemoryBackend::new();
        let tree = tree();

        let response = backend.create_resource(tree.view("main").unwrap()).await.unwrap();
        assert_eq!(response.id, "1");
        let record = backend.record("1").unwrap();
        assert_eq!(record.attributes["cidr_block"], json!("10.0.0.0/16"));
        assert_eq!(record.attributes["id"], json!("1"));

        let err = backend
            .create_resource(tree.view("main").unwrap())
            .await
            .unwrap_err();
        assert!(matches!(err, CloudError::ResourceAlreadyExists(name) if name == "main"));
    }

    #[tokio::test]
    async fn test_rejects_unresolved_immutable_reference() {
        let backend = InMemoryBackend::new();
        let tree = tree();
        let err = backend
            .create_resource(tree.view("web").unwrap())
            .await
            .unwrap_err();
        assert!(matches!(err, CloudError::IncompleteResource(_)));
        assert!(backend.records().is_empty());
    }

    #[tokio::test]
    async fn test_find_by_tags_and_name() {
        let backend = InMemoryBackend::new();
        backend.seed(
            RemoteRecord::new("7", "network", "main")
                .with_tag(Tag::new("env", "test"))
                .with_tag(Tag::new("team", "core")),
        );

        let found = backend.find_by_tags(&[Tag::new("env", "test")]).await.unwrap();
        assert_eq!(found.len(), 1);
        let found = backend
            .find_by_tags(&[Tag::new("env", "test"), Tag::new("team", "edge")])
            .await
            .unwrap();
        assert!(found.is_empty());
        assert!(backend.find_by_tags(&[]).await.unwrap().is_empty());
        assert_eq!(backend.find_by_name("main").await.unwrap().len(), 1);

        // Seeding advances the id sequence
        let tree = tree();
        let err = backend.create_resource(tree.view("main").unwrap()).await;
        assert!(err.is_err());
        let mut other = DefinitionTree::new("o");
        let mut net = ResourceNode::new(network::schema(), "other").unwrap();
        net.set("cidr_block", "10.1.0.0/16").unwrap();
        other.add(net).unwrap();
        let response = backend.create_resource(other.view("other").unwrap()).await.unwrap();
        assert_eq!(response.id, "8");
    }

    #[tokio::test]
    async fn test_modify_and_destroy() {
        let backend = InMemoryBackend::new();
        let mut tree = tree();
        backend.create_resource(tree.view("main").unwrap()).await.unwrap();
        tree.assign_identity("main", "1").unwrap();

        let path = vec!["tags".to_string()];
        let value = backend
            .modify_resource(tree.view("main").unwrap(), &path, &json!("ignored"))
            .await
            .unwrap();
        // Re-rendered from the tree rather than taken from the caller
        assert_eq!(value, json!([{ "key": "env", "value": "test" }]));
        assert_eq!(backend.modifications().len(), 1);

        let err = backend
            .modify_resource(tree.view("main").unwrap(), &[], &json!(null))
            .await
            .unwrap_err();
        assert!(matches!(err, CloudError::InvalidModification(_)));

        let tags = |desired| Change {
            attribute: "tags".to_string(),
            current: json!(null),
            desired,
            replacement: false,
        };
        backend
            .update_resource("1", &[tags(json!([{ "key": "env", "value": "prod" }]))])
            .await
            .unwrap();
        assert_eq!(backend.record("1").unwrap().tags, vec![Tag::new("env", "prod")]);
        // Malformed tags are rejected and leave the record untouched
        let err = backend
            .update_resource("1", &[tags(json!("env=prod"))])
            .await
            .unwrap_err();
        assert!(matches!(err, CloudError::InvalidModification(_)));
        let record = backend.record("1").unwrap();
        assert_eq!(record.tags, vec![Tag::new("env", "prod")]);
        assert_eq!(
            record.attributes["tags"],
            json!([{ "key": "env", "value": "prod" }])
        );

        backend.destroy_resource("1").await.unwrap();
        backend.destroy_resource("1").await.unwrap();
        assert!(backend.records().is_empty());
    }
}
