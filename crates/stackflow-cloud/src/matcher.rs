//! Matching desired resources to existing remote records

use crate::backend::{Backend, RemoteRecord};
use crate::error::{CloudError, Result};
use async_trait::async_trait;
use stackflow_core::ResourceView;

#[async_trait]
pub trait Matcher: Send + Sync {
    /// Remote records that already represent `resource`
    async fn find_matches(
        &self,
        backend: &dyn Backend,
        resource: ResourceView<'_>,
    ) -> Result<Vec<RemoteRecord>>;
}

/// Looks up by identity, then tags, then name; the first non-empty result wins
#[derive(Debug, Default, Clone, Copy)]
pub struct BasicMatcher;

#[async_trait]
impl Matcher for BasicMatcher {
    async fn find_matches(
        &self,
        backend: &dyn Backend,
        resource: ResourceView<'_>,
    ) -> Result<Vec<RemoteRecord>> {
        let name = resource.name();
        let failure = |operation: &str| {
            let operation = operation.to_string();
            move |e: CloudError| CloudError::backend(operation, name, e)
        };

        if let Some(id) = resource.identity() {
            let found = backend.find_by_id(id).await.map_err(failure("find_by_id"))?;
            if let Some(record) = found {
                tracing::debug!("Matched {} by id {}", name, id);
                return Ok(vec![record]);
            }
        }

        let tags = resource.tags();
        if !tags.is_empty() {
            let found = backend
                .find_by_tags(&tags)
                .await
                .map_err(failure("find_by_tags"))?;
            if !found.is_empty() {
                tracing::debug!("Matched {} by tags: {} record(s)", name, found.len());
                return Ok(found);
            }
        }

        let found = backend
            .find_by_name(name)
            .await
            .map_err(failure("find_by_name"))?;
        if !found.is_empty() {
            tracing::debug!("Matched {} by name: {} record(s)", name, found.len());
        }
        Ok(found)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::memory::InMemoryBackend;
    use stackflow_core::catalog::network;
    use stackflow_core::{DefinitionTree, ResourceNode, Tag};

    fn tree(id: Option<&str>, tags: bool) -> DefinitionTree {
        let mut tree = DefinitionTree::new("t");
        let mut net = ResourceNode::new(network::schema(), "main").unwrap();
        if tags {
            net.set("tags", vec![Tag::new("env", "prod")]).unwrap();
        }
        if let Some(id) = id {
            net.set("id", id).unwrap();
        }
        tree.add(net).unwrap();
        tree
    }

    fn backend() -> InMemoryBackend {
        let backend = InMemoryBackend::new();
        backend.seed(RemoteRecord::new("1", "network", "other").with_tag(Tag::new("env", "prod")));
        backend.seed(RemoteRecord::new("2", "network", "main"));
        backend.seed(RemoteRecord::new("3", "network", "third"));
        backend
    }

    async fn ids(tree: &DefinitionTree, backend: &InMemoryBackend) -> Vec<String> {
        BasicMatcher
            .find_matches(backend, tree.view("main").unwrap())
            .await
            .unwrap()
            .into_iter()
            .map(|r| r.id)
            .collect()
    }

    #[tokio::test]
    async fn test_identity_first() {
        let backend = backend();
        assert_eq!(ids(&tree(Some("3"), true), &backend).await, vec!["3"]);
    }

    #[tokio::test]
    async fn test_tags_before_name() {
        let backend = backend();
        assert_eq!(ids(&tree(None, true), &backend).await, vec!["1"]);
        // Unknown id falls through to tags
        assert_eq!(ids(&tree(Some("99"), true), &backend).await, vec!["1"]);
    }

    #[tokio::test]
    async fn test_name_last() {
        let backend = backend();
        assert_eq!(ids(&tree(None, false), &backend).await, vec!["2"]);
    }

    #[tokio::test]
    async fn test_no_match() {
        let backend = InMemoryBackend::new();
        assert!(ids(&tree(None, true), &backend).await.is_empty());
    }
}
