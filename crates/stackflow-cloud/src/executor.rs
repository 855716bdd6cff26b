//! Work-queue executor
//!
//! Each top-level resource owns a queue of [`WorkItem`]s, seeded with
//! `[ReconcileWithCurrent, Diff]`. A pass visits the resources in sorted
//! order and dispatches at most one item per resource, sweeping the tree for
//! newly resolvable references before and after every dispatch. Passes repeat
//! until every queue is empty.

use crate::backend::{Backend, RemoteRecord};
use crate::diff::{Diff, DiffKind, DiffSummary, Differ, StructuralDiffer};
use crate::error::{CloudError, Result};
use crate::matcher::{BasicMatcher, Matcher};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use stackflow_config::EngineConfig;
use stackflow_core::{
    DefinitionError, DefinitionTree, OwnedReference, ResourceView, Sorter, TopologicalSorter,
    Validator, default_validators,
};
use std::collections::{HashMap, VecDeque};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ExecutorOptions {
    /// Passes allowed before the run is declared unconverged
    pub max_passes: usize,
}

impl Default for ExecutorOptions {
    fn default() -> Self {
        Self { max_passes: 256 }
    }
}

impl From<&EngineConfig> for ExecutorOptions {
    fn from(config: &EngineConfig) -> Self {
        Self {
            max_passes: config.executor.max_passes,
        }
    }
}

/// One unit of queued work for a resource
#[derive(Debug, Clone, PartialEq)]
pub enum WorkItem {
    ReconcileWithCurrent,
    Diff,
    ApplyDiff(Vec<Diff>),
    ResolveReferences(Vec<OwnedReference>),
    ResolvedReferences(Vec<OwnedReference>),
}

impl std::fmt::Display for WorkItem {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            WorkItem::ReconcileWithCurrent => write!(f, "reconcile"),
            WorkItem::Diff => write!(f, "diff"),
            WorkItem::ApplyDiff(diffs) => write!(f, "apply {} diff(s)", diffs.len()),
            WorkItem::ResolveReferences(refs) => write!(f, "resolve {} reference(s)", refs.len()),
            WorkItem::ResolvedReferences(refs) => {
                write!(f, "attach {} reference(s)", refs.len())
            }
        }
    }
}

/// A resource created during a run
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CreatedResource {
    pub name: String,
    pub kind: String,
    pub id: String,
    pub created_at: DateTime<Utc>,
}

/// A reference value attached to an existing resource after creation
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Attachment {
    pub resource: String,
    pub path: Vec<String>,
    pub value: serde_json::Value,
}

/// Outcome of a converged run
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunReport {
    /// Provisioning order
    pub order: Vec<String>,
    pub passes: usize,
    pub diffs: Vec<Diff>,
    pub summary: DiffSummary,
    pub created: Vec<CreatedResource>,
    pub attachments: Vec<Attachment>,
}

/// Drives a definition tree to convergence against a backend
pub struct Executor<'a> {
    definition: &'a mut DefinitionTree,
    backend: &'a dyn Backend,
    validators: Vec<Box<dyn Validator + Send + Sync>>,
    sorter: Box<dyn Sorter + Send + Sync>,
    matcher: Box<dyn Matcher>,
    differ: Box<dyn Differ>,
    options: ExecutorOptions,
    queues: HashMap<String, VecDeque<WorkItem>>,
    matches: HashMap<String, Vec<RemoteRecord>>,
    created: Vec<CreatedResource>,
    attachments: Vec<Attachment>,
    diffs: Vec<Diff>,
}

impl<'a> Executor<'a> {
    pub fn new(definition: &'a mut DefinitionTree, backend: &'a dyn Backend) -> Self {
        Self {
            definition,
            backend,
            validators: default_validators(),
            sorter: Box::new(TopologicalSorter::new()),
            matcher: Box::new(BasicMatcher),
            differ: Box::new(StructuralDiffer),
            options: ExecutorOptions::default(),
            queues: HashMap::new(),
            matches: HashMap::new(),
            created: Vec::new(),
            attachments: Vec::new(),
            diffs: Vec::new(),
        }
    }

    pub fn with_options(mut self, options: ExecutorOptions) -> Self {
        self.options = options;
        self
    }

    pub fn with_matcher(mut self, matcher: impl Matcher + 'static) -> Self {
        self.matcher = Box::new(matcher);
        self
    }

    pub fn with_differ(mut self, differ: impl Differ + 'static) -> Self {
        self.differ = Box::new(differ);
        self
    }

    pub fn with_sorter(mut self, sorter: impl Sorter + Send + Sync + 'static) -> Self {
        self.sorter = Box::new(sorter);
        self
    }

    pub fn with_validators(mut self, validators: Vec<Box<dyn Validator + Send + Sync>>) -> Self {
        self.validators = validators;
        self
    }

    /// Resources created so far; still populated after a failed run
    pub fn created(&self) -> &[CreatedResource] {
        &self.created
    }

    pub fn attachments(&self) -> &[Attachment] {
        &self.attachments
    }

    /// Validate, sort, match and then process work queues until they drain
    pub async fn run(&mut self) -> Result<RunReport> {
        self.definition.fill_defaults()?;
        for validator in &self.validators {
            validator.validate(self.definition)?;
        }
        let order = self.sorter.sort(self.definition)?;
        tracing::info!(
            "Provisioning {} resource(s) on {}: {}",
            order.len(),
            self.backend.name(),
            order.join(" -> ")
        );

        for name in &order {
            let view = self.view(name)?;
            let found = self.matcher.find_matches(self.backend, view).await?;
            self.matches.insert(name.clone(), found);
            self.queues.insert(
                name.clone(),
                VecDeque::from([WorkItem::ReconcileWithCurrent, WorkItem::Diff]),
            );
        }

        let mut passes = 0;
        while self.has_work() {
            if passes >= self.options.max_passes {
                return Err(CloudError::Unconverged {
                    passes,
                    pending: self.pending(&order),
                });
            }
            passes += 1;
            tracing::debug!("Pass {}", passes);

            for name in &order {
                self.definition.resolve_pending()?;
                let item = self.queues.get_mut(name).and_then(VecDeque::pop_front);
                if let Some(item) = item {
                    tracing::debug!("{}: {}", name, item);
                    self.dispatch(name, item).await?;
                }
                self.definition.resolve_pending()?;
            }
        }

        let summary = DiffSummary::of(&self.diffs);
        tracing::info!("Converged after {} pass(es): {}", passes, summary);
        Ok(RunReport {
            order,
            passes,
            diffs: self.diffs.clone(),
            summary,
            created: self.created.clone(),
            attachments: self.attachments.clone(),
        })
    }

    fn has_work(&self) -> bool {
        self.queues.values().any(|queue| !queue.is_empty())
    }

    fn pending(&self, order: &[String]) -> Vec<String> {
        order
            .iter()
            .filter(|name| self.queues.get(*name).is_some_and(|q| !q.is_empty()))
            .cloned()
            .collect()
    }

    fn enqueue(&mut self, name: &str, item: WorkItem) {
        self.queues.entry(name.to_string()).or_default().push_back(item);
    }

    fn view(&self, name: &str) -> Result<ResourceView<'_>> {
        self.definition
            .view(name)
            .ok_or_else(|| DefinitionError::UnknownResource(name.to_string()).into())
    }

    async fn dispatch(&mut self, name: &str, item: WorkItem) -> Result<()> {
        match item {
            WorkItem::ReconcileWithCurrent => self.reconcile(name),
            WorkItem::Diff => self.diff(name),
            WorkItem::ApplyDiff(diffs) => self.apply(name, diffs).await,
            WorkItem::ResolveReferences(refs) => self.resolve(name, refs),
            WorkItem::ResolvedReferences(refs) => self.attach(name, refs).await,
        }
    }

    fn reconcile(&mut self, name: &str) -> Result<()> {
        let found = self.matches.get(name).map(Vec::as_slice).unwrap_or_default();
        match found {
            [] => Ok(()),
            [record] => {
                let id = record.id.clone();
                tracing::debug!("{} already exists as {}", name, id);
                self.definition.assign_identity(name, &id)?;
                Ok(())
            }
            _ => Err(CloudError::AmbiguousReconciliation {
                resource: name.to_string(),
                matches: found.len(),
            }),
        }
    }

    fn diff(&mut self, name: &str) -> Result<()> {
        let found = self.matches.get(name).map(Vec::as_slice).unwrap_or_default();
        let diffs = self.differ.diff(self.view(name)?, found)?;
        self.diffs.extend(diffs.iter().cloned());
        self.enqueue(name, WorkItem::ApplyDiff(diffs));
        Ok(())
    }

    async fn apply(&mut self, name: &str, diffs: Vec<Diff>) -> Result<()> {
        for diff in diffs {
            let pending = match diff.kind {
                DiffKind::Create => self.create(name).await?,
                DiffKind::Modify => {
                    if let Some(change) = diff.changes.iter().find(|c| c.replacement) {
                        return Err(CloudError::ReplacementRequired {
                            resource: name.to_string(),
                            attribute: change.attribute.clone(),
                        });
                    }
                    let id = Self::remote_id(&diff)?;
                    tracing::info!("Updating {} ({} change(s))", name, diff.changes.len());
                    self.backend
                        .update_resource(id, &diff.changes)
                        .await
                        .map_err(|e| CloudError::backend("update_resource", name, e))?;
                    self.unresolved_references(name)?
                }
                DiffKind::Noop => self.unresolved_references(name)?,
                DiffKind::Destroy => {
                    let id = Self::remote_id(&diff)?;
                    tracing::info!("Destroying {} ({})", name, id);
                    self.backend
                        .destroy_resource(id)
                        .await
                        .map_err(|e| CloudError::backend("destroy_resource", name, e))?;
                    Vec::new()
                }
            };
            if !pending.is_empty() {
                self.enqueue(name, WorkItem::ResolveReferences(pending));
            }
        }
        Ok(())
    }

    fn remote_id(diff: &Diff) -> Result<&str> {
        diff.remote_id
            .as_deref()
            .ok_or_else(|| CloudError::ResourceNotFound(diff.target.clone()))
    }

    /// Create the resource and return the references it still has to receive
    async fn create(&mut self, name: &str) -> Result<Vec<OwnedReference>> {
        let view = self.view(name)?;
        let kind = view.kind();
        let response = self
            .backend
            .create_resource(view)
            .await
            .map_err(|e| CloudError::backend("create_resource", name, e))?;
        tracing::info!("Created {} {} as {}", kind, name, response.id);

        self.definition.assign_identity(name, &response.id)?;
        self.created.push(CreatedResource {
            name: name.to_string(),
            kind: kind.to_string(),
            id: response.id,
            created_at: Utc::now(),
        });

        // Mutable references were deferred at creation and must be attached
        let refs = self.definition.refs();
        Ok(self
            .definition
            .owned_references(name)?
            .into_iter()
            .filter(|owned| owned.mutable || !refs.is_resolved(owned.reference))
            .collect())
    }

    fn unresolved_references(&self, name: &str) -> Result<Vec<OwnedReference>> {
        let refs = self.definition.refs();
        Ok(self
            .definition
            .owned_references(name)?
            .into_iter()
            .filter(|owned| !refs.is_resolved(owned.reference))
            .collect())
    }

    fn resolve(&mut self, name: &str, refs: Vec<OwnedReference>) -> Result<()> {
        let mut resolved = Vec::new();
        let mut unresolved = Vec::new();
        for owned in refs {
            if self.definition.try_resolve(owned.reference)?.is_resolved() {
                resolved.push(owned);
            } else {
                unresolved.push(owned);
            }
        }
        if !resolved.is_empty() {
            self.enqueue(name, WorkItem::ResolvedReferences(resolved));
        }
        if !unresolved.is_empty() {
            tracing::debug!("{}: {} reference(s) not yet resolvable", name, unresolved.len());
            self.enqueue(name, WorkItem::ResolveReferences(unresolved));
        }
        Ok(())
    }

    async fn attach(&mut self, name: &str, refs: Vec<OwnedReference>) -> Result<()> {
        let mut seen = Vec::new();
        for owned in refs {
            // A list of references under one keyword is patched once
            if seen.contains(&owned.path) {
                continue;
            }
            let value = self
                .definition
                .refs()
                .value(owned.reference)
                .map(|v| v.render(self.definition.refs(), false))
                .unwrap_or(serde_json::Value::Null);
            let view = self.view(&owned.path.resource)?;
            tracing::info!("Attaching {} = {}", owned.path, value);
            self.backend
                .modify_resource(view, &owned.path.segments, &value)
                .await
                .map_err(|e| CloudError::backend("modify_resource", name, e))?;

            self.attachments.push(Attachment {
                resource: owned.path.resource.clone(),
                path: owned.path.segments.clone(),
                value,
            });
            seen.push(owned.path);
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::memory::InMemoryBackend;
    use stackflow_core::ResourceNode;
    use stackflow_core::catalog::{network, subnet};

    fn tree() -> DefinitionTree {
        let mut tree = DefinitionTree::new("t");
        let mut net = ResourceNode::new(network::schema(), "n").unwrap();
        net.set("cidr_block", "10.0.0.0/16").unwrap();
        tree.add(net).unwrap();

        let mut sub = ResourceNode::new(subnet::schema(), "s").unwrap();
        sub.set("cidr_block", "10.0.1.0/24").unwrap();
        sub.set("availability_zone", "us-east-1a").unwrap();
        let net_id = tree.reference(&["n", "id"]);
        sub.set("network", net_id).unwrap();
        tree.add(sub).unwrap();
        tree
    }

    #[test]
    fn test_options_from_config() {
        let mut config = EngineConfig::default();
        config.executor.max_passes = 9;
        assert_eq!(ExecutorOptions::from(&config).max_passes, 9);
        assert_eq!(ExecutorOptions::default().max_passes, 256);
    }

    #[tokio::test]
    async fn test_creates_in_order() {
        let backend = InMemoryBackend::new();
        let mut tree = tree();
        let report = Executor::new(&mut tree, &backend).run().await.unwrap();

        assert_eq!(report.order, vec!["n", "s"]);
        assert_eq!(report.summary.create, 2);
        let created: Vec<_> = report.created.iter().map(|c| c.id.as_str()).collect();
        assert_eq!(created, vec!["1", "2"]);
        assert!(report.attachments.is_empty());
        assert_eq!(
            backend.record("2").unwrap().attributes["network"],
            serde_json::json!("1")
        );
    }

    #[tokio::test]
    async fn test_ambiguous_reconciliation() {
        let backend = InMemoryBackend::new();
        backend.seed(RemoteRecord::new("1", "network", "n"));
        backend.seed(RemoteRecord::new("2", "network", "n"));
        let mut tree = tree();

        let err = Executor::new(&mut tree, &backend).run().await.unwrap_err();
        assert!(matches!(
            err,
            CloudError::AmbiguousReconciliation { ref resource, matches: 2 } if resource == "n"
        ));
    }

    #[tokio::test]
    async fn test_replacement_required() {
        let backend = InMemoryBackend::new();
        backend.seed(
            RemoteRecord::new("5", "network", "n")
                .with_attribute("cidr_block", serde_json::json!("10.9.0.0/16")),
        );
        let mut tree = tree();

        let err = Executor::new(&mut tree, &backend).run().await.unwrap_err();
        assert!(matches!(
            err,
            CloudError::ReplacementRequired { ref attribute, .. } if attribute == "cidr_block"
        ));
    }

    #[tokio::test]
    async fn test_pass_bound() {
        let backend = InMemoryBackend::new();
        let mut tree = tree();
        let err = Executor::new(&mut tree, &backend)
            .with_options(ExecutorOptions { max_passes: 1 })
            .run()
            .await
            .unwrap_err();

        match err {
            CloudError::Unconverged { passes, pending } => {
                assert_eq!(passes, 1);
                assert_eq!(pending, vec!["n", "s"]);
            }
            other => panic!("unexpected error: {other}"),
        }
    }
}
