//! Diff types and the structural differ

use crate::backend::RemoteRecord;
use crate::error::{CloudError, Result};
use serde::{Deserialize, Serialize};
use stackflow_core::ResourceView;

/// Type of change needed to converge a resource
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DiffKind {
    /// Create a new resource
    Create,
    /// Remove a remote resource
    Destroy,
    /// Update an existing resource in place
    Modify,
    /// No changes needed
    Noop,
}

impl std::fmt::Display for DiffKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            DiffKind::Create => write!(f, "create"),
            DiffKind::Destroy => write!(f, "destroy"),
            DiffKind::Modify => write!(f, "modify"),
            DiffKind::Noop => write!(f, "no-op"),
        }
    }
}

/// A single attribute or collection that differs from the remote record
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Change {
    /// Attribute or collection keyword
    pub attribute: String,

    pub current: serde_json::Value,

    pub desired: serde_json::Value,

    /// The attribute is Immutable; changing it means destroy and recreate
    pub replacement: bool,
}

/// Computed change for one top-level resource
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Diff {
    pub kind: DiffKind,

    /// Name of the resource in the definition tree
    pub target: String,

    /// Identity of the matched remote record, if any
    pub remote_id: Option<String>,

    pub changes: Vec<Change>,
}

impl Diff {
    pub fn create(target: impl Into<String>) -> Self {
        Self {
            kind: DiffKind::Create,
            target: target.into(),
            remote_id: None,
            changes: Vec::new(),
        }
    }

    pub fn destroy(target: impl Into<String>, remote_id: impl Into<String>) -> Self {
        Self {
            kind: DiffKind::Destroy,
            target: target.into(),
            remote_id: Some(remote_id.into()),
            changes: Vec::new(),
        }
    }

    pub fn noop(target: impl Into<String>, remote_id: impl Into<String>) -> Self {
        Self {
            kind: DiffKind::Noop,
            target: target.into(),
            remote_id: Some(remote_id.into()),
            changes: Vec::new(),
        }
    }

    pub fn modify(
        target: impl Into<String>,
        remote_id: impl Into<String>,
        changes: Vec<Change>,
    ) -> Self {
        Self {
            kind: DiffKind::Modify,
            target: target.into(),
            remote_id: Some(remote_id.into()),
            changes,
        }
    }

    pub fn has_changes(&self) -> bool {
        self.kind != DiffKind::Noop
    }
}

/// Counts of diffs by kind
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DiffSummary {
    pub create: usize,
    pub modify: usize,
    pub destroy: usize,
    pub no_change: usize,
}

impl DiffSummary {
    pub fn of(diffs: &[Diff]) -> Self {
        let count = |kind| diffs.iter().filter(|d| d.kind == kind).count();
        Self {
            create: count(DiffKind::Create),
            modify: count(DiffKind::Modify),
            destroy: count(DiffKind::Destroy),
            no_change: count(DiffKind::Noop),
        }
    }
}

impl std::fmt::Display for DiffSummary {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{} to create, {} to modify, {} to destroy, {} unchanged",
            self.create, self.modify, self.destroy, self.no_change
        )
    }
}

/// Computes the diffs that move `target` from its current state to the desired one
pub trait Differ: Send + Sync {
    fn diff(&self, target: ResourceView<'_>, current: &[RemoteRecord]) -> Result<Vec<Diff>>;
}

/// Compares every known, non-lazy attribute and every collection by value.
///
/// Values still waiting on a reference are skipped, down to single
/// attributes of collection children; they are attached later through
/// reference resolution rather than diffed.
#[derive(Debug, Default, Clone, Copy)]
pub struct StructuralDiffer;

impl StructuralDiffer {
    fn changes(target: ResourceView<'_>, record: &RemoteRecord) -> Vec<Change> {
        let schema = target.schema();
        let current = |keyword: &str| {
            record
                .attributes
                .get(keyword)
                .cloned()
                .unwrap_or(serde_json::Value::Null)
        };
        let mut changes = Vec::new();

        for spec in schema.attributes() {
            if spec.is_lazy() {
                continue;
            }
            let Some(desired) = target.known_attribute(spec.name()) else {
                continue;
            };
            let current = current(spec.name());
            if current != desired {
                changes.push(Change {
                    attribute: spec.name().to_string(),
                    current,
                    desired,
                    replacement: spec.is_immutable(),
                });
            }
        }

        for spec in schema.collections() {
            let known = target.known_collection(spec.name());
            let current = match current(spec.name()) {
                serde_json::Value::Null => serde_json::json!({}),
                other => other,
            };
            // Pending values compare equal to whatever the remote holds
            let mut desired = known.value;
            for path in &known.pending {
                if let Some(value) = lookup(&current, path) {
                    insert_at(&mut desired, path, value.clone());
                }
            }
            if current != desired {
                changes.push(Change {
                    attribute: spec.name().to_string(),
                    current,
                    desired,
                    replacement: spec
                        .properties()
                        .contains(&stackflow_core::Property::Immutable),
                });
            }
        }
        changes
    }
}

fn lookup<'v>(value: &'v serde_json::Value, path: &[String]) -> Option<&'v serde_json::Value> {
    path.iter().try_fold(value, |node, segment| node.get(segment))
}

fn insert_at(value: &mut serde_json::Value, path: &[String], leaf: serde_json::Value) {
    let Some((keyword, parents)) = path.split_last() else {
        return;
    };
    let mut node = value;
    for segment in parents {
        match node.get_mut(segment) {
            Some(next) => node = next,
            None => return,
        }
    }
    if let Some(object) = node.as_object_mut() {
        object.insert(keyword.clone(), leaf);
    }
}

impl Differ for StructuralDiffer {
    fn diff(&self, target: ResourceView<'_>, current: &[RemoteRecord]) -> Result<Vec<Diff>> {
        let diff = match current {
            [] => Diff::create(target.name()),
            [record] => {
                let changes = Self::changes(target, record);
                if changes.is_empty() {
                    Diff::noop(target.name(), record.id.as_str())
                } else {
                    Diff::modify(target.name(), record.id.as_str(), changes)
                }
            }
            _ => {
                return Err(CloudError::AmbiguousDiffTarget {
                    resource: target.name().to_string(),
                    matches: current.len(),
                });
            }
        };
        tracing::debug!("Diff for {}: {}", diff.target, diff.kind);
        Ok(vec![diff])
    }
}
