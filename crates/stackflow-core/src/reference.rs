//! Symbolic references between resources
//!
//! A reference is a chain of path segments rooted at the definition tree,
//! e.g. `network.id` or `web.ingress.http.from`. Chains live in a
//! [`RefArena`]: every node is owned by the arena and addressed by a
//! [`RefId`] handle, and a `(parent, segment)` pair always maps to the same
//! node so repeated lookups share structure.
//!
//! A reference starts unresolved and may be resolved exactly once.

use crate::error::{DefinitionError, Result};
use crate::value::Value;
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Handle to a chain node inside a [`RefArena`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct RefId(usize);

impl RefId {
    pub fn index(self) -> usize {
        self.0
    }
}

impl fmt::Display for RefId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ref#{}", self.0)
    }
}

/// Outcome of a resolution attempt that did not fail
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Resolution {
    /// The reference now carries a value
    Resolved,
    /// The target attribute is not known yet; retry later
    Pending,
}

impl Resolution {
    pub fn is_resolved(self) -> bool {
        matches!(self, Resolution::Resolved)
    }
}

#[derive(Debug, Clone)]
struct ChainNode {
    segment: String,
    parent: Option<RefId>,
    children: IndexMap<String, RefId>,
    value: Option<Value>,
}

/// Arena holding every reference chain of a definition tree
#[derive(Debug, Clone)]
pub struct RefArena {
    nodes: Vec<ChainNode>,
}

impl Default for RefArena {
    fn default() -> Self {
        Self::new()
    }
}

impl RefArena {
    pub fn new() -> Self {
        Self {
            nodes: vec![ChainNode {
                segment: String::new(),
                parent: None,
                children: IndexMap::new(),
                value: None,
            }],
        }
    }

    /// The root chain node; it stands for the definition tree itself
    pub fn root(&self) -> RefId {
        RefId(0)
    }

    /// Get or create the child of `parent` for `segment`
    pub fn chain(&mut self, parent: RefId, segment: &str) -> RefId {
        if let Some(existing) = self.nodes[parent.0].children.get(segment) {
            return *existing;
        }
        let id = RefId(self.nodes.len());
        self.nodes.push(ChainNode {
            segment: segment.to_string(),
            parent: Some(parent),
            children: IndexMap::new(),
            value: None,
        });
        self.nodes[parent.0]
            .children
            .insert(segment.to_string(), id);
        id
    }

    /// Chain every segment of `path` starting from the root
    pub fn chain_path<S: AsRef<str>>(&mut self, path: &[S]) -> RefId {
        path.iter()
            .fold(self.root(), |current, segment| self.chain(current, segment.as_ref()))
    }

    /// Look up an existing chain without creating nodes
    pub fn find<S: AsRef<str>>(&self, path: &[S]) -> Option<RefId> {
        path.iter().try_fold(self.root(), |current, segment| {
            self.nodes[current.0].children.get(segment.as_ref()).copied()
        })
    }

    /// Whether `id` is a handle issued by this arena
    pub fn contains(&self, id: RefId) -> bool {
        id.0 < self.nodes.len()
    }

    pub fn segment(&self, id: RefId) -> &str {
        &self.nodes[id.0].segment
    }

    pub fn parent(&self, id: RefId) -> Option<RefId> {
        self.nodes[id.0].parent
    }

    /// Path segments from the root (exclusive) down to `id`
    pub fn path(&self, id: RefId) -> Vec<String> {
        let mut segments = Vec::new();
        let mut current = Some(id);
        while let Some(node) = current {
            let chain = &self.nodes[node.0];
            if chain.parent.is_some() {
                segments.push(chain.segment.clone());
            }
            current = chain.parent;
        }
        segments.reverse();
        segments
    }

    /// Dotted form of the path, used in messages
    pub fn display(&self, id: RefId) -> String {
        self.path(id).join(".")
    }

    pub fn is_resolved(&self, id: RefId) -> bool {
        self.nodes[id.0].value.is_some()
    }

    pub fn value(&self, id: RefId) -> Option<&Value> {
        self.nodes[id.0].value.as_ref()
    }

    /// Set the terminal value. A reference resolves at most once.
    pub fn resolve(&mut self, id: RefId, value: Value) -> Result<()> {
        if self.is_resolved(id) {
            return Err(DefinitionError::ReferenceAlreadyResolved(self.display(id)));
        }
        tracing::debug!("Resolved reference {} to {}", self.display(id), value);
        self.nodes[id.0].value = Some(value);
        Ok(())
    }

    /// Every chain node without children below the root
    pub fn leaves(&self) -> Vec<RefId> {
        let mut leaves = Vec::new();
        let mut stack: Vec<RefId> = self.nodes[0].children.values().rev().copied().collect();
        while let Some(id) = stack.pop() {
            let node = &self.nodes[id.0];
            if node.children.is_empty() {
                leaves.push(id);
            } else {
                stack.extend(node.children.values().rev().copied());
            }
        }
        leaves
    }

    /// Leaves that have not been resolved yet
    pub fn unresolved_leaves(&self) -> Vec<RefId> {
        self.leaves()
            .into_iter()
            .filter(|id| !self.is_resolved(*id))
            .collect()
    }
}
