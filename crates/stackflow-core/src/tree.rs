//! Definition tree
//!
//! The root scope: named top-level resources plus the arena of every
//! reference chain created while composing them. References are resolved by
//! scanning the tree for the single node holding the referenced attribute.

use crate::catalog::Catalog;
use crate::error::{DefinitionError, Result};
use crate::node::{NodeAddress, OwnedReference, ResourceNode};
use crate::reference::{RefArena, RefId, Resolution};
use crate::view::ResourceView;
use indexmap::IndexMap;
use serde_json::json;
use std::cell::RefCell;
use std::collections::HashMap;

#[derive(Debug, Clone)]
pub struct DefinitionTree {
    name: String,
    refs: RefArena,
    resources: IndexMap<String, ResourceNode>,
    matches: RefCell<HashMap<RefId, Vec<NodeAddress>>>,
}

impl DefinitionTree {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            refs: RefArena::new(),
            resources: IndexMap::new(),
            matches: RefCell::new(HashMap::new()),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn refs(&self) -> &RefArena {
        &self.refs
    }

    /// Chain a reference from the root, e.g. `["network", "id"]`
    pub fn reference<S: AsRef<str>>(&mut self, path: &[S]) -> RefId {
        self.refs.chain_path(path)
    }

    /// Add a top-level resource; names are unique within the tree.
    ///
    /// Every reference the resource holds must come from this tree's arena.
    pub fn add(&mut self, resource: ResourceNode) -> Result<()> {
        if self.resources.contains_key(resource.name()) {
            return Err(DefinitionError::schema(format!(
                "Duplicate resource name: {}",
                resource.name()
            )));
        }
        if let Some(owned) = resource
            .owned_references()
            .into_iter()
            .find(|owned| !self.refs.contains(owned.reference))
        {
            return Err(DefinitionError::ForeignReference {
                holder: owned.path.to_string(),
                reference: owned.reference.to_string(),
            });
        }
        self.matches.borrow_mut().clear();
        self.resources.insert(resource.name().to_string(), resource);
        Ok(())
    }

    pub fn resource(&self, name: &str) -> Option<&ResourceNode> {
        self.resources.get(name)
    }

    /// Mutable access drops memoized reference matches
    pub fn resource_mut(&mut self, name: &str) -> Option<&mut ResourceNode> {
        self.matches.get_mut().clear();
        self.resources.get_mut(name)
    }

    /// Top-level resources in declaration order
    pub fn resources(&self) -> impl Iterator<Item = &ResourceNode> {
        self.resources.values()
    }

    pub fn names(&self) -> Vec<String> {
        self.resources.keys().cloned().collect()
    }

    pub fn view(&self, name: &str) -> Option<ResourceView<'_>> {
        self.resources
            .get(name)
            .map(|node| ResourceView::new(node, &self.refs))
    }

    pub fn lookup(&self, address: &NodeAddress) -> Option<&ResourceNode> {
        let mut node = self.resources.get(&address.top)?;
        for (collection, name) in &address.steps {
            node = node.child(collection, name)?;
        }
        Some(node)
    }

    fn lookup_mut(&mut self, address: &NodeAddress) -> Option<&mut ResourceNode> {
        let mut node = self.resources.get_mut(&address.top)?;
        for (collection, name) in &address.steps {
            node = node.child_mut(collection, name)?;
        }
        Some(node)
    }

    /// Nodes holding the attribute `reference` points at. Memoized per reference.
    pub fn matching_resources(&self, reference: RefId) -> Vec<NodeAddress> {
        if let Some(found) = self.matches.borrow().get(&reference) {
            return found.clone();
        }
        let path = self.refs.path(reference);
        let mut found = Vec::new();
        for (name, resource) in &self.resources {
            resource.holders(&path, &NodeAddress::top_level(name.as_str()), &mut found);
        }
        tracing::debug!(
            "Reference {} matched {} resource(s)",
            self.refs.display(reference),
            found.len()
        );
        self.matches.borrow_mut().insert(reference, found.clone());
        found
    }

    /// The single node `reference` points at
    pub fn target(&self, reference: RefId) -> Result<NodeAddress> {
        let mut found = self.matching_resources(reference);
        match found.len() {
            0 => Err(DefinitionError::DanglingReference(self.refs.display(reference))),
            1 => Ok(found.remove(0)),
            _ => Err(DefinitionError::AmbiguousReference {
                reference: self.refs.display(reference),
                matches: found.iter().map(ToString::to_string).collect(),
            }),
        }
    }

    /// Resolve `reference` if its target attribute is known.
    ///
    /// Returns [`Resolution::Pending`] while the target is not yet set.
    pub fn try_resolve(&mut self, reference: RefId) -> Result<Resolution> {
        if self.refs.is_resolved(reference) {
            return Ok(Resolution::Resolved);
        }
        let address = self.target(reference)?;
        let keyword = self.refs.segment(reference).to_string();
        let node = self
            .lookup(&address)
            .ok_or_else(|| DefinitionError::UnknownResource(address.to_string()))?;
        let value = match node.get(&keyword)? {
            Some(value) => value.resolved(&self.refs),
            None => None,
        };
        match value {
            Some(value) => {
                self.refs.resolve(reference, value)?;
                Ok(Resolution::Resolved)
            }
            None => Ok(Resolution::Pending),
        }
    }

    /// One sweep over every unresolved reference leaf; returns how many resolved
    pub fn resolve_pending(&mut self) -> Result<usize> {
        let mut resolved = 0;
        for leaf in self.refs.unresolved_leaves() {
            if self.try_resolve(leaf)?.is_resolved() {
                resolved += 1;
            }
        }
        if resolved > 0 {
            tracing::debug!("Sweep resolved {} reference(s)", resolved);
        }
        Ok(resolved)
    }

    pub fn unresolved_leaves(&self) -> Vec<RefId> {
        self.refs.unresolved_leaves()
    }

    /// Every reference owned by `name` or its descendants
    pub fn owned_references(&self, name: &str) -> Result<Vec<OwnedReference>> {
        self.resources
            .get(name)
            .map(ResourceNode::owned_references)
            .ok_or_else(|| DefinitionError::UnknownResource(name.to_string()))
    }

    /// Record the remote identity of a top-level resource
    pub fn assign_identity(&mut self, name: &str, id: &str) -> Result<()> {
        self.lookup_mut(&NodeAddress::top_level(name))
            .ok_or_else(|| DefinitionError::UnknownResource(name.to_string()))?
            .assign_identity(id)
    }

    pub fn fill_defaults(&mut self) -> Result<()> {
        for resource in self.resources.values_mut() {
            resource.fill_defaults()?;
        }
        Ok(())
    }

    pub fn to_document(&self) -> serde_json::Value {
        let resources: serde_json::Map<String, serde_json::Value> = self
            .resources
            .iter()
            .map(|(name, resource)| (name.clone(), resource.serialize(&self.refs)))
            .collect();
        json!({ "name": self.name, "resources": resources })
    }

    pub fn from_document(document: &serde_json::Value, catalog: &Catalog) -> Result<Self> {
        let name = document
            .get("name")
            .and_then(|v| v.as_str())
            .ok_or_else(|| DefinitionError::InvalidDocument("missing tree name".to_string()))?;
        let resources = document
            .get("resources")
            .and_then(|v| v.as_object())
            .ok_or_else(|| {
                DefinitionError::InvalidDocument("missing 'resources' object".to_string())
            })?;

        let mut tree = DefinitionTree::new(name);
        for (key, resource_document) in resources {
            let resource = ResourceNode::deserialize(resource_document, catalog, &mut tree.refs)?;
            if resource.name() != key {
                return Err(DefinitionError::InvalidDocument(format!(
                    "key {} does not match resource name {}",
                    key,
                    resource.name()
                )));
            }
            tree.add(resource)?;
        }
        Ok(tree)
    }
}
