//! Resource nodes
//!
//! A [`ResourceNode`] is a named container of attribute values and named
//! collections of child nodes, typed by a static [`ResourceSchema`]. Nodes own
//! their children; there are no parent pointers, access paths are computed
//! top-down from the owning top-level resource.

use crate::error::{DefinitionError, Result};
use crate::reference::{RefArena, RefId};
use crate::schema::{self, CLASS_KEY, Property, ResourceSchema};
use crate::value::{Tag, Value};
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use std::fmt;

/// How a node came to exist inside the tree
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct NodeMetadata {
    /// Collection the node lives in; `None` for top-level resources
    pub collection: Option<String>,
    /// Name of the enclosing node
    pub parent: Option<String>,
}

/// A reference consumed by a node, tagged with the keyword holding it
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct OwnedRef {
    pub keyword: &'static str,
    pub reference: RefId,
}

/// Structural location of an attribute below a top-level resource
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct AccessPath {
    /// Top-level resource name
    pub resource: String,
    /// `[collection, child, ..., keyword]`
    pub segments: Vec<String>,
}

impl fmt::Display for AccessPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.resource)?;
        for segment in &self.segments {
            write!(f, ".{}", segment)?;
        }
        Ok(())
    }
}

/// An owned reference together with where it lives and how it may change
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OwnedReference {
    pub path: AccessPath,
    pub keyword: &'static str,
    pub reference: RefId,
    /// Reached through a Mutable attribute or collection
    pub mutable: bool,
}

/// Address of a node: top-level resource plus `(collection, child)` steps
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct NodeAddress {
    pub top: String,
    pub steps: Vec<(String, String)>,
}

impl NodeAddress {
    pub fn top_level(name: impl Into<String>) -> Self {
        Self {
            top: name.into(),
            steps: Vec::new(),
        }
    }

    fn child(&self, collection: &str, name: &str) -> Self {
        let mut steps = self.steps.clone();
        steps.push((collection.to_string(), name.to_string()));
        Self {
            top: self.top.clone(),
            steps,
        }
    }
}

impl fmt::Display for NodeAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.top)?;
        for (collection, name) in &self.steps {
            write!(f, ".{}[{}]", collection, name)?;
        }
        Ok(())
    }
}

/// A named, schema-typed unit of desired infrastructure state
#[derive(Debug, Clone)]
pub struct ResourceNode {
    schema: &'static ResourceSchema,
    attributes: IndexMap<String, Value>,
    collections: IndexMap<String, IndexMap<String, ResourceNode>>,
    owned_refs: Vec<OwnedRef>,
    metadata: NodeMetadata,
}

impl ResourceNode {
    /// Create a node of `schema`'s type with its `name` attribute set
    pub fn new(schema: &'static ResourceSchema, name: impl Into<String>) -> Result<Self> {
        if let Some(conflict) = schema.conflicts().first() {
            return Err(DefinitionError::schema(conflict.clone()));
        }
        let mut node = Self {
            schema,
            attributes: IndexMap::new(),
            collections: IndexMap::new(),
            owned_refs: Vec::new(),
            metadata: NodeMetadata::default(),
        };
        node.set(schema::NAME, Value::String(name.into()))?;
        Ok(node)
    }

    pub fn schema(&self) -> &'static ResourceSchema {
        self.schema
    }

    pub fn kind(&self) -> &'static str {
        self.schema.kind()
    }

    pub fn name(&self) -> &str {
        self.attributes
            .get(schema::NAME)
            .and_then(Value::as_str)
            .unwrap_or_default()
    }

    pub fn metadata(&self) -> &NodeMetadata {
        &self.metadata
    }

    /// Set a declared attribute. Each attribute may be set once.
    pub fn set(&mut self, attribute: &str, value: impl Into<Value>) -> Result<()> {
        let value = value.into();
        let spec = self.attribute_spec(attribute)?;
        let keyword = spec.name();
        if self.attributes.contains_key(keyword) {
            return Err(DefinitionError::schema(format!(
                "Attribute already set: {}.{}",
                self.describe(),
                keyword
            )));
        }
        if !spec.accepts(&value) {
            return Err(DefinitionError::schema(format!(
                "Invalid value for {}.{}: {}",
                self.describe(),
                keyword,
                value
            )));
        }
        let references = value.references();
        let value = spec.transform(value).map_err(|e| {
            DefinitionError::schema(format!("{}.{}: {}", self.describe(), keyword, e))
        })?;
        for reference in references {
            self.owned_refs.push(OwnedRef { keyword, reference });
        }
        self.attributes.insert(keyword.to_string(), value);
        Ok(())
    }

    /// Current value of a declared attribute, `None` while unset
    pub fn get(&self, attribute: &str) -> Result<Option<&Value>> {
        let spec = self.attribute_spec(attribute)?;
        Ok(self.attributes.get(spec.name()))
    }

    /// Whether `attribute` is declared on this type
    pub fn declares(&self, attribute: &str) -> bool {
        self.schema.attribute(attribute).is_some()
    }

    /// Set attributes in declaration order
    pub fn attributes(&self) -> impl Iterator<Item = (&str, &Value)> {
        self.attributes.iter().map(|(k, v)| (k.as_str(), v))
    }

    /// Add a child node to one of the declared collections
    pub fn add_child(&mut self, collection: &str, mut child: ResourceNode) -> Result<()> {
        let spec = self.schema.collection(collection).ok_or_else(|| {
            DefinitionError::UnknownAttribute {
                kind: self.kind().to_string(),
                attribute: collection.to_string(),
            }
        })?;
        let expected = spec.schema().kind();
        if child.kind() != expected {
            return Err(DefinitionError::schema(format!(
                "{}.{} holds {} resources, got {}",
                self.describe(),
                collection,
                expected,
                child.kind()
            )));
        }
        let parent = self.name().to_string();
        let children = self.collections.entry(spec.name().to_string()).or_default();
        if children.contains_key(child.name()) {
            return Err(DefinitionError::schema(format!(
                "Duplicate resource name in {}.{}: {}",
                parent,
                collection,
                child.name()
            )));
        }
        child.metadata = NodeMetadata {
            collection: Some(spec.name().to_string()),
            parent: Some(parent),
        };
        children.insert(child.name().to_string(), child);
        Ok(())
    }

    /// Children of a collection in insertion order
    pub fn children(&self, collection: &str) -> impl Iterator<Item = &ResourceNode> {
        self.collections
            .get(collection)
            .into_iter()
            .flat_map(|children| children.values())
    }

    pub fn child(&self, collection: &str, name: &str) -> Option<&ResourceNode> {
        self.collections.get(collection)?.get(name)
    }

    pub(crate) fn child_mut(&mut self, collection: &str, name: &str) -> Option<&mut ResourceNode> {
        self.collections.get_mut(collection)?.get_mut(name)
    }

    /// Non-empty collections in declaration order
    pub fn collections(&self) -> impl Iterator<Item = (&str, &IndexMap<String, ResourceNode>)> {
        self.collections.iter().map(|(k, v)| (k.as_str(), v))
    }

    /// Apply declared defaults to unset, non-lazy attributes, recursively
    pub fn fill_defaults(&mut self) -> Result<()> {
        let schema = self.schema;
        for spec in schema.attributes() {
            if spec.is_lazy() || self.attributes.contains_key(spec.name()) {
                continue;
            }
            if let Some(default) = spec.default() {
                self.set(spec.name(), default)?;
            }
        }
        for children in self.collections.values_mut() {
            for child in children.values_mut() {
                child.fill_defaults()?;
            }
        }
        Ok(())
    }

    /// Check required attributes, tags, collections and invariants, recursively
    pub fn validate(&self) -> Result<()> {
        if self.schema.is_tagged() && !self.attributes.contains_key(schema::TAGS) {
            return Err(DefinitionError::schema(format!(
                "Tags are required: {}",
                self.describe()
            )));
        }
        for spec in self.schema.attributes() {
            if spec.is_required() && !spec.is_lazy() && !self.attributes.contains_key(spec.name())
            {
                return Err(DefinitionError::schema(format!(
                    "Missing required attribute: {}.{}",
                    self.describe(),
                    spec.name()
                )));
            }
        }
        for spec in self.schema.collections() {
            let empty = self
                .collections
                .get(spec.name())
                .is_none_or(|children| children.is_empty());
            if spec.is_required() && empty {
                return Err(DefinitionError::schema(format!(
                    "Collection must not be empty: {}.{}",
                    self.describe(),
                    spec.name()
                )));
            }
        }
        for invariant in self.schema.invariants() {
            invariant(self).map_err(|e| {
                DefinitionError::schema(format!("{}: {}", self.describe(), e))
            })?;
        }
        for children in self.collections.values() {
            for child in children.values() {
                child.validate()?;
            }
        }
        Ok(())
    }

    /// Whether `reference` is held through a Mutable attribute.
    ///
    /// The first attribute holding it decides; otherwise every collection is
    /// searched with its properties added to `inherited`.
    pub fn is_mutable_reference(&self, reference: RefId, inherited: &[Property]) -> bool {
        self.find_mutability(reference, inherited).unwrap_or(false)
    }

    fn find_mutability(&self, reference: RefId, inherited: &[Property]) -> Option<bool> {
        for (keyword, value) in &self.attributes {
            if value.holds_reference(reference) {
                let spec = self.schema.attribute(keyword)?;
                return Some(spec.is_mutable_with(inherited));
            }
        }
        for (collection, children) in &self.collections {
            let inherited = self.inherit(collection, inherited);
            for child in children.values() {
                if let Some(mutable) = child.find_mutability(reference, &inherited) {
                    return Some(mutable);
                }
            }
        }
        None
    }

    fn inherit(&self, collection: &str, inherited: &[Property]) -> Vec<Property> {
        let mut properties = inherited.to_vec();
        if let Some(spec) = self.schema.collection(collection) {
            for property in spec.properties() {
                if !properties.contains(property) {
                    properties.push(*property);
                }
            }
        }
        properties
    }

    /// References consumed directly by this node
    pub fn owned_refs(&self) -> &[OwnedRef] {
        &self.owned_refs
    }

    /// Every reference owned by this node or its descendants, with access paths.
    ///
    /// `self` is treated as the top-level resource the paths start from.
    pub fn owned_references(&self) -> Vec<OwnedReference> {
        let mut found = Vec::new();
        self.collect_owned(self.name(), &[], &[], &mut found);
        found
    }

    fn collect_owned(
        &self,
        resource: &str,
        prefix: &[String],
        inherited: &[Property],
        found: &mut Vec<OwnedReference>,
    ) {
        for owned in &self.owned_refs {
            let mut segments = prefix.to_vec();
            segments.push(owned.keyword.to_string());
            let entry = OwnedReference {
                path: AccessPath {
                    resource: resource.to_string(),
                    segments,
                },
                keyword: owned.keyword,
                reference: owned.reference,
                mutable: self.is_mutable_reference(owned.reference, inherited),
            };
            if !found.contains(&entry) {
                found.push(entry);
            }
        }
        for (collection, children) in &self.collections {
            let inherited = self.inherit(collection, inherited);
            for (name, child) in children {
                let mut prefix = prefix.to_vec();
                prefix.push(collection.clone());
                prefix.push(name.clone());
                child.collect_owned(resource, &prefix, &inherited, found);
            }
        }
    }

    /// Collect the addresses of nodes holding the attribute named by `path`.
    ///
    /// `path` starts with this node's name and ends with an attribute keyword;
    /// the segments in between are child names, looked up in every collection.
    pub(crate) fn holders(&self, path: &[String], address: &NodeAddress, found: &mut Vec<NodeAddress>) {
        let Some((head, rest)) = path.split_first() else {
            return;
        };
        if head != self.name() {
            return;
        }
        match rest {
            [] => {}
            [keyword] => {
                if self.declares(keyword) {
                    found.push(address.clone());
                }
            }
            [child_name, ..] => {
                for (collection, children) in &self.collections {
                    if let Some(child) = children.get(child_name) {
                        child.holders(rest, &address.child(collection, child_name), found);
                    }
                }
            }
        }
    }

    /// Record the remote identity. Re-assigning the same id is a no-op.
    pub fn assign_identity(&mut self, id: &str) -> Result<()> {
        match self.attributes.get(schema::ID) {
            Some(Value::String(current)) if current == id => Ok(()),
            Some(current) => Err(DefinitionError::schema(format!(
                "{} already has identity {}, refusing {}",
                self.describe(),
                current,
                id
            ))),
            None => {
                tracing::debug!("Assigned identity {} to {}", id, self.describe());
                self.attributes
                    .insert(schema::ID.to_string(), Value::String(id.to_string()));
                Ok(())
            }
        }
    }

    /// The remote identity, once known
    pub fn identity(&self) -> Option<&str> {
        self.attributes.get(schema::ID).and_then(Value::as_str)
    }

    pub fn tags(&self) -> Vec<Tag> {
        self.attributes
            .get(schema::TAGS)
            .and_then(Value::as_list)
            .map(|items| {
                items
                    .iter()
                    .filter_map(|v| match v {
                        Value::Tag(tag) => Some(tag.clone()),
                        _ => None,
                    })
                    .collect()
            })
            .unwrap_or_default()
    }

    /// Structural document: every keyword, every collection, and the type
    pub fn serialize(&self, refs: &RefArena) -> serde_json::Value {
        let mut document = serde_json::Map::new();
        for spec in self.schema.attributes() {
            let value = self
                .attributes
                .get(spec.name())
                .map(|v| v.to_document(refs))
                .unwrap_or(serde_json::Value::Null);
            document.insert(spec.name().to_string(), value);
        }
        for spec in self.schema.collections() {
            let children: serde_json::Map<String, serde_json::Value> = self
                .children(spec.name())
                .map(|child| (child.name().to_string(), child.serialize(refs)))
                .collect();
            document.insert(spec.name().to_string(), serde_json::Value::Object(children));
        }
        document.insert(
            CLASS_KEY.to_string(),
            serde_json::Value::String(self.kind().to_string()),
        );
        serde_json::Value::Object(document)
    }

    /// Rebuild a node from [`ResourceNode::serialize`] output
    pub fn deserialize(
        document: &serde_json::Value,
        catalog: &crate::catalog::Catalog,
        refs: &mut RefArena,
    ) -> Result<Self> {
        let map = document.as_object().ok_or_else(|| {
            DefinitionError::InvalidDocument("resource document must be an object".to_string())
        })?;
        let kind = map.get(CLASS_KEY).and_then(|v| v.as_str()).ok_or_else(|| {
            DefinitionError::InvalidDocument(format!("missing '{}' discriminator", CLASS_KEY))
        })?;
        let schema = catalog.get(kind)?;
        let name = map
            .get(schema::NAME)
            .and_then(|v| v.as_str())
            .ok_or_else(|| {
                DefinitionError::InvalidDocument(format!("{} document has no name", kind))
            })?;
        let mut node = ResourceNode::new(schema, name)?;

        for (key, value) in map {
            if key == CLASS_KEY || key == schema::NAME {
                continue;
            }
            if let Some(spec) = schema.collection(key) {
                let children = value.as_object().ok_or_else(|| {
                    DefinitionError::InvalidDocument(format!(
                        "{}.{} must be an object of resources",
                        name, key
                    ))
                })?;
                for (child_name, child_document) in children {
                    let child = ResourceNode::deserialize(child_document, catalog, refs)?;
                    if child.name() != child_name {
                        return Err(DefinitionError::InvalidDocument(format!(
                            "{}.{}: key {} does not match resource name {}",
                            name,
                            spec.name(),
                            child_name,
                            child.name()
                        )));
                    }
                    node.add_child(spec.name(), child)?;
                }
            } else if node.declares(key) {
                if let Some(value) = Value::from_document(value, refs)? {
                    node.set(key, value)?;
                }
            } else {
                return Err(DefinitionError::UnknownAttribute {
                    kind: kind.to_string(),
                    attribute: key.clone(),
                });
            }
        }
        Ok(node)
    }

    fn attribute_spec(&self, attribute: &str) -> Result<&'static schema::AttributeSpec> {
        self.schema
            .attribute(attribute)
            .ok_or_else(|| DefinitionError::UnknownAttribute {
                kind: self.kind().to_string(),
                attribute: attribute.to_string(),
            })
    }

    fn describe(&self) -> String {
        format!("{} '{}'", self.kind(), self.name())
    }
}
