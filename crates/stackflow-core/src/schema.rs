//! Declarative resource schemas
//!
//! Each resource type declares its attributes and child collections once, as
//! a static [`ResourceSchema`] table. Validation, default filling, mutability
//! checks and diffing all work generically off that table.

use crate::node::ResourceNode;
use crate::value::Value;
use serde::{Deserialize, Serialize};

/// Attribute name reserved for the type discriminator in documents
pub const CLASS_KEY: &str = "class";

/// Identity attribute present on every resource
pub const ID: &str = "id";
/// Tag list attribute present on every resource
pub const TAGS: &str = "tags";
/// Name attribute present on every resource
pub const NAME: &str = "name";

/// How an attribute behaves once the resource exists remotely
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Property {
    /// Only known after remote creation
    Lazy,
    /// Can change in place; references through it may form cycles
    Mutable,
    /// Any change requires destroy and recreate
    Immutable,
}

/// Returns true when `value` is acceptable for an attribute
pub type Predicate = fn(&Value) -> bool;
/// Normalizes a validated value before it is stored
pub type Transformer = fn(Value) -> Result<Value, String>;
/// Type-level check run by `validate()` after all attributes are set
pub type Invariant = fn(&ResourceNode) -> Result<(), String>;

/// Declaration of a single attribute keyword
#[derive(Debug, Clone)]
pub struct AttributeSpec {
    name: &'static str,
    validator: Predicate,
    transformer: Option<Transformer>,
    required: bool,
    default: Option<fn() -> Value>,
    properties: Vec<Property>,
}

impl AttributeSpec {
    /// A required attribute accepting any value
    pub fn new(name: &'static str) -> Self {
        Self {
            name,
            validator: predicates::any,
            transformer: None,
            required: true,
            default: None,
            properties: Vec::new(),
        }
    }

    pub fn validator(mut self, validator: Predicate) -> Self {
        self.validator = validator;
        self
    }

    pub fn transformer(mut self, transformer: Transformer) -> Self {
        self.transformer = Some(transformer);
        self
    }

    pub fn optional(mut self) -> Self {
        self.required = false;
        self
    }

    /// Optional attribute filled with `default` when left unset
    pub fn default_value(mut self, default: fn() -> Value) -> Self {
        self.required = false;
        self.default = Some(default);
        self
    }

    pub fn lazy(self) -> Self {
        self.property(Property::Lazy)
    }

    pub fn mutable(self) -> Self {
        self.property(Property::Mutable)
    }

    pub fn immutable(self) -> Self {
        self.property(Property::Immutable)
    }

    fn property(mut self, property: Property) -> Self {
        if !self.properties.contains(&property) {
            self.properties.push(property);
        }
        self
    }

    pub fn name(&self) -> &'static str {
        self.name
    }

    pub fn is_required(&self) -> bool {
        self.required
    }

    pub fn is_lazy(&self) -> bool {
        self.properties.contains(&Property::Lazy)
    }

    pub fn properties(&self) -> &[Property] {
        &self.properties
    }

    /// Mutability once properties inherited from enclosing collections are unioned in
    pub fn is_mutable_with(&self, inherited: &[Property]) -> bool {
        self.properties.contains(&Property::Mutable) || inherited.contains(&Property::Mutable)
    }

    pub fn is_immutable(&self) -> bool {
        self.properties.contains(&Property::Immutable)
    }

    pub fn default(&self) -> Option<Value> {
        self.default.map(|f| f())
    }

    pub fn accepts(&self, value: &Value) -> bool {
        (self.validator)(value)
    }

    pub fn transform(&self, value: Value) -> Result<Value, String> {
        match self.transformer {
            Some(transformer) => transformer(value),
            None => Ok(value),
        }
    }
}

/// Declaration of a named collection of child resources
#[derive(Debug, Clone)]
pub struct CollectionSpec {
    name: &'static str,
    schema: fn() -> &'static ResourceSchema,
    required: bool,
    properties: Vec<Property>,
}

impl CollectionSpec {
    /// A required collection whose elements follow `schema`
    pub fn new(name: &'static str, schema: fn() -> &'static ResourceSchema) -> Self {
        Self {
            name,
            schema,
            required: true,
            properties: Vec::new(),
        }
    }

    pub fn optional(mut self) -> Self {
        self.required = false;
        self
    }

    pub fn mutable(mut self) -> Self {
        self.properties.push(Property::Mutable);
        self
    }

    pub fn immutable(mut self) -> Self {
        self.properties.push(Property::Immutable);
        self
    }

    pub fn name(&self) -> &'static str {
        self.name
    }

    pub fn schema(&self) -> &'static ResourceSchema {
        (self.schema)()
    }

    pub fn is_required(&self) -> bool {
        self.required
    }

    pub fn properties(&self) -> &[Property] {
        &self.properties
    }
}

/// Static description of a resource type
#[derive(Debug, Clone)]
pub struct ResourceSchema {
    kind: &'static str,
    tagged: bool,
    attributes: Vec<AttributeSpec>,
    collections: Vec<CollectionSpec>,
    invariants: Vec<Invariant>,
    conflicts: Vec<String>,
}

impl ResourceSchema {
    pub fn builder(kind: &'static str) -> SchemaBuilder {
        SchemaBuilder::new(kind)
    }

    pub fn kind(&self) -> &'static str {
        self.kind
    }

    /// Whether instances must carry a tag list
    pub fn is_tagged(&self) -> bool {
        self.tagged
    }

    pub fn attributes(&self) -> &[AttributeSpec] {
        &self.attributes
    }

    pub fn attribute(&self, name: &str) -> Option<&AttributeSpec> {
        self.attributes.iter().find(|a| a.name == name)
    }

    pub fn collections(&self) -> &[CollectionSpec] {
        &self.collections
    }

    pub fn collection(&self, name: &str) -> Option<&CollectionSpec> {
        self.collections.iter().find(|c| c.name == name)
    }

    pub fn invariants(&self) -> &[Invariant] {
        &self.invariants
    }

    /// Definition errors recorded while the table was built
    pub fn conflicts(&self) -> &[String] {
        &self.conflicts
    }
}

/// Builder for [`ResourceSchema`]; `id`, `tags` and `name` are always declared
pub struct SchemaBuilder {
    schema: ResourceSchema,
}

impl SchemaBuilder {
    fn new(kind: &'static str) -> Self {
        let builder = Self {
            schema: ResourceSchema {
                kind,
                tagged: true,
                attributes: Vec::new(),
                collections: Vec::new(),
                invariants: Vec::new(),
                conflicts: Vec::new(),
            },
        };
        builder
            .attribute(
                AttributeSpec::new(ID)
                    .validator(predicates::is_string)
                    .lazy()
                    .immutable(),
            )
            .attribute(
                AttributeSpec::new(TAGS)
                    .validator(predicates::is_tag_list)
                    .optional()
                    .mutable(),
            )
            .attribute(
                AttributeSpec::new(NAME)
                    .validator(predicates::is_string)
                    .mutable(),
            )
    }

    /// Instances of this type do not need tags
    pub fn untagged(mut self) -> Self {
        self.schema.tagged = false;
        self
    }

    pub fn attribute(mut self, spec: AttributeSpec) -> Self {
        let name = spec.name;
        self.check_name(name);
        self.schema.attributes.push(spec);
        self
    }

    pub fn collection(mut self, spec: CollectionSpec) -> Self {
        let name = spec.name;
        self.check_name(name);
        self.schema.collections.push(spec);
        self
    }

    pub fn invariant(mut self, invariant: Invariant) -> Self {
        self.schema.invariants.push(invariant);
        self
    }

    fn check_name(&mut self, name: &str) {
        let kind = self.schema.kind;
        if name == CLASS_KEY {
            self.schema
                .conflicts
                .push(format!("'{}' is a reserved keyword: {}", CLASS_KEY, kind));
        }
        if self.schema.attribute(name).is_some() || self.schema.collection(name).is_some() {
            self.schema
                .conflicts
                .push(format!("Keyword already defined: {}.{}", kind, name));
        }
    }

    pub fn build(self) -> ResourceSchema {
        self.schema
    }
}

/// Reusable validator predicates
pub mod predicates {
    use crate::value::Value;

    pub fn any(_: &Value) -> bool {
        true
    }

    pub fn is_string(value: &Value) -> bool {
        matches!(value, Value::String(_))
    }

    pub fn is_bool(value: &Value) -> bool {
        matches!(value, Value::Boolean(_))
    }

    pub fn is_integer(value: &Value) -> bool {
        matches!(value, Value::Integer(_))
    }

    pub fn is_non_negative(value: &Value) -> bool {
        matches!(value, Value::Integer(i) if *i >= 0)
    }

    pub fn is_string_or_ref(value: &Value) -> bool {
        matches!(value, Value::String(_) | Value::Reference(_))
    }

    /// A plain string or an already parsed CIDR block
    pub fn is_cidr_like(value: &Value) -> bool {
        matches!(value, Value::String(_) | Value::Cidr(_))
    }

    pub fn is_tag_list(value: &Value) -> bool {
        matches!(value, Value::List(items)
            if !items.is_empty() && items.iter().all(|v| matches!(v, Value::Tag(_))))
    }

    pub fn is_cidr_list(value: &Value) -> bool {
        matches!(value, Value::List(items)
            if !items.is_empty() && items.iter().all(is_cidr_like))
    }

    pub fn is_string_list(value: &Value) -> bool {
        matches!(value, Value::List(items) if items.iter().all(is_string))
    }

    pub fn is_string_or_ref_list(value: &Value) -> bool {
        matches!(value, Value::List(items) if items.iter().all(is_string_or_ref))
    }
}

/// Reusable value transformers
pub mod transformers {
    use crate::value::{CidrBlock, Value};

    /// Parse a string into a [`CidrBlock`]; references pass through untouched
    pub fn cidr_block(value: Value) -> Result<Value, String> {
        match value {
            Value::Reference(id) => Ok(Value::Reference(id)),
            Value::String(s) => s
                .parse::<CidrBlock>()
                .map(Value::Cidr)
                .map_err(|e| e.to_string()),
            Value::Cidr(block) => Ok(Value::Cidr(block)),
            other => Err(format!("Expected a CIDR block, got {}", other)),
        }
    }

    /// Parse every element of a list into a [`CidrBlock`]
    pub fn cidr_blocks(value: Value) -> Result<Value, String> {
        match value {
            Value::List(items) => items
                .into_iter()
                .map(cidr_block)
                .collect::<Result<Vec<_>, _>>()
                .map(Value::List),
            other => Err(format!("Expected a list of CIDR blocks, got {}", other)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_builder_declares_common_keywords() {
        let schema = ResourceSchema::builder("widget")
            .attribute(AttributeSpec::new("size").validator(predicates::is_integer))
            .build();

        let id = schema.attribute(ID).unwrap();
        assert!(id.is_lazy());
        assert!(id.is_immutable());
        assert!(!schema.attribute(TAGS).unwrap().is_required());
        assert!(schema.attribute(NAME).unwrap().is_required());
        assert!(schema.attribute("size").is_some());
        assert!(schema.is_tagged());
        assert!(schema.conflicts().is_empty());
    }

    #[test]
    fn test_builder_records_conflicts() {
        let schema = ResourceSchema::builder("widget")
            .attribute(AttributeSpec::new("size"))
            .attribute(AttributeSpec::new("size"))
            .attribute(AttributeSpec::new(CLASS_KEY))
            .build();

        assert_eq!(schema.conflicts().len(), 2);
        assert!(schema.conflicts()[0].contains("already defined"));
        assert!(schema.conflicts()[1].contains("reserved"));
    }

    #[test]
    fn test_mutability_union() {
        let spec = AttributeSpec::new("cidr").immutable();
        assert!(!spec.is_mutable_with(&[]));
        assert!(spec.is_mutable_with(&[Property::Mutable]));
    }

    #[test]
    fn test_cidr_transformer() {
        let value = transformers::cidr_block(Value::from("10.0.0.0/16")).unwrap();
        assert!(matches!(value, Value::Cidr(_)));
        assert!(transformers::cidr_block(Value::from("bogus")).is_err());
        assert!(transformers::cidr_block(Value::from(true)).is_err());
    }

    #[test]
    fn test_cidr_transformer_keeps_references() {
        let mut refs = crate::reference::RefArena::new();
        let peer = refs.chain_path(&["peer", "cidr_block"]);
        let value = transformers::cidr_blocks(Value::List(vec![
            Value::from("10.0.0.0/16"),
            Value::Reference(peer),
        ]))
        .unwrap();
        assert!(matches!(
            value,
            Value::List(ref items)
                if matches!(items[0], Value::Cidr(_)) && items[1] == Value::Reference(peer)
        ));
    }
}
