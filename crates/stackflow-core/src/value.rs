//! Attribute values
//!
//! Resources store every attribute as a [`Value`]. Besides plain scalars the
//! model knows about tags, IPv4 CIDR blocks and references to other
//! resources' attributes.

use crate::error::{DefinitionError, Result};
use crate::reference::{RefArena, RefId};
use serde::{Deserialize, Serialize};
use serde_json::json;
use std::fmt;
use std::net::Ipv4Addr;
use std::str::FromStr;

/// Key/value tag attached to a resource
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Tag {
    pub key: String,
    pub value: String,
}

impl Tag {
    pub fn new(key: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            key: key.into(),
            value: value.into(),
        }
    }
}

impl fmt::Display for Tag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} -> {}", self.key, self.value)
    }
}

/// IPv4 CIDR block such as `10.0.0.0/16`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct CidrBlock {
    address: Ipv4Addr,
    prefix: u8,
}

impl CidrBlock {
    pub fn new(address: Ipv4Addr, prefix: u8) -> Result<Self> {
        if prefix > 32 {
            return Err(DefinitionError::schema(format!(
                "CIDR prefix out of range: {}/{}",
                address, prefix
            )));
        }
        Ok(Self { address, prefix })
    }

    pub fn address(&self) -> Ipv4Addr {
        self.address
    }

    pub fn prefix(&self) -> u8 {
        self.prefix
    }
}

impl FromStr for CidrBlock {
    type Err = DefinitionError;

    fn from_str(s: &str) -> Result<Self> {
        let invalid = || DefinitionError::schema(format!("Invalid CIDR block: {}", s));
        let (address, prefix) = s.split_once('/').ok_or_else(invalid)?;
        let address = address.parse::<Ipv4Addr>().map_err(|_| invalid())?;
        let prefix = prefix.parse::<u8>().map_err(|_| invalid())?;
        CidrBlock::new(address, prefix)
    }
}

impl fmt::Display for CidrBlock {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.address, self.prefix)
    }
}

/// A single attribute value
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    String(String),
    Integer(i64),
    Boolean(bool),
    Tag(Tag),
    Cidr(CidrBlock),
    List(Vec<Value>),
    Reference(RefId),
}

impl Value {
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::String(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_integer(&self) -> Option<i64> {
        match self {
            Value::Integer(i) => Some(*i),
            _ => None,
        }
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Value::Boolean(b) => Some(*b),
            _ => None,
        }
    }

    pub fn as_list(&self) -> Option<&[Value]> {
        match self {
            Value::List(items) => Some(items),
            _ => None,
        }
    }

    pub fn as_reference(&self) -> Option<RefId> {
        match self {
            Value::Reference(id) => Some(*id),
            _ => None,
        }
    }

    /// Whether `reference` is this value or one of its list elements
    pub fn holds_reference(&self, reference: RefId) -> bool {
        match self {
            Value::Reference(id) => *id == reference,
            Value::List(items) => items.iter().any(|v| v.holds_reference(reference)),
            _ => false,
        }
    }

    /// Every reference contained in this value, in order
    pub fn references(&self) -> Vec<RefId> {
        let mut found = Vec::new();
        self.collect_references(&mut found);
        found
    }

    fn collect_references(&self, found: &mut Vec<RefId>) {
        match self {
            Value::Reference(id) => found.push(*id),
            Value::List(items) => items.iter().for_each(|v| v.collect_references(found)),
            _ => {}
        }
    }

    /// Substitute resolved references; `None` while any reference is pending
    pub fn resolved(&self, refs: &RefArena) -> Option<Value> {
        match self {
            Value::Reference(id) => refs.value(*id).and_then(|v| v.resolved(refs)),
            Value::List(items) => items
                .iter()
                .map(|v| v.resolved(refs))
                .collect::<Option<Vec<_>>>()
                .map(Value::List),
            other => Some(other.clone()),
        }
    }

    /// Plain JSON form; pending references (and deferred ones) become `null`
    pub fn render(&self, refs: &RefArena, defer_references: bool) -> serde_json::Value {
        match self {
            Value::String(s) => json!(s),
            Value::Integer(i) => json!(i),
            Value::Boolean(b) => json!(b),
            Value::Tag(tag) => json!({ "key": tag.key, "value": tag.value }),
            Value::Cidr(block) => json!(block.to_string()),
            Value::List(items) => serde_json::Value::Array(
                items
                    .iter()
                    .map(|v| v.render(refs, defer_references))
                    .collect(),
            ),
            Value::Reference(id) => match refs.value(*id) {
                Some(value) if !defer_references => value.render(refs, false),
                _ => serde_json::Value::Null,
            },
        }
    }

    /// Checkpoint form; references keep their path next to any known value
    pub fn to_document(&self, refs: &RefArena) -> serde_json::Value {
        match self {
            Value::List(items) => {
                serde_json::Value::Array(items.iter().map(|v| v.to_document(refs)).collect())
            }
            Value::Reference(id) => json!({
                "ref": refs.path(*id),
                "value": refs
                    .value(*id)
                    .map(|v| v.to_document(refs))
                    .unwrap_or(serde_json::Value::Null),
            }),
            other => other.render(refs, false),
        }
    }

    /// Rebuild a value from its checkpoint form, re-chaining references.
    ///
    /// Returns `None` for JSON `null`, i.e. an unset attribute.
    pub fn from_document(document: &serde_json::Value, refs: &mut RefArena) -> Result<Option<Value>> {
        let value = match document {
            serde_json::Value::Null => return Ok(None),
            serde_json::Value::String(s) => Value::String(s.clone()),
            serde_json::Value::Bool(b) => Value::Boolean(*b),
            serde_json::Value::Number(n) => Value::Integer(n.as_i64().ok_or_else(|| {
                DefinitionError::InvalidDocument(format!("Only integers are supported: {}", n))
            })?),
            serde_json::Value::Array(items) => {
                let mut values = Vec::with_capacity(items.len());
                for item in items {
                    let value = Value::from_document(item, refs)?.ok_or_else(|| {
                        DefinitionError::InvalidDocument("null inside a list".to_string())
                    })?;
                    values.push(value);
                }
                Value::List(values)
            }
            serde_json::Value::Object(map) => {
                if let Some(path) = map.get("ref") {
                    let segments: Vec<String> = serde_json::from_value(path.clone())
                        .map_err(|e| DefinitionError::InvalidDocument(e.to_string()))?;
                    if segments.is_empty() {
                        return Err(DefinitionError::InvalidDocument(
                            "empty reference path".to_string(),
                        ));
                    }
                    let id = refs.chain_path(segments.as_slice());
                    let recorded = match map.get("value") {
                        Some(v) => Value::from_document(v, refs)?,
                        None => None,
                    };
                    if let Some(recorded) = recorded {
                        if !refs.is_resolved(id) {
                            refs.resolve(id, recorded)?;
                        }
                    }
                    Value::Reference(id)
                } else {
                    let tag: Tag = serde_json::from_value(document.clone())
                        .map_err(|e| DefinitionError::InvalidDocument(e.to_string()))?;
                    Value::Tag(tag)
                }
            }
        };
        Ok(Some(value))
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::String(s) => write!(f, "{}", s),
            Value::Integer(i) => write!(f, "{}", i),
            Value::Boolean(b) => write!(f, "{}", b),
            Value::Tag(tag) => write!(f, "{}", tag),
            Value::Cidr(block) => write!(f, "{}", block),
            Value::List(items) => {
                write!(f, "[")?;
                for (i, item) in items.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{}", item)?;
                }
                write!(f, "]")
            }
            Value::Reference(id) => write!(f, "{}", id),
        }
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Value::String(s.to_string())
    }
}

impl From<String> for Value {
    fn from(s: String) -> Self {
        Value::String(s)
    }
}

impl From<i64> for Value {
    fn from(i: i64) -> Self {
        Value::Integer(i)
    }
}

impl From<bool> for Value {
    fn from(b: bool) -> Self {
        Value::Boolean(b)
    }
}

impl From<Tag> for Value {
    fn from(tag: Tag) -> Self {
        Value::Tag(tag)
    }
}

impl From<CidrBlock> for Value {
    fn from(block: CidrBlock) -> Self {
        Value::Cidr(block)
    }
}

impl From<RefId> for Value {
    fn from(id: RefId) -> Self {
        Value::Reference(id)
    }
}

impl<T: Into<Value>> From<Vec<T>> for Value {
    fn from(items: Vec<T>) -> Self {
        Value::List(items.into_iter().map(Into::into).collect())
    }
}
