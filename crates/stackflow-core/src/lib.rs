//! StackFlow core
//!
//! The resource model of the provisioning engine: schema-typed resource
//! nodes, values, the reference arena, the definition tree that resolves
//! references, and the validators and sorter that prepare a tree for a run.

pub mod catalog;
pub mod error;
pub mod node;
pub mod reference;
pub mod schema;
pub mod sort;
#[cfg(test)]
mod testing;
pub mod tree;
pub mod validate;
pub mod value;
pub mod view;

pub use catalog::Catalog;
pub use error::{DefinitionError, Result};
pub use node::{AccessPath, NodeAddress, NodeMetadata, OwnedRef, OwnedReference, ResourceNode};
pub use reference::{RefArena, RefId, Resolution};
pub use schema::{AttributeSpec, CollectionSpec, Property, ResourceSchema};
pub use sort::{Sorter, TopologicalSorter};
pub use tree::DefinitionTree;
pub use validate::{ReferenceValidator, SchemaValidator, Validator, default_validators};
pub use value::{CidrBlock, Tag, Value};
pub use view::{KnownCollection, RenderMode, ResourceView};
