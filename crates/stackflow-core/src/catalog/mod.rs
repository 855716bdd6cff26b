//! Standard resource types
//!
//! Each module declares one resource type as a static schema table. The
//! [`Catalog`] maps the `class` discriminator of a document back to its
//! schema.

pub mod instance;
pub mod internet_gateway;
pub mod network;
pub mod network_interface;
pub mod route_table;
pub mod security_group;
pub mod subnet;

use crate::error::{DefinitionError, Result};
use crate::schema::ResourceSchema;
use indexmap::IndexMap;

/// Registry of resource schemas keyed by kind
#[derive(Debug, Clone, Default)]
pub struct Catalog {
    schemas: IndexMap<&'static str, &'static ResourceSchema>,
}

impl Catalog {
    pub fn new() -> Self {
        Self::default()
    }

    /// Every built-in resource type
    pub fn standard() -> Self {
        let mut catalog = Self::new();
        for schema in [
            network::schema(),
            subnet::schema(),
            security_group::schema(),
            instance::schema(),
            route_table::schema(),
            internet_gateway::schema(),
            network_interface::schema(),
        ] {
            catalog.register(schema);
        }
        catalog
    }

    /// Register a schema and, recursively, the schemas of its collections
    pub fn register(&mut self, schema: &'static ResourceSchema) {
        if self.schemas.contains_key(schema.kind()) {
            return;
        }
        self.schemas.insert(schema.kind(), schema);
        for collection in schema.collections() {
            self.register(collection.schema());
        }
    }

    pub fn get(&self, kind: &str) -> Result<&'static ResourceSchema> {
        self.schemas
            .get(kind)
            .copied()
            .ok_or_else(|| DefinitionError::UnknownResourceType(kind.to_string()))
    }

    pub fn kinds(&self) -> impl Iterator<Item = &'static str> + '_ {
        self.schemas.keys().copied()
    }
}

/// Validators shared by several resource types
pub(crate) mod checks {
    use crate::value::Value;

    pub fn one_of(value: &Value, allowed: &[&str]) -> bool {
        value.as_str().is_some_and(|s| allowed.contains(&s))
    }

    /// Device mappings are named after the device they attach to
    pub fn device_name(name: &str) -> Result<(), String> {
        if name.starts_with("/dev/sd") {
            Ok(())
        } else {
            Err(format!("Name must be of the form /dev/sd?: {}", name))
        }
    }
}
