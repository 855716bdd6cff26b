//! Route tables and their routes

use crate::node::ResourceNode;
use crate::schema::{AttributeSpec, CollectionSpec, ResourceSchema, predicates, transformers};
use std::sync::LazyLock;

pub const KIND: &str = "route_table";

const DESTINATIONS: &[&str] = &["gateway", "instance", "nat", "network_interface"];

fn single_destination(route: &ResourceNode) -> Result<(), String> {
    let set = DESTINATIONS
        .iter()
        .filter(|keyword| matches!(route.get(keyword), Ok(Some(_))))
        .count();
    if set == 1 {
        Ok(())
    } else {
        Err(format!(
            "Exactly one destination must be set: {}",
            DESTINATIONS.join("|")
        ))
    }
}

static ROUTE: LazyLock<ResourceSchema> = LazyLock::new(|| {
    let destination = |name| {
        AttributeSpec::new(name)
            .validator(predicates::is_string_or_ref)
            .optional()
            .immutable()
    };
    ResourceSchema::builder("route")
        .untagged()
        .attribute(
            AttributeSpec::new("cidr_block")
                .validator(predicates::is_cidr_like)
                .transformer(transformers::cidr_block)
                .immutable(),
        )
        .attribute(destination("gateway"))
        .attribute(destination("instance"))
        .attribute(destination("nat"))
        .attribute(destination("network_interface"))
        .invariant(single_destination)
        .build()
});

static SCHEMA: LazyLock<ResourceSchema> = LazyLock::new(|| {
    ResourceSchema::builder(KIND)
        .attribute(
            AttributeSpec::new("network")
                .validator(predicates::is_string_or_ref)
                .immutable(),
        )
        .collection(CollectionSpec::new("route", route).mutable())
        .build()
});

pub fn schema() -> &'static ResourceSchema {
    &SCHEMA
}

pub fn route() -> &'static ResourceSchema {
    &ROUTE
}
