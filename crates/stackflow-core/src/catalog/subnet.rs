//! Subnet inside a network

use crate::schema::{AttributeSpec, ResourceSchema, predicates, transformers};
use crate::value::Value;
use std::sync::LazyLock;

pub const KIND: &str = "subnet";

static SCHEMA: LazyLock<ResourceSchema> = LazyLock::new(|| {
    ResourceSchema::builder(KIND)
        .attribute(
            AttributeSpec::new("cidr_block")
                .validator(predicates::is_cidr_like)
                .transformer(transformers::cidr_block)
                .immutable(),
        )
        .attribute(
            AttributeSpec::new("availability_zone")
                .validator(predicates::is_string_or_ref)
                .immutable(),
        )
        // Public IPs assigned on launch
        .attribute(
            AttributeSpec::new("public_ip")
                .validator(predicates::is_bool)
                .default_value(|| Value::from(false))
                .mutable(),
        )
        .attribute(
            AttributeSpec::new("network")
                .validator(predicates::is_string_or_ref)
                .immutable(),
        )
        .attribute(
            AttributeSpec::new("route_table")
                .validator(predicates::is_string_or_ref)
                .optional()
                .mutable(),
        )
        .build()
});

pub fn schema() -> &'static ResourceSchema {
    &SCHEMA
}
