//! Elastic network interface

use crate::schema::{AttributeSpec, ResourceSchema, predicates, transformers};
use crate::value::Value;
use std::sync::LazyLock;

pub const KIND: &str = "network_interface";

static SCHEMA: LazyLock<ResourceSchema> = LazyLock::new(|| {
    ResourceSchema::builder(KIND)
        .attribute(AttributeSpec::new("description").validator(predicates::is_string))
        .attribute(
            AttributeSpec::new("security_groups")
                .validator(predicates::is_string_or_ref_list)
                .mutable(),
        )
        .attribute(
            AttributeSpec::new("ipv6_addresses")
                .validator(predicates::is_string_list)
                .default_value(|| Value::List(Vec::new())),
        )
        .attribute(
            AttributeSpec::new("private_ip_address")
                .validator(predicates::is_cidr_like)
                .transformer(transformers::cidr_block)
                .optional(),
        )
        .attribute(
            AttributeSpec::new("private_ip_addresses")
                .validator(predicates::is_cidr_list)
                .transformer(transformers::cidr_blocks)
                .optional(),
        )
        .attribute(
            AttributeSpec::new("secondary_private_ip_address_count")
                .validator(predicates::is_non_negative)
                .optional(),
        )
        .attribute(
            AttributeSpec::new("source_destination_check")
                .validator(predicates::is_bool)
                .default_value(|| Value::from(true))
                .mutable(),
        )
        .attribute(
            AttributeSpec::new("subnet")
                .validator(predicates::is_string_or_ref)
                .immutable(),
        )
        .build()
});

pub fn schema() -> &'static ResourceSchema {
    &SCHEMA
}
