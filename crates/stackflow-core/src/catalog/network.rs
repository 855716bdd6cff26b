//! Virtual network

use super::checks;
use crate::schema::{AttributeSpec, ResourceSchema, predicates, transformers};
use crate::value::Value;
use std::sync::LazyLock;

pub const KIND: &str = "network";

const TENANCIES: &[&str] = &["default", "dedicated"];

fn tenancy(value: &Value) -> bool {
    checks::one_of(value, TENANCIES)
}

static SCHEMA: LazyLock<ResourceSchema> = LazyLock::new(|| {
    ResourceSchema::builder(KIND)
        .attribute(
            AttributeSpec::new("tenancy")
                .validator(tenancy)
                .default_value(|| Value::from("default")),
        )
        .attribute(
            AttributeSpec::new("cidr_block")
                .validator(predicates::is_cidr_like)
                .transformer(transformers::cidr_block)
                .immutable(),
        )
        .attribute(
            AttributeSpec::new("dns_support")
                .validator(predicates::is_bool)
                .default_value(|| Value::from(true))
                .immutable(),
        )
        .attribute(
            AttributeSpec::new("dns_hostnames")
                .validator(predicates::is_bool)
                .default_value(|| Value::from(false))
                .immutable(),
        )
        .build()
});

pub fn schema() -> &'static ResourceSchema {
    &SCHEMA
}
