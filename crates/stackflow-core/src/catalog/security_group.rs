//! Security groups and their ingress / egress rules
//!
//! Rules live in Mutable collections, so rules of two groups may reference
//! each other's identity; they are attached once both groups exist.

use super::checks;
use crate::node::ResourceNode;
use crate::schema::{AttributeSpec, CollectionSpec, ResourceSchema, predicates, transformers};
use crate::value::Value;
use std::sync::LazyLock;

pub const KIND: &str = "security_group";
pub const INGRESS_RULE: &str = "ingress_rule";
pub const EGRESS_RULE: &str = "egress_rule";

const PROTOCOLS: &[&str] = &["tcp", "all"];
const MAX_PORT: i64 = 1 << 16;

fn protocol(value: &Value) -> bool {
    checks::one_of(value, PROTOCOLS)
}

fn upper_port(value: &Value) -> bool {
    matches!(value, Value::Integer(port) if *port <= MAX_PORT)
}

fn has_source(rule: &ResourceNode) -> Result<(), String> {
    let defined = |keyword: &str| matches!(rule.get(keyword), Ok(Some(_)));
    if defined("cidr_blocks") || defined("security_groups") {
        Ok(())
    } else {
        Err("Either security groups or CIDR blocks must be defined".to_string())
    }
}

fn rule_schema(kind: &'static str) -> ResourceSchema {
    ResourceSchema::builder(kind)
        .untagged()
        .attribute(
            AttributeSpec::new("cidr_blocks")
                .validator(predicates::is_cidr_list)
                .transformer(transformers::cidr_blocks)
                .optional()
                .mutable(),
        )
        .attribute(
            AttributeSpec::new("protocol")
                .validator(protocol)
                .default_value(|| Value::from("all"))
                .mutable(),
        )
        .attribute(
            AttributeSpec::new("from")
                .validator(predicates::is_non_negative)
                .default_value(|| Value::from(0i64))
                .mutable(),
        )
        .attribute(
            AttributeSpec::new("to")
                .validator(upper_port)
                .default_value(|| Value::from(MAX_PORT))
                .mutable(),
        )
        .attribute(
            AttributeSpec::new("security_groups")
                .validator(predicates::is_string_or_ref_list)
                .optional()
                .mutable(),
        )
        .invariant(has_source)
        .build()
}

static INGRESS: LazyLock<ResourceSchema> = LazyLock::new(|| rule_schema(INGRESS_RULE));
static EGRESS: LazyLock<ResourceSchema> = LazyLock::new(|| rule_schema(EGRESS_RULE));

static SCHEMA: LazyLock<ResourceSchema> = LazyLock::new(|| {
    ResourceSchema::builder(KIND)
        .attribute(
            AttributeSpec::new("network")
                .validator(predicates::is_string_or_ref)
                .immutable(),
        )
        .attribute(AttributeSpec::new("description").validator(predicates::is_string))
        .collection(CollectionSpec::new("ingress", ingress_rule).optional().mutable())
        .collection(CollectionSpec::new("egress", egress_rule).optional().mutable())
        .build()
});

pub fn schema() -> &'static ResourceSchema {
    &SCHEMA
}

pub fn ingress_rule() -> &'static ResourceSchema {
    &INGRESS
}

pub fn egress_rule() -> &'static ResourceSchema {
    &EGRESS
}
