//! Compute instances and their block device mappings

use super::checks;
use crate::node::ResourceNode;
use crate::schema::{AttributeSpec, CollectionSpec, ResourceSchema, predicates};
use crate::value::Value;
use std::sync::LazyLock;

pub const KIND: &str = "instance";

const INSTANCE_TYPES: &[&str] = &[
    "t1.micro", "m1.small", "m1.medium", "m1.large", "m1.xlarge", "m3.medium", "m3.large",
    "m3.xlarge", "m3.2xlarge", "m4.large", "m4.xlarge", "m4.2xlarge", "m4.4xlarge",
    "m4.10xlarge", "t2.micro", "t2.small", "t2.medium", "t2.large", "m2.xlarge", "m2.2xlarge",
    "m2.4xlarge", "cr1.8xlarge", "i2.xlarge", "i2.2xlarge", "i2.4xlarge", "i2.8xlarge",
    "hi1.4xlarge", "hs1.8xlarge", "c1.medium", "c1.xlarge", "c3.large", "c3.xlarge",
    "c3.2xlarge", "c3.4xlarge", "c3.8xlarge", "c4.large", "c4.xlarge", "c4.2xlarge",
    "c4.4xlarge", "c4.8xlarge", "cc1.4xlarge", "cc2.8xlarge", "g2.2xlarge", "cg1.4xlarge",
    "r3.large", "r3.xlarge", "r3.2xlarge", "r3.4xlarge", "r3.8xlarge", "d2.xlarge",
    "d2.2xlarge", "d2.4xlarge", "d2.8xlarge",
];

const AVAILABILITY_ZONES: &[&str] = &[
    "ap-south-1a", "ap-south-1b", "eu-west-2a", "eu-west-2b", "eu-west-1a", "eu-west-1b",
    "eu-west-1c", "ap-northeast-2a", "ap-northeast-2c", "ap-northeast-1a", "ap-northeast-1b",
    "ap-northeast-1c", "sa-east-1a", "sa-east-1b", "sa-east-1c", "ca-central-1a",
    "ca-central-1b", "ap-southeast-1a", "ap-southeast-1b", "ap-southeast-2a", "ap-southeast-2b",
    "ap-southeast-2c", "eu-central-1a", "eu-central-1b", "us-east-1a", "us-east-1b",
    "us-east-1c", "us-east-1d", "us-east-1e", "us-east-2a", "us-east-2b", "us-east-2c",
    "us-west-1a", "us-west-1c", "us-west-2a", "us-west-2b", "us-west-2c",
];

const AFFINITIES: &[&str] = &["default", "host"];
const SHUTDOWN_BEHAVIORS: &[&str] = &["terminate", "stop"];
const TENANCIES: &[&str] = &["default", "dedicated", "host"];
const EBS_TYPES: &[&str] = &["gp2", "io1", "st1", "sc1"];

fn instance_type(value: &Value) -> bool {
    checks::one_of(value, INSTANCE_TYPES)
}

fn availability_zone(value: &Value) -> bool {
    checks::one_of(value, AVAILABILITY_ZONES)
}

fn affinity(value: &Value) -> bool {
    checks::one_of(value, AFFINITIES)
}

fn shutdown_behavior(value: &Value) -> bool {
    checks::one_of(value, SHUTDOWN_BEHAVIORS)
}

fn tenancy(value: &Value) -> bool {
    checks::one_of(value, TENANCIES)
}

fn ebs_type(value: &Value) -> bool {
    checks::one_of(value, EBS_TYPES)
}

fn ephemeral_name(value: &Value) -> bool {
    value
        .as_str()
        .and_then(|s| s.strip_prefix("ephemeral"))
        .and_then(|n| n.parse::<u8>().ok())
        .is_some_and(|n| n <= 10)
}

fn device_name(device: &ResourceNode) -> Result<(), String> {
    checks::device_name(device.name())
}

static SNAPSHOT_DEVICE: LazyLock<ResourceSchema> = LazyLock::new(|| {
    ResourceSchema::builder("snapshot_device")
        .untagged()
        .attribute(
            AttributeSpec::new("snapshot")
                .validator(predicates::is_string_or_ref)
                .immutable(),
        )
        .invariant(device_name)
        .build()
});

static EBS_DEVICE: LazyLock<ResourceSchema> = LazyLock::new(|| {
    ResourceSchema::builder("ebs_device")
        .untagged()
        .attribute(
            AttributeSpec::new("type")
                .validator(ebs_type)
                .default_value(|| Value::from("gp2"))
                .immutable(),
        )
        .attribute(
            AttributeSpec::new("size")
                .validator(predicates::is_integer)
                .immutable(),
        )
        .invariant(device_name)
        .build()
});

static EPHEMERAL_DEVICE: LazyLock<ResourceSchema> = LazyLock::new(|| {
    ResourceSchema::builder("ephemeral_device")
        .untagged()
        .attribute(
            AttributeSpec::new("virtual_name")
                .validator(ephemeral_name)
                .immutable(),
        )
        .invariant(device_name)
        .build()
});

static SCHEMA: LazyLock<ResourceSchema> = LazyLock::new(|| {
    ResourceSchema::builder(KIND)
        .attribute(
            AttributeSpec::new("affinity")
                .validator(affinity)
                .default_value(|| Value::from("default"))
                .immutable(),
        )
        .attribute(
            AttributeSpec::new("availability_zone")
                .validator(availability_zone)
                .immutable(),
        )
        .attribute(
            AttributeSpec::new("ebs_optimized")
                .validator(predicates::is_bool)
                .default_value(|| Value::from(false))
                .immutable(),
        )
        .attribute(
            AttributeSpec::new("iam_instance_profile")
                .validator(predicates::is_string_or_ref)
                .optional()
                .immutable(),
        )
        .attribute(
            AttributeSpec::new("image_id")
                .validator(predicates::is_string)
                .immutable(),
        )
        .attribute(
            AttributeSpec::new("shutdown_behavior")
                .validator(shutdown_behavior)
                .default_value(|| Value::from("terminate"))
                .immutable(),
        )
        .attribute(
            AttributeSpec::new("instance_type")
                .validator(instance_type)
                .immutable(),
        )
        .attribute(
            AttributeSpec::new("key_name")
                .validator(predicates::is_string_or_ref)
                .optional()
                .immutable(),
        )
        .attribute(
            AttributeSpec::new("monitoring")
                .validator(predicates::is_bool)
                .default_value(|| Value::from(false))
                .mutable(),
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
        .attribute(
            AttributeSpec::new("tenancy")
                .validator(tenancy)
                .default_value(|| Value::from("default"))
                .immutable(),
        )
        .attribute(
            AttributeSpec::new("userdata")
                .validator(predicates::is_string)
                .optional()
                .immutable(),
        )
        .collection(
            CollectionSpec::new("snapshot_device_mapping", snapshot_device)
                .optional()
                .immutable(),
        )
        .collection(
            CollectionSpec::new("ebs_device_mapping", ebs_device)
                .optional()
                .immutable(),
        )
        .collection(
            CollectionSpec::new("ephemeral_device_mapping", ephemeral_device)
                .optional()
                .immutable(),
        )
        .build()
});

pub fn schema() -> &'static ResourceSchema {
    &SCHEMA
}

pub fn snapshot_device() -> &'static ResourceSchema {
    &SNAPSHOT_DEVICE
}

pub fn ebs_device() -> &'static ResourceSchema {
    &EBS_DEVICE
}

pub fn ephemeral_device() -> &'static ResourceSchema {
    &EPHEMERAL_DEVICE
}
