use crate::schema::{AttributeSpec, ResourceSchema, predicates};
use std::sync::LazyLock;

pub const KIND: &str = "internet_gateway";

static SCHEMA: LazyLock<ResourceSchema> = LazyLock::new(|| {
    ResourceSchema::builder(KIND)
        .attribute(
            AttributeSpec::new("network")
                .validator(predicates::is_string_or_ref)
                .immutable(),
        )
        .build()
});

pub fn schema() -> &'static ResourceSchema {
    &SCHEMA
}
