//! Pre-flight validation of a composed tree

use crate::error::Result;
use crate::tree::DefinitionTree;

pub trait Validator {
    fn validate(&self, tree: &DefinitionTree) -> Result<()>;
}

/// Every resource satisfies its schema (tags, required attributes, invariants)
#[derive(Debug, Default, Clone, Copy)]
pub struct SchemaValidator;

impl Validator for SchemaValidator {
    fn validate(&self, tree: &DefinitionTree) -> Result<()> {
        tree.resources().try_for_each(|resource| resource.validate())
    }
}

/// Every reference leaf points at exactly one node in the tree
#[derive(Debug, Default, Clone, Copy)]
pub struct ReferenceValidator;

impl Validator for ReferenceValidator {
    fn validate(&self, tree: &DefinitionTree) -> Result<()> {
        for leaf in tree.refs().leaves() {
            tree.target(leaf)?;
        }
        Ok(())
    }
}

/// The validators every run starts with
pub fn default_validators() -> Vec<Box<dyn Validator + Send + Sync>> {
    vec![Box::new(SchemaValidator), Box::new(ReferenceValidator)]
}
