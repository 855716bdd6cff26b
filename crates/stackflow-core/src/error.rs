//! Definition error types

use thiserror::Error;

/// Errors raised while composing, validating or ordering a definition tree
#[derive(Error, Debug, Clone, PartialEq)]
pub enum DefinitionError {
    #[error("Schema violation: {0}")]
    SchemaViolation(String),

    #[error("Unknown attribute '{attribute}' for {kind}")]
    UnknownAttribute { kind: String, attribute: String },

    #[error("Resource not found: {0}")]
    UnknownResource(String),

    #[error("Unknown resource type: {0}")]
    UnknownResourceType(String),

    #[error("Dangling reference: {0}")]
    DanglingReference(String),

    #[error("Ambiguous reference {reference}: matched {}", matches.join(", "))]
    AmbiguousReference {
        reference: String,
        matches: Vec<String>,
    },

    #[error("Not a DAG. Cycle detected at: {0}")]
    CycleDetected(String),

    #[error("Reference {reference} held by {holder} belongs to another tree")]
    ForeignReference { holder: String, reference: String },

    #[error("Reference already resolved: {0}")]
    ReferenceAlreadyResolved(String),

    #[error("Invalid document: {0}")]
    InvalidDocument(String),
}

impl DefinitionError {
    pub(crate) fn schema(message: impl Into<String>) -> Self {
        DefinitionError::SchemaViolation(message.into())
    }
}

pub type Result<T> = std::result::Result<T, DefinitionError>;
