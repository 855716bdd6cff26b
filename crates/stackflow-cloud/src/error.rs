//! Provisioning error types

use stackflow_config::ConfigError;
use stackflow_core::DefinitionError;
use thiserror::Error;

/// Errors raised while provisioning a definition tree
#[derive(Error, Debug)]
pub enum CloudError {
    #[error(transparent)]
    Definition(#[from] DefinitionError),

    #[error("Ambiguous reconciliation for {resource}: {matches} remote resources match")]
    AmbiguousReconciliation { resource: String, matches: usize },

    #[error("Ambiguous diff target for {resource}: {matches} remote resources match")]
    AmbiguousDiffTarget { resource: String, matches: usize },

    #[error("Replacement required for {resource}: immutable attribute '{attribute}' changed")]
    ReplacementRequired { resource: String, attribute: String },

    #[error("Backend failure during {operation} of {resource}: {message}")]
    BackendFailure {
        operation: String,
        resource: String,
        message: String,
    },

    #[error("Run did not converge after {passes} passes; pending work for: {}", pending.join(", "))]
    Unconverged { passes: usize, pending: Vec<String> },

    #[error("Resource not found: {0}")]
    ResourceNotFound(String),

    #[error("Resource already exists: {0}")]
    ResourceAlreadyExists(String),

    #[error("Resource is incomplete: {0}")]
    IncompleteResource(String),

    #[error("Invalid modification: {0}")]
    InvalidModification(String),

    #[error("State file error: {0}")]
    StateError(String),

    #[error("Lock acquisition failed: {0}")]
    LockError(String),

    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

pub type Result<T> = std::result::Result<T, CloudError>;

impl CloudError {
    /// Wrap an error returned by a backend call made for `resource`
    pub fn backend(
        operation: impl Into<String>,
        resource: impl Into<String>,
        error: CloudError,
    ) -> Self {
        match error {
            CloudError::BackendFailure { .. } => error,
            other => CloudError::BackendFailure {
                operation: operation.into(),
                resource: resource.into(),
                message: other.to_string(),
            },
        }
    }
}
