pub mod config;
pub mod plan;
pub mod validate;

use anyhow::Context;
use stackflow_core::{Catalog, DefinitionTree};
use std::path::Path;

/// Read a definition document; `.yaml`/`.yml` files are parsed as YAML, anything else as JSON
pub fn load_definition(path: &Path) -> anyhow::Result<DefinitionTree> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read {}", path.display()))?;

    let is_yaml = path
        .extension()
        .and_then(|ext| ext.to_str())
        .is_some_and(|ext| matches!(ext, "yaml" | "yml"));
    let document: serde_json::Value = if is_yaml {
        serde_yaml::from_str(&content)
            .with_context(|| format!("Failed to parse {}", path.display()))?
    } else {
        serde_json::from_str(&content)
            .with_context(|| format!("Failed to parse {}", path.display()))?
    };

    let tree = DefinitionTree::from_document(&document, &Catalog::standard())?;
    tracing::debug!("Loaded {} with {} resource(s)", tree.name(), tree.names().len());
    Ok(tree)
}
