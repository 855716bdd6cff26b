use std::path::PathBuf;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Configuration directory not found")]
    ConfigDirNotFound,

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Failed to parse {}: {message}", path.display())]
    Parse { path: PathBuf, message: String },
}

pub type Result<T> = std::result::Result<T, ConfigError>;
