//! Configuration error types.

use std::path::PathBuf;
use thiserror::Error;

/// Configuration-related errors
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("IO error when reading `{0}`")]
    Io(PathBuf, #[source] std::io::Error),

    #[error("Config file `{0}` is not valid JSON")]
    Json(PathBuf, #[source] serde_json::Error),

    #[error("Config file `{0}` is not valid TOML")]
    Toml(PathBuf, #[source] toml::de::Error),

    #[error("Config file `{0}` not found")]
    MissingConfig(PathBuf),

    #[error("Markdown file `{0}` not found")]
    MissingInput(PathBuf),

    #[error("`{0}` is not a file")]
    NotAFile(PathBuf),
}
