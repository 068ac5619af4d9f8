use std::path::PathBuf;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to parse config: {0}")]
    Yaml(#[from] yaml_rust::ScanError),
    #[error("config field `{field}` {reason}")]
    InvalidField { field: &'static str, reason: String },
    #[error("invalid configuration: {0}")]
    Invalid(String),
}
