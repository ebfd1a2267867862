//! Error types for vaultctl

use thiserror::Error;
use vault_engine::ConfigError;
use vault_types::VaultError;

/// Result type for CLI operations
pub type CliResult<T> = Result<T, CliError>;

/// CLI errors
#[derive(Debug, Error)]
pub enum CliError {
    #[error("configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("cannot read scenario {path}: {source}")]
    Read {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("invalid scenario: {0}")]
    Parse(#[from] serde_yaml::Error),

    #[error("step {index} ({op}) failed: {source}")]
    Step {
        index: usize,
        op: &'static str,
        #[source]
        source: VaultError,
    },

    #[error("step {index} ({op}): {message}")]
    Expectation {
        index: usize,
        op: &'static str,
        message: String,
    },

    #[error("settlement error: {0}")]
    Settlement(String),

    #[error("output error: {0}")]
    Output(String),
}
