//! Errors raised while reading or checking `oracle.toml`.

use std::path::PathBuf;
use thiserror::Error;

/// Why the console configuration could not be used.
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("could not read console config: {0}")]
    Io(#[from] std::io::Error),

    #[error("console config {0} does not exist (run `oracle config init` to create one)")]
    NotFound(PathBuf),

    #[error("oracle.toml is not valid TOML: {0}")]
    Parse(String),

    /// A setting parsed but cannot be used, e.g. a non-http `server.base_url`
    #[error("bad setting {field} in oracle.toml: {message}")]
    Validation { field: String, message: String },
}
