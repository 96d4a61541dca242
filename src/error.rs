//! Error types for booru-tags

use crate::source::SourceError;
use thiserror::Error;

/// Crate-wide result type
pub type Result<T> = std::result::Result<T, Error>;

/// Errors surfaced by cache, resolution, and configuration paths
#[derive(Debug, Error)]
pub enum Error {
    /// Cache file read/append error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Record serialization error on the durable-append path
    #[error("Serialization error: {0}")]
    Serde(#[from] serde_json::Error),

    /// Missing or inconsistent engine configuration
    #[error("Configuration error: {0}")]
    Config(String),

    /// Token still unresolved after the source gave up and no default
    /// category is configured
    #[error("Tag not resolved: {0}")]
    Unresolved(String),

    /// Upstream source error
    #[error("Source error: {0}")]
    Source(#[from] SourceError),
}
