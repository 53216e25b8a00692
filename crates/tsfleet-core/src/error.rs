//! Error types shared across the tsfleet crates.

use thiserror::Error;

/// Errors surfaced by a resource store.
///
/// Only `Connection` is treated as fatal by the orchestrator (pre-flight);
/// the other kinds are recorded per item and never abort a batch.
#[derive(Debug, Error)]
pub enum StoreError {
    /// Could not reach the backing store at all.
    #[error("store connection failed: {0}")]
    Connection(String),

    /// The addressed resource does not exist.
    #[error("resource '{0}' not found")]
    NotFound(String),

    /// A resource with that name already exists (creation is not idempotent).
    #[error("resource '{0}' already exists")]
    AlreadyExists(String),

    /// A store call exceeded its caller-supplied deadline.
    #[error("store call timed out: {0}")]
    Timeout(String),

    /// Backend failure for one call; safe to continue with the next item.
    #[error("store error: {0}")]
    Backend(String),
}

impl StoreError {
    pub fn is_not_found(&self) -> bool {
        matches!(self, StoreError::NotFound(_))
    }

    pub fn is_already_exists(&self) -> bool {
        matches!(self, StoreError::AlreadyExists(_))
    }
}

/// Errors raised while loading or validating fleet configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read configuration file: {0}")]
    Io(#[from] std::io::Error),

    #[error("failed to parse configuration: {0}")]
    Yaml(#[from] serde_yaml::Error),

    #[error("invalid configuration: {0}")]
    Invalid(String),
}
