// ABOUTME: Error types for session identity resolution
// Raised before any connection attempt when target coordinates are incomplete

use thiserror::Error;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum IdentityError {
    #[error("missing required field '{0}'")]
    MissingField(&'static str),

    #[error("namespace is required for shell sessions")]
    MissingNamespace,

    #[error("invalid value for '{field}': {value:?}")]
    InvalidValue { field: &'static str, value: String },

    #[error("invalid page address: {0}")]
    InvalidAddress(String),
}
