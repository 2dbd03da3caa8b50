//! Error types for staticroutebfdd.
//!
//! The taxonomy follows three buckets: malformed input (logged, the event is
//! dropped, no partial state mutation), missing dependency (not an error,
//! handled via the pending queue), and referential inconsistency (silently
//! ignored). Only the first bucket surfaces as `Err` from the handlers.

use thiserror::Error;

/// Result type alias for staticroutebfdd operations.
pub type RouteBfdResult<T> = Result<T, RouteBfdError>;

/// Errors that can occur while processing table events.
#[derive(Debug, Error)]
pub enum RouteBfdError {
    /// Table key could not be parsed.
    #[error("invalid table key '{key}': {message}")]
    InvalidKey {
        /// The offending key.
        key: String,
        /// What was wrong with it.
        message: String,
    },

    /// A field failed validation.
    #[error("invalid configuration for {field}: {message}")]
    InvalidConfig {
        /// The field that failed validation.
        field: String,
        /// Error message.
        message: String,
    },

    /// IP address or prefix parsing failed.
    #[error(transparent)]
    Parse(#[from] sonic_types::ParseError),

    /// Internal error (unexpected state).
    #[error("internal error: {message}")]
    Internal {
        /// Error message.
        message: String,
    },
}

impl RouteBfdError {
    /// Creates an invalid key error.
    pub fn invalid_key(key: impl Into<String>, message: impl Into<String>) -> Self {
        Self::InvalidKey {
            key: key.into(),
            message: message.into(),
        }
    }

    /// Creates an invalid configuration error.
    pub fn invalid_config(field: impl Into<String>, message: impl Into<String>) -> Self {
        Self::InvalidConfig {
            field: field.into(),
            message: message.into(),
        }
    }

    /// Creates an internal error.
    pub fn internal(message: impl Into<String>) -> Self {
        Self::Internal {
            message: message.into(),
        }
    }
}
