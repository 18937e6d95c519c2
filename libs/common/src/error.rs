//! Custom error types for the common library
//!
//! This module defines the errors raised by storage backends and by the
//! event stream codec.

use thiserror::Error;

/// Custom error type for store operations
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum StoreError {
    /// A record with the same unique key already exists
    #[error("{0} already exists")]
    Conflict(String),

    /// The requested record does not exist
    #[error("{0} not found")]
    NotFound(String),

    /// The backing store failed
    #[error("Store backend error: {0}")]
    Backend(String),
}

/// Type alias for Result with StoreError
pub type StoreResult<T> = Result<T, StoreError>;

/// Error raised while decoding an event stream payload
#[derive(Error, Debug)]
pub enum ProtocolError {
    /// The payload is not a known stream event
    #[error("Malformed stream event: {0}")]
    MalformedEvent(#[from] serde_json::Error),
}
