//! Client error types

use common::ProtocolError;
use thiserror::Error;

/// Gateway client failures
#[derive(Error, Debug)]
pub enum ClientError {
    #[error("Prompt is required")]
    EmptyPrompt,

    #[error("A generation is already in progress")]
    Busy,

    #[error("Not logged in")]
    NotAuthenticated,

    /// Non-2xx response; `message` is the gateway's `error` field when present
    #[error("Gateway returned {status}: {message}")]
    Api { status: u16, message: String },

    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Stream transport failed: {0}")]
    Transport(String),

    #[error(transparent)]
    Protocol(#[from] ProtocolError),
}

/// Type alias for client results
pub type ClientResult<T> = Result<T, ClientError>;
