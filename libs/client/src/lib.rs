//! Client for the generation gateway
//!
//! [`GatewayClient`] wraps the HTTP API. A generation turn opens an event
//! stream with [`GatewayClient::stream_generation`] and feeds its frames into
//! a [`Conversation`] with [`drive`] (or [`drive_until`] to allow stopping);
//! [`GatewayClient::generate`] does both
//! and saves the session once the stream finishes.

pub mod client;
pub mod conversation;
pub mod error;
pub mod models;
pub mod stream;

pub use client::GatewayClient;
pub use conversation::{CONNECTION_ERROR_MESSAGE, Conversation, Flow};
pub use error::{ClientError, ClientResult};
pub use models::{Account, SessionRecord, SessionUpdate};
pub use stream::{DriveOutcome, GenerationStream, drive, drive_until};
