//! Common library shared by the generation gateway and its client
//!
//! This crate holds the wire protocol spoken over the generation event
//! stream, the chat data model exchanged by the session endpoints, an
//! incremental Server-Sent Events decoder, and the storage error type used
//! by the swappable store interfaces.

pub mod error;
pub mod events;
pub mod models;
pub mod sse;

pub use error::{ProtocolError, StoreError, StoreResult};
pub use events::{DONE_SENTINEL, StreamEvent, StreamFrame};
pub use models::{ChatMessage, GeneratedCode, Role};
pub use sse::SseDecoder;

/// Example of decoding a generation stream
///
/// ```rust
/// use common::{SseDecoder, StreamEvent, StreamFrame};
///
/// let mut decoder = SseDecoder::default();
/// let payloads = decoder.feed(b"data: {\"type\":\"chunk\",\"content\":\"Hi\"}\n\ndata: [DONE]\n\n");
///
/// let frames: Vec<StreamFrame> = payloads
///     .iter()
///     .map(|payload| StreamFrame::parse(payload).unwrap())
///     .collect();
///
/// assert_eq!(
///     frames[0],
///     StreamFrame::Event(StreamEvent::Chunk { content: "Hi".into() })
/// );
/// assert_eq!(frames[1], StreamFrame::Done);
/// ```
pub fn example_usage() {}
