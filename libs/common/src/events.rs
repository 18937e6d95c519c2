//! Generation event stream protocol
//!
//! Each Server-Sent Event carries one `data:` payload: either a JSON encoded
//! [`StreamEvent`] or the literal [`DONE_SENTINEL`] that terminates a
//! successful stream.

use serde::{Deserialize, Serialize};

use crate::{error::ProtocolError, models::GeneratedCode};

/// Payload of the final frame of a successful stream
pub const DONE_SENTINEL: &str = "[DONE]";

/// Structured event sent by the gateway
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum StreamEvent {
    /// One upstream text fragment, in receipt order
    Chunk { content: String },
    /// The authoritative full response and the extracted code
    Complete { content: String, code: GeneratedCode },
    /// Terminal failure after the stream was opened
    Error { error: String },
}

/// One decoded `data:` payload
#[derive(Debug, Clone, PartialEq)]
pub enum StreamFrame {
    Event(StreamEvent),
    Done,
}

impl StreamFrame {
    /// Decode a single `data:` payload
    pub fn parse(payload: &str) -> Result<Self, ProtocolError> {
        let payload = payload.trim();
        if payload == DONE_SENTINEL {
            return Ok(StreamFrame::Done);
        }
        Ok(StreamFrame::Event(serde_json::from_str(payload)?))
    }

    /// Encode as a `data:` payload
    pub fn to_payload(&self) -> String {
        match self {
            StreamFrame::Done => DONE_SENTINEL.to_string(),
            // Serializing a plain enum of strings cannot fail
            StreamFrame::Event(event) => serde_json::to_string(event).unwrap_or_default(),
        }
    }
}

impl From<StreamEvent> for StreamFrame {
    fn from(event: StreamEvent) -> Self {
        StreamFrame::Event(event)
    }
}
