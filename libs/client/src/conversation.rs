//! Client-side conversation state
//!
//! A submission optimistically appends the user's message and an empty
//! assistant message. Stream frames then rewrite that in-flight message:
//! `chunk` fragments accumulate locally, `complete` overwrites the content
//! with the authoritative full response and stores the extracted code.

use common::{ChatMessage, GeneratedCode, StreamEvent, StreamFrame};
use tracing::debug;

use crate::{
    error::{ClientError, ClientResult},
    models::{SessionRecord, SessionUpdate},
};

/// Shown when the stream transport fails before a terminal frame
pub const CONNECTION_ERROR_MESSAGE: &str =
    "Connection error occurred. Please check your internet connection and try again.";

/// Whether more frames are expected
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Flow {
    Continue,
    Finished,
}

/// One conversation as the client sees it
#[derive(Debug, Clone, Default)]
pub struct Conversation {
    pub session_id: String,
    pub messages: Vec<ChatMessage>,
    pub generated_code: Option<GeneratedCode>,
    /// Index of the in-flight assistant message
    in_flight: Option<usize>,
    buffer: String,
}

impl Conversation {
    pub fn new(session_id: impl Into<String>) -> Self {
        Self {
            session_id: session_id.into(),
            ..Self::default()
        }
    }

    /// Resume a stored session
    pub fn from_session(session: SessionRecord) -> Self {
        Self {
            session_id: session.id,
            messages: session.chat_history,
            generated_code: session.generated_code,
            ..Self::default()
        }
    }

    pub fn is_generating(&self) -> bool {
        self.in_flight.is_some()
    }

    /// Start a generation for `prompt`; the stored user message is trimmed
    pub fn begin(&mut self, prompt: &str) -> ClientResult<()> {
        let prompt = prompt.trim();
        if prompt.is_empty() {
            return Err(ClientError::EmptyPrompt);
        }
        if self.is_generating() {
            return Err(ClientError::Busy);
        }

        self.messages.push(ChatMessage::user(prompt).stamped());
        self.messages.push(ChatMessage::assistant("").stamped());
        self.in_flight = Some(self.messages.len() - 1);
        self.buffer.clear();
        Ok(())
    }

    /// Apply one stream frame
    pub fn apply(&mut self, frame: StreamFrame) -> Flow {
        if !self.is_generating() {
            debug!("Ignoring frame for idle conversation {}", self.session_id);
            return Flow::Finished;
        }

        match frame {
            StreamFrame::Event(StreamEvent::Chunk { content }) => {
                self.buffer.push_str(&content);
                let text = self.buffer.clone();
                self.set_in_flight(text);
                Flow::Continue
            }
            StreamFrame::Event(StreamEvent::Complete { content, code }) => {
                self.buffer = content.clone();
                self.set_in_flight(content);
                self.generated_code = Some(code);
                Flow::Continue
            }
            StreamFrame::Event(StreamEvent::Error { error }) => {
                self.set_in_flight(format!("Error: {}", error));
                self.finish();
                Flow::Finished
            }
            StreamFrame::Done => {
                self.finish();
                Flow::Finished
            }
        }
    }

    /// End the generation with a visible error message
    pub fn fail(&mut self, message: &str) {
        if self.is_generating() {
            self.set_in_flight(message.to_string());
            self.finish();
        }
    }

    /// Shown when the stream could not be opened
    pub fn fail_to_start(&mut self, error: &ClientError) {
        let reason = match error {
            ClientError::Api { message, .. } => message.clone(),
            other => other.to_string(),
        };
        self.fail(&format!("Failed to start generation: {}. Please try again.", reason));
    }

    /// Stop locally; the partial response is kept
    pub fn cancel(&mut self) {
        self.finish();
    }

    /// The call that persists this conversation
    pub fn update_request(&self) -> SessionUpdate {
        SessionUpdate {
            chat_history: Some(self.messages.clone()),
            generated_code: self.generated_code.clone(),
            ..SessionUpdate::default()
        }
    }

    /// Content of the last message, if any
    pub fn last_message(&self) -> Option<&str> {
        self.messages.last().map(|message| message.content.as_str())
    }

    fn set_in_flight(&mut self, content: String) {
        if let Some(message) = self.in_flight.and_then(|index| self.messages.get_mut(index)) {
            message.content = content;
        }
    }

    fn finish(&mut self) {
        self.in_flight = None;
        self.buffer.clear();
    }
}
