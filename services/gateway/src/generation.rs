//! Generation gateway: relays an upstream completion as a stream of events
//!
//! A request moves through `AUTHENTICATING -> STREAMING -> COMPLETING |
//! ERRORING -> CLOSED`. Authentication happens in the route before any
//! channel exists; everything here runs after the stream is open, so every
//! failure becomes an `error` event instead of an HTTP status.

use common::{GeneratedCode, StreamEvent, StreamFrame};
use futures::StreamExt;
use std::sync::Arc;
use tokio::sync::mpsc;
use tracing::{debug, error, info, warn};
use uuid::Uuid;

use crate::{
    extract::extract_code,
    llm::{CompletionProvider, CompletionRequest},
    prompt::build_messages,
    repositories::SessionRepository,
};

/// Frames buffered between the relay task and the HTTP body
const CHANNEL_CAPACITY: usize = 64;

/// How a relay ended
#[derive(Debug, Clone, PartialEq)]
pub enum RelayOutcome {
    /// `complete` and `[DONE]` were sent
    Completed { chunks: usize, code: GeneratedCode },
    /// An `error` event was sent
    Failed(String),
    /// The client went away; the upstream stream was dropped
    Disconnected,
}

/// Generation gateway
#[derive(Clone)]
pub struct GenerationGateway {
    provider: Arc<dyn CompletionProvider>,
    sessions: Arc<dyn SessionRepository>,
    temperature: f32,
    max_tokens: u32,
}

impl GenerationGateway {
    pub fn new(
        provider: Arc<dyn CompletionProvider>,
        sessions: Arc<dyn SessionRepository>,
        temperature: f32,
        max_tokens: u32,
    ) -> Self {
        Self {
            provider,
            sessions,
            temperature,
            max_tokens,
        }
    }

    /// Spawn a relay for an authenticated request and return its frames
    pub fn start(&self, session_id: String, user_id: Uuid, prompt: String) -> mpsc::Receiver<StreamFrame> {
        let (tx, rx) = mpsc::channel(CHANNEL_CAPACITY);
        let gateway = self.clone();

        tokio::spawn(async move {
            let outcome = gateway.relay(&session_id, user_id, &prompt, tx).await;
            match outcome {
                RelayOutcome::Completed { chunks, code } => info!(
                    session_id = %session_id,
                    chunks,
                    tsx_len = code.tsx.len(),
                    css_len = code.css.len(),
                    "Generation completed"
                ),
                RelayOutcome::Failed(message) => {
                    warn!(session_id = %session_id, "Generation failed: {}", message)
                }
                RelayOutcome::Disconnected => {
                    info!(session_id = %session_id, "Client disconnected, upstream released")
                }
            }
        });

        rx
    }

    /// Run one generation, writing frames into `tx`
    ///
    /// Upstream fragments are forwarded one by one in receipt order. Every
    /// upstream poll races the channel's closure, so a client that goes away
    /// stops the relay and drops the upstream stream.
    pub async fn relay(
        &self,
        session_id: &str,
        user_id: Uuid,
        prompt: &str,
        tx: mpsc::Sender<StreamFrame>,
    ) -> RelayOutcome {
        info!(session_id = %session_id, user_id = %user_id, prompt_len = prompt.len(), "Starting generation");

        let session = match self.sessions.get_or_create(session_id, user_id).await {
            Ok(session) => session,
            Err(e) => return fail(&tx, e.to_string()).await,
        };

        let request = CompletionRequest {
            messages: build_messages(&session, prompt),
            temperature: self.temperature,
            max_tokens: self.max_tokens,
        };

        let started = tokio::select! {
            _ = tx.closed() => return RelayOutcome::Disconnected,
            started = self.provider.stream_completion(request) => started,
        };

        let mut upstream = match started {
            Ok(upstream) => upstream,
            Err(e) => {
                error!(session_id = %session_id, "Failed to start completion: {}", e);
                return fail(&tx, e.to_string()).await;
            }
        };

        let mut full_response = String::new();
        let mut chunks = 0usize;

        loop {
            let next = tokio::select! {
                biased;
                _ = tx.closed() => return RelayOutcome::Disconnected,
                next = upstream.next() => next,
            };

            match next {
                Some(Ok(fragment)) => {
                    chunks += 1;
                    full_response.push_str(&fragment);
                    debug!(session_id = %session_id, chunk = chunks, len = fragment.len(), "Forwarding chunk");

                    let frame = StreamEvent::Chunk { content: fragment }.into();
                    if tx.send(frame).await.is_err() {
                        return RelayOutcome::Disconnected;
                    }
                }
                Some(Err(e)) => {
                    error!(session_id = %session_id, chunks, "Upstream stream failed: {}", e);
                    return fail(&tx, e.to_string()).await;
                }
                None => break,
            }
        }
        drop(upstream);

        let code = extract_code(&full_response);
        debug!(
            session_id = %session_id,
            chunks,
            tsx_len = code.tsx.len(),
            css_len = code.css.len(),
            "Extracted code"
        );

        let complete = StreamEvent::Complete {
            content: full_response,
            code: code.clone(),
        };
        if tx.send(complete.into()).await.is_err() || tx.send(StreamFrame::Done).await.is_err() {
            return RelayOutcome::Disconnected;
        }

        RelayOutcome::Completed { chunks, code }
    }
}

async fn fail(tx: &mpsc::Sender<StreamFrame>, message: String) -> RelayOutcome {
    if tx
        .send(StreamEvent::Error { error: message.clone() }.into())
        .await
        .is_err()
    {
        return RelayOutcome::Disconnected;
    }
    RelayOutcome::Failed(message)
}
