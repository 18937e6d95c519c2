//! Generation event stream as seen by the client

use common::{SseDecoder, StreamFrame};
use futures::{
    Stream, StreamExt,
    future::{self, Either},
    stream::BoxStream,
};
use std::collections::VecDeque;
use std::fmt::Display;
use std::future::Future;
use std::pin::pin;
use tracing::{debug, warn};

use crate::{
    conversation::{CONNECTION_ERROR_MESSAGE, Conversation, Flow},
    error::ClientError,
};

/// Decoded frames of one generation request
///
/// Dropping the stream or calling [`GenerationStream::close`] closes the
/// underlying transport.
pub struct GenerationStream {
    bytes: Option<BoxStream<'static, Result<Vec<u8>, String>>>,
    decoder: SseDecoder,
    pending: VecDeque<String>,
}

impl GenerationStream {
    /// Wrap a raw byte stream carrying Server-Sent Events
    pub fn from_byte_stream<S, B, E>(bytes: S) -> Self
    where
        S: Stream<Item = Result<B, E>> + Send + 'static,
        B: AsRef<[u8]> + 'static,
        E: Display + 'static,
    {
        let bytes = bytes
            .map(|chunk| chunk.map(|b| b.as_ref().to_vec()).map_err(|e| e.to_string()))
            .boxed();

        Self {
            bytes: Some(bytes),
            decoder: SseDecoder::default(),
            pending: VecDeque::new(),
        }
    }

    /// Next decoded frame, `None` once the transport has ended
    ///
    /// Payloads that do not decode are logged and skipped.
    pub async fn next_frame(&mut self) -> Option<Result<StreamFrame, ClientError>> {
        loop {
            if let Some(payload) = self.pending.pop_front() {
                match StreamFrame::parse(&payload) {
                    Ok(frame) => return Some(Ok(frame)),
                    Err(e) => {
                        warn!("Skipping undecodable frame: {}", e);
                        continue;
                    }
                }
            }

            let bytes = self.bytes.as_mut()?;
            match bytes.next().await {
                Some(Ok(chunk)) => self.pending.extend(self.decoder.feed(&chunk)),
                Some(Err(e)) => {
                    self.bytes = None;
                    return Some(Err(ClientError::Transport(e)));
                }
                None => {
                    self.bytes = None;
                    self.pending.extend(self.decoder.finish());
                }
            }
        }
    }

    /// Close the transport; buffered frames are discarded
    pub fn close(&mut self) {
        if self.bytes.take().is_some() {
            debug!("Closing generation stream");
        }
        self.pending.clear();
    }

    pub fn is_closed(&self) -> bool {
        self.bytes.is_none() && self.pending.is_empty()
    }
}

/// How [`drive`] ended
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DriveOutcome {
    /// `[DONE]` arrived
    Completed,
    /// An `error` event arrived
    Failed,
    /// The transport failed or ended before a terminal frame
    ConnectionLost,
    /// The caller stopped the generation
    Stopped,
}

/// Apply frames to `conversation` until the generation ends
pub async fn drive(conversation: &mut Conversation, stream: &mut GenerationStream) -> DriveOutcome {
    while let Some(next) = stream.next_frame().await {
        match next {
            Ok(frame) => {
                let done = frame == StreamFrame::Done;
                if conversation.apply(frame) == Flow::Finished {
                    stream.close();
                    return if done {
                        DriveOutcome::Completed
                    } else {
                        DriveOutcome::Failed
                    };
                }
            }
            Err(e) => {
                warn!("Generation stream for {} failed: {}", conversation.session_id, e);
                break;
            }
        }
    }

    stream.close();
    conversation.fail(CONNECTION_ERROR_MESSAGE);
    DriveOutcome::ConnectionLost
}

/// Like [`drive`], but give up once `stop` resolves
///
/// Stopping closes the stream and keeps the partial response.
pub async fn drive_until<F>(conversation: &mut Conversation, stream: &mut GenerationStream, stop: F) -> DriveOutcome
where
    F: Future<Output = ()>,
{
    {
        let run = pin!(drive(conversation, stream));
        if let Either::Left((outcome, _)) = future::select(run, pin!(stop)).await {
            return outcome;
        }
    }

    debug!("Generation for {} stopped", conversation.session_id);
    stream.close();
    conversation.cancel();
    DriveOutcome::Stopped
}
