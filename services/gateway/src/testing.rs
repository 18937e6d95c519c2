//! Scripted completion provider shared by the gateway's tests

use async_trait::async_trait;
use futures::{StreamExt, stream};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use crate::llm::{CompletionProvider, CompletionRequest, TextStream, UpstreamError};

/// One scripted upstream step
#[derive(Debug, Clone)]
pub enum Step {
    Text(&'static str),
    Fail(&'static str),
    /// Never yields again
    Hang,
}

enum Script {
    Steps(Vec<Step>),
    Echo(usize),
    Refuse,
}

/// Sets its flag when the upstream stream is dropped
struct ReleaseGuard(Arc<AtomicBool>);

impl Drop for ReleaseGuard {
    fn drop(&mut self) {
        self.0.store(true, Ordering::SeqCst);
    }
}

pub struct ScriptedProvider {
    script: Script,
    calls: AtomicUsize,
    last_request: Mutex<Option<CompletionRequest>>,
    released: Arc<AtomicBool>,
}

impl ScriptedProvider {
    pub fn new(steps: Vec<Step>) -> Self {
        Self::with_script(Script::Steps(steps))
    }

    /// Yields `"{prompt}-{i} "` for `i` in `0..count`, giving way between fragments
    pub fn echo(count: usize) -> Self {
        Self::with_script(Script::Echo(count))
    }

    /// Fails before streaming, as an unconfigured provider does
    pub fn refusing() -> Self {
        Self::with_script(Script::Refuse)
    }

    fn with_script(script: Script) -> Self {
        Self {
            script,
            calls: AtomicUsize::new(0),
            last_request: Mutex::new(None),
            released: Arc::new(AtomicBool::new(false)),
        }
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    pub fn last_request(&self) -> Option<CompletionRequest> {
        self.last_request.lock().unwrap().clone()
    }

    pub fn released_flag(&self) -> Arc<AtomicBool> {
        self.released.clone()
    }
}

#[async_trait]
impl CompletionProvider for ScriptedProvider {
    async fn stream_completion(&self, request: CompletionRequest) -> Result<TextStream, UpstreamError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let prompt = request
            .messages
            .last()
            .map(|message| message.content.clone())
            .unwrap_or_default();
        *self.last_request.lock().unwrap() = Some(request);

        let guard = ReleaseGuard(self.released.clone());

        let upstream: TextStream = match &self.script {
            Script::Refuse => return Err(UpstreamError::NotConfigured),
            Script::Steps(steps) => {
                let steps = steps.clone();
                let hangs = steps.iter().any(|step| matches!(step, Step::Hang));
                let items = steps
                    .into_iter()
                    .take_while(|step| !matches!(step, Step::Hang))
                    .map(|step| match step {
                        Step::Text(text) => Ok(text.to_string()),
                        Step::Fail(message) => Err(UpstreamError::Transport(message.to_string())),
                        Step::Hang => unreachable!(),
                    })
                    .collect::<Vec<_>>();
                let scripted = stream::iter(items);
                if hangs {
                    scripted.chain(stream::pending()).boxed()
                } else {
                    scripted.boxed()
                }
            }
            Script::Echo(count) => stream::iter(0..*count)
                .then(move |i| {
                    let fragment = format!("{}-{} ", prompt, i);
                    async move {
                        tokio::task::yield_now().await;
                        Ok(fragment)
                    }
                })
                .boxed(),
        };

        Ok(upstream
            .map(move |item| {
                let _held = &guard;
                item
            })
            .boxed())
    }
}
