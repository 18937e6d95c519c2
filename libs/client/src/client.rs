//! HTTP client for the generation gateway

use common::ChatMessage;
use reqwest::{Client, RequestBuilder, Response, header};
use serde::Serialize;
use serde::de::DeserializeOwned;
use serde_json::{Value, json};
use tracing::{info, warn};

use crate::{
    conversation::Conversation,
    error::{ClientError, ClientResult},
    models::{Account, AuthResponse, SessionRecord, SessionUpdate},
    stream::{DriveOutcome, GenerationStream, drive},
};

/// Gateway client holding the current access token
#[derive(Debug, Clone)]
pub struct GatewayClient {
    http: Client,
    base_url: String,
    token: Option<String>,
}

impl GatewayClient {
    /// Create a client for a gateway at `base_url`, e.g. `http://localhost:3001`
    pub fn new(base_url: impl Into<String>) -> ClientResult<Self> {
        let http = Client::builder().build()?;
        Ok(Self {
            http,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            token: None,
        })
    }

    /// Use an access token obtained earlier
    pub fn with_token(mut self, token: impl Into<String>) -> Self {
        self.token = Some(token.into());
        self
    }

    pub fn token(&self) -> Option<&str> {
        self.token.as_deref()
    }

    /// Register and keep the issued token
    pub async fn register(&mut self, email: &str, password: &str) -> ClientResult<Account> {
        self.authenticate("/auth/register", email, password).await
    }

    /// Log in and keep the issued token
    pub async fn login(&mut self, email: &str, password: &str) -> ClientResult<Account> {
        self.authenticate("/auth/login", email, password).await
    }

    pub fn logout(&mut self) {
        self.token = None;
    }

    pub async fn list_sessions(&self) -> ClientResult<Vec<SessionRecord>> {
        self.send_json(self.authorized(self.http.get(self.url("/sessions")))?)
            .await
    }

    pub async fn create_session(&self, name: Option<&str>) -> ClientResult<SessionRecord> {
        let request = self
            .authorized(self.http.post(self.url("/sessions")))?
            .json(&json!({ "name": name }));
        self.send_json(request).await
    }

    pub async fn get_session(&self, id: &str) -> ClientResult<SessionRecord> {
        let url = self.url(&format!("/sessions/{}", id));
        self.send_json(self.authorized(self.http.get(url))?).await
    }

    pub async fn update_session(&self, id: &str, update: &SessionUpdate) -> ClientResult<SessionRecord> {
        let url = self.url(&format!("/sessions/{}", id));
        self.send_json(self.authorized(self.http.patch(url))?.json(update))
            .await
    }

    pub async fn append_message(&self, id: &str, message: &ChatMessage) -> ClientResult<SessionRecord> {
        let url = self.url(&format!("/sessions/{}/messages", id));
        self.send_json(self.authorized(self.http.post(url))?.json(message))
            .await
    }

    pub async fn delete_session(&self, id: &str) -> ClientResult<()> {
        let url = self.url(&format!("/sessions/{}", id));
        let _: Value = self.send_json(self.authorized(self.http.delete(url))?).await?;
        Ok(())
    }

    /// The session's JSON export, as served for download
    pub async fn download_session(&self, id: &str) -> ClientResult<String> {
        let url = self.url(&format!("/sessions/{}/download", id));
        let response = check(self.authorized(self.http.get(url))?.send().await?).await?;
        Ok(response.text().await?)
    }

    /// Open the event stream of one generation
    ///
    /// Prompt and token problems surface here as [`ClientError::Api`];
    /// anything later arrives as frames.
    pub async fn stream_generation(&self, session_id: &str, prompt: &str) -> ClientResult<GenerationStream> {
        let token = self.token.as_deref().ok_or(ClientError::NotAuthenticated)?;
        let url = self.url(&format!("/ai/stream/{}", session_id));

        let response = self
            .http
            .get(url)
            .query(&[("prompt", prompt), ("token", token)])
            .header(header::ACCEPT, "text/event-stream")
            .send()
            .await?;
        let response = check(response).await?;

        Ok(GenerationStream::from_byte_stream(response.bytes_stream()))
    }

    /// Run a full generation turn and persist the result
    ///
    /// The conversation is saved only after `[DONE]`.
    pub async fn generate(&self, conversation: &mut Conversation, prompt: &str) -> ClientResult<DriveOutcome> {
        let prompt = prompt.trim();
        conversation.begin(prompt)?;

        let mut stream = match self.stream_generation(&conversation.session_id, prompt).await {
            Ok(stream) => stream,
            Err(e) => {
                conversation.fail_to_start(&e);
                return Err(e);
            }
        };

        let outcome = drive(conversation, &mut stream).await;
        if outcome == DriveOutcome::Completed {
            self.save_conversation(conversation).await?;
        } else {
            warn!("Generation for {} ended with {:?}", conversation.session_id, outcome);
        }
        Ok(outcome)
    }

    /// Persist history and generated code
    pub async fn save_conversation(&self, conversation: &Conversation) -> ClientResult<SessionRecord> {
        self.update_session(&conversation.session_id, &conversation.update_request())
            .await
    }

    async fn authenticate(&mut self, path: &str, email: &str, password: &str) -> ClientResult<Account> {
        let request = self.http.post(self.url(path)).json(&Credentials { email, password });
        let auth: AuthResponse = self.send_json(request).await?;

        info!("Authenticated as {}", auth.user.email);
        self.token = Some(auth.access_token);
        Ok(auth.user)
    }

    fn authorized(&self, request: RequestBuilder) -> ClientResult<RequestBuilder> {
        let token = self.token.as_deref().ok_or(ClientError::NotAuthenticated)?;
        Ok(request.bearer_auth(token))
    }

    async fn send_json<T: DeserializeOwned>(&self, request: RequestBuilder) -> ClientResult<T> {
        let response = check(request.send().await?).await?;
        Ok(response.json().await?)
    }

    fn url(&self, path: &str) -> String {
        format!("{}/api{}", self.base_url, path)
    }
}

#[derive(Serialize)]
struct Credentials<'a> {
    email: &'a str,
    password: &'a str,
}

/// Turn a non-2xx response into [`ClientError::Api`]
async fn check(response: Response) -> ClientResult<Response> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }

    let body = response.text().await.unwrap_or_default();
    let message = serde_json::from_str::<Value>(&body)
        .ok()
        .and_then(|value| value.get("error").and_then(Value::as_str).map(ToString::to_string))
        .unwrap_or_else(|| status.canonical_reason().unwrap_or("request failed").to_string());

    Err(ClientError::Api {
        status: status.as_u16(),
        message,
    })
}
