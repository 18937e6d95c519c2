//! Application state shared across handlers

use std::sync::Arc;

use crate::{
    credentials::CredentialService,
    generation::GenerationGateway,
    jwt::{JwtConfig, JwtService},
    llm::{CompletionProvider, LlmConfig},
    rate_limiter::{RateLimiter, RateLimiterConfig},
    repositories::{InMemorySessionRepository, InMemoryUserRepository, SessionRepository},
};

/// Application state shared across handlers
#[derive(Clone)]
pub struct AppState {
    pub credentials: CredentialService,
    pub sessions: Arc<dyn SessionRepository>,
    pub generation: GenerationGateway,
    pub rate_limiter: RateLimiter,
}

impl AppState {
    /// Wire process-local stores to the given completion provider
    pub fn in_memory(
        jwt: JwtConfig,
        llm: &LlmConfig,
        rate_limit: RateLimiterConfig,
        provider: Arc<dyn CompletionProvider>,
    ) -> Self {
        let users = Arc::new(InMemoryUserRepository::new());
        let sessions: Arc<dyn SessionRepository> = Arc::new(InMemorySessionRepository::new());

        Self {
            credentials: CredentialService::new(users, JwtService::new(jwt)),
            generation: GenerationGateway::new(provider, sessions.clone(), llm.temperature, llm.max_tokens),
            sessions,
            rate_limiter: RateLimiter::new(rate_limit),
        }
    }
}
