use anyhow::{Context, Result};
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::net::TcpListener;
use tracing::{info, warn};
use tracing_subscriber::{EnvFilter, FmtSubscriber};

mod config;
mod credentials;
mod error;
mod extract;
mod generation;
mod jwt;
mod llm;
mod middleware;
mod models;
mod prompt;
mod rate_limiter;
mod repositories;
mod routes;
mod state;
#[cfg(test)]
mod testing;
mod validation;

use crate::{config::GatewayConfig, llm::OpenAiCompatibleProvider, state::AppState};

#[tokio::main]
async fn main() -> Result<()> {
    // Local overrides first; dotenvy never replaces a variable that is already set
    dotenvy::from_filename(".env.local").ok();
    dotenvy::dotenv().ok();

    // Initialize logging
    let subscriber = FmtSubscriber::builder()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .finish();

    tracing::subscriber::set_global_default(subscriber).context("setting default subscriber failed")?;

    info!("Starting generation gateway");

    let config = GatewayConfig::from_env()?;
    if config.llm.api_key.is_none() {
        warn!("LLM_API_KEY is not set, generations will fail in-stream");
    }
    info!("Completion API {} model={}", config.llm.base_url, config.llm.model);

    let provider = Arc::new(OpenAiCompatibleProvider::new(config.llm.clone())?);
    let app_state = AppState::in_memory(
        config.jwt.clone(),
        &config.llm,
        config.rate_limit.clone(),
        provider,
    );

    let limits = app_state.rate_limiter.config();
    info!(
        "Rate limit: {} requests per {}s per client",
        limits.max_attempts, limits.window_seconds
    );

    // Start the web server
    let app = routes::create_router(app_state);

    let address = config.listen_address();
    let listener = TcpListener::bind(&address)
        .await
        .with_context(|| format!("Failed to bind {}", address))?;
    info!("Gateway listening on {}", address);

    axum::serve(
        listener,
        app.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .await?;

    Ok(())
}
