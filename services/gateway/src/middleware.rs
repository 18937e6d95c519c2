//! Middleware for bearer authentication and request throttling

use axum::{
    extract::{ConnectInfo, Request, State},
    middleware::Next,
    response::Response,
};
use axum_extra::{
    TypedHeader,
    headers::{Authorization, authorization::Bearer},
};
use std::net::SocketAddr;
use tracing::warn;

use crate::{error::ApiError, state::AppState};

/// Resolve the bearer token to a user and insert it into the request extensions
pub async fn auth_middleware(
    State(state): State<AppState>,
    bearer: Option<TypedHeader<Authorization<Bearer>>>,
    mut req: Request,
    next: Next,
) -> Result<Response, ApiError> {
    let Some(TypedHeader(Authorization(bearer))) = bearer else {
        warn!("Rejected {} {}: missing bearer token", req.method(), req.uri().path());
        return Err(ApiError::Unauthorized("Missing bearer token".to_string()));
    };

    let user = state.credentials.authenticate(bearer.token()).await?;

    req.extensions_mut().insert(user);

    Ok(next.run(req).await)
}

/// Throttle requests per client address
pub async fn rate_limit_middleware(
    State(state): State<AppState>,
    req: Request,
    next: Next,
) -> Result<Response, ApiError> {
    let key = client_key(&req, state.rate_limiter.config().trust_forwarded_for);

    if !state.rate_limiter.is_allowed(&key).await {
        warn!("Rate limit exceeded for {}", key);
        return Err(ApiError::TooManyRequests);
    }

    Ok(next.run(req).await)
}

/// Peer address, or the first `X-Forwarded-For` hop when the proxy is trusted
fn client_key(req: &Request, trust_forwarded_for: bool) -> String {
    let forwarded = trust_forwarded_for
        .then(|| req.headers().get("x-forwarded-for"))
        .flatten();

    forwarded
        .and_then(|value| value.to_str().ok())
        .and_then(|value| value.split(',').next())
        .map(str::trim)
        .filter(|value| !value.is_empty())
        .map(ToString::to_string)
        .or_else(|| {
            req.extensions()
                .get::<ConnectInfo<SocketAddr>>()
                .map(|ConnectInfo(addr)| addr.ip().to_string())
        })
        .unwrap_or_else(|| "unknown".to_string())
}
