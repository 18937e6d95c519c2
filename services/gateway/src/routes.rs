//! Gateway routes

use axum::{
    Extension, Json, Router,
    extract::{Path, Query, State},
    http::{StatusCode, header},
    middleware,
    response::{
        IntoResponse,
        sse::{Event, KeepAlive, Sse},
    },
    routing::{get, post},
};
use axum_extra::extract::WithRejection;
use common::ChatMessage;
use futures::{Stream, StreamExt};
use serde::{Deserialize, Serialize};
use serde_json::json;
use std::convert::Infallible;
use tokio_stream::wrappers::ReceiverStream;
use tracing::{info, warn};

use crate::{
    credentials::AuthSession,
    error::{ApiError, ApiResult},
    middleware::{auth_middleware, rate_limit_middleware},
    models::{Credentials, NewSession, PublicUser, Session, UpdateSession},
    state::AppState,
    validation::validate_prompt,
};

/// Successful register/login body
#[derive(Serialize)]
pub struct AuthResponse {
    pub success: bool,
    #[serde(flatten)]
    pub session: AuthSession,
}

impl From<AuthSession> for AuthResponse {
    fn from(session: AuthSession) -> Self {
        Self {
            success: true,
            session,
        }
    }
}

/// Query string of a generation request
///
/// The token travels in the query because event-stream clients cannot set headers.
#[derive(Debug, Deserialize)]
pub struct StreamQuery {
    pub prompt: Option<String>,
    pub token: Option<String>,
}

/// Create the router for the gateway, mounted under `/api`
pub fn create_router(state: AppState) -> Router {
    let session_routes = Router::new()
        .route("/sessions", get(list_sessions).post(create_session))
        .route(
            "/sessions/:id",
            get(get_session).patch(update_session).delete(delete_session),
        )
        .route("/sessions/:id/messages", post(append_message))
        .route("/sessions/:id/download", get(download_session))
        .route_layer(middleware::from_fn_with_state(
            state.clone(),
            auth_middleware,
        ));

    let api = Router::new()
        .route("/auth/register", post(register))
        .route("/auth/login", post(login))
        .route("/ai/stream/:session_id", get(stream_generation))
        .merge(session_routes)
        .layer(middleware::from_fn_with_state(
            state.clone(),
            rate_limit_middleware,
        ))
        .route("/health", get(health_check));

    Router::new().nest("/api", api).with_state(state)
}

/// Health check endpoint
pub async fn health_check() -> impl IntoResponse {
    Json(json!({
        "status": "ok",
        "service": "gateway"
    }))
}

/// Register a new user
pub async fn register(
    State(state): State<AppState>,
    WithRejection(Json(payload), _): WithRejection<Json<Credentials>, ApiError>,
) -> ApiResult<Json<AuthResponse>> {
    let session = state
        .credentials
        .register(&payload.email, &payload.password)
        .await?;
    Ok(Json(session.into()))
}

/// Log a user in
pub async fn login(
    State(state): State<AppState>,
    WithRejection(Json(payload), _): WithRejection<Json<Credentials>, ApiError>,
) -> ApiResult<Json<AuthResponse>> {
    let session = state
        .credentials
        .login(&payload.email, &payload.password)
        .await?;
    Ok(Json(session.into()))
}

/// Open an event stream for one generation
///
/// Prompt and token are checked before the stream opens; once it is open
/// every failure arrives as an `error` event.
pub async fn stream_generation(
    State(state): State<AppState>,
    Path(session_id): Path<String>,
    Query(query): Query<StreamQuery>,
) -> ApiResult<Sse<impl Stream<Item = Result<Event, Infallible>>>> {
    let prompt = validate_prompt(query.prompt.as_deref())
        .map_err(|msg| {
            warn!(session_id = %session_id, "Rejected generation: {}", msg);
            ApiError::Validation(msg)
        })?
        .to_string();

    let token = query
        .token
        .as_deref()
        .filter(|token| !token.trim().is_empty())
        .ok_or_else(|| {
            warn!(session_id = %session_id, "Rejected generation: missing token");
            ApiError::Validation("Token is required".to_string())
        })?;

    let user = state.credentials.authenticate(token).await?;
    info!(session_id = %session_id, user_id = %user.id, "Opening generation stream");

    let frames = state.generation.start(session_id, user.id, prompt);
    let events = ReceiverStream::new(frames)
        .map(|frame| Ok::<_, Infallible>(Event::default().data(frame.to_payload())));

    Ok(Sse::new(events).keep_alive(KeepAlive::default()))
}

/// List the caller's sessions
pub async fn list_sessions(
    State(state): State<AppState>,
    Extension(user): Extension<PublicUser>,
) -> ApiResult<Json<Vec<Session>>> {
    Ok(Json(state.sessions.list_by_user(user.id).await?))
}

/// Create a session for the caller
pub async fn create_session(
    State(state): State<AppState>,
    Extension(user): Extension<PublicUser>,
    payload: Option<Json<NewSession>>,
) -> ApiResult<impl IntoResponse> {
    let name = payload.and_then(|Json(payload)| payload.name);
    let session = state.sessions.create(user.id, name).await?;
    Ok((StatusCode::CREATED, Json(session)))
}

pub async fn get_session(
    State(state): State<AppState>,
    Extension(user): Extension<PublicUser>,
    Path(id): Path<String>,
) -> ApiResult<Json<Session>> {
    Ok(Json(owned_session(&state, &id, &user).await?))
}

/// Replace the fields present in the payload
pub async fn update_session(
    State(state): State<AppState>,
    Extension(user): Extension<PublicUser>,
    Path(id): Path<String>,
    WithRejection(Json(payload), _): WithRejection<Json<UpdateSession>, ApiError>,
) -> ApiResult<Json<Session>> {
    owned_session(&state, &id, &user).await?;
    Ok(Json(state.sessions.update(&id, payload).await?))
}

/// Append one message; the server assigns its timestamp
pub async fn append_message(
    State(state): State<AppState>,
    Extension(user): Extension<PublicUser>,
    Path(id): Path<String>,
    WithRejection(Json(message), _): WithRejection<Json<ChatMessage>, ApiError>,
) -> ApiResult<Json<Session>> {
    owned_session(&state, &id, &user).await?;
    if !state.sessions.append_message(&id, message).await? {
        return Err(session_not_found());
    }
    Ok(Json(owned_session(&state, &id, &user).await?))
}

pub async fn delete_session(
    State(state): State<AppState>,
    Extension(user): Extension<PublicUser>,
    Path(id): Path<String>,
) -> ApiResult<impl IntoResponse> {
    owned_session(&state, &id, &user).await?;
    if !state.sessions.delete(&id).await? {
        return Err(session_not_found());
    }
    Ok(Json(json!({ "success": true })))
}

/// Return the session as a JSON file attachment
pub async fn download_session(
    State(state): State<AppState>,
    Extension(user): Extension<PublicUser>,
    Path(id): Path<String>,
) -> ApiResult<impl IntoResponse> {
    let session = owned_session(&state, &id, &user).await?;
    let body = serde_json::to_string_pretty(&session).map_err(|e| ApiError::Internal(e.into()))?;

    Ok((
        [
            (header::CONTENT_TYPE, "application/json".to_string()),
            (
                header::CONTENT_DISPOSITION,
                format!("attachment; filename=\"{}.json\"", session.id),
            ),
        ],
        body,
    ))
}

/// A session owned by someone else is reported as absent
async fn owned_session(state: &AppState, id: &str, user: &PublicUser) -> ApiResult<Session> {
    match state.sessions.get(id).await? {
        Some(session) if session.user_id == user.id => Ok(session),
        _ => Err(session_not_found()),
    }
}

fn session_not_found() -> ApiError {
    ApiError::NotFound("Session not found".to_string())
}
