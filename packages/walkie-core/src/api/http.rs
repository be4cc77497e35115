//! HTTP route handlers.
//!
//! All handlers are thin - they delegate to services for business logic.

use axum::{
    extract::rejection::{JsonRejection, QueryRejection},
    extract::{Path, Query, State},
    http::{HeaderValue, Method},
    response::IntoResponse,
    routing::{get, post},
    Json, Router,
};
use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine;
use bytes::Bytes;
use chrono::Utc;
use serde::Deserialize;
use serde_json::json;
use tower_http::cors::{AllowOrigin, Any, CorsLayer};
use tower_http::trace::TraceLayer;

use crate::api::response::{api_ok, api_success};
use crate::api::AppState;
use crate::error::{WalkieError, WalkieResult};
use crate::protocol_constants::SERVICE_ID;

// ─────────────────────────────────────────────────────────────────────────────
// Request Types
// ─────────────────────────────────────────────────────────────────────────────

#[derive(Deserialize, Default)]
struct JoinRequest {
    #[serde(rename = "roomId")]
    room_id: Option<String>,
}

#[derive(Deserialize)]
struct SpeakingRequest {
    speaking: bool,
}

#[derive(Deserialize)]
struct VoiceMessageRequest {
    #[serde(rename = "audioData")]
    audio_data: String,
    #[serde(rename = "durationMs")]
    duration_ms: i64,
}

#[derive(Deserialize)]
struct MessagesQuery {
    after: Option<u64>,
}

impl VoiceMessageRequest {
    /// Decodes the base64 payload and range-checks the duration.
    fn into_parts(self) -> WalkieResult<(Bytes, u32)> {
        let payload = BASE64
            .decode(self.audio_data.trim())
            .map_err(|e| WalkieError::InvalidRequest(format!("audioData is not base64: {}", e)))?;

        let duration_ms = u32::try_from(self.duration_ms)
            .ok()
            .filter(|d| *d > 0)
            .ok_or_else(|| {
                WalkieError::InvalidRequest(format!(
                    "durationMs must be a positive integer, got {}",
                    self.duration_ms
                ))
            })?;

        Ok((Bytes::from(payload), duration_ms))
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Router
// ─────────────────────────────────────────────────────────────────────────────

/// Creates the Axum router with all routes.
pub fn create_router(state: AppState) -> Router {
    let cors = cors_layer(&state.config.cors_origins);

    Router::new()
        .route("/health", get(health_check))
        .route("/api/sessions", post(create_session))
        .route("/api/sessions/{id}", get(get_session))
        .route("/api/sessions/{id}/join", post(join_room))
        .route("/api/sessions/{id}/leave", post(leave_room))
        .route("/api/sessions/{id}/skip", post(skip_connection))
        .route("/api/sessions/{id}/speaking", post(set_speaking))
        .route("/api/sessions/{id}/disconnect", post(disconnect))
        .route("/api/sessions/{id}/messages", post(send_voice_message))
        .route("/api/sessions/{id}/status", get(room_status))
        .route("/api/rooms/{id}/messages", get(list_messages))
        .layer(cors)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// Any origin when none are configured, otherwise exactly the listed ones.
fn cors_layer(origins: &[String]) -> CorsLayer {
    let layer = CorsLayer::new()
        .allow_methods([Method::GET, Method::POST, Method::OPTIONS])
        .allow_headers(Any);

    if origins.is_empty() {
        return layer.allow_origin(Any);
    }

    let allowed: Vec<HeaderValue> = origins
        .iter()
        .filter_map(|origin| match HeaderValue::from_str(origin) {
            Ok(value) => Some(value),
            Err(_) => {
                log::warn!("[Server] Ignoring invalid CORS origin {:?}", origin);
                None
            }
        })
        .collect();
    layer.allow_origin(AllowOrigin::list(allowed))
}

// ─────────────────────────────────────────────────────────────────────────────
// Handlers
// ─────────────────────────────────────────────────────────────────────────────

/// Liveness check. Always returns 200 OK if the server is responding.
async fn health_check() -> impl IntoResponse {
    api_success(json!({
        "status": "ok",
        "service": SERVICE_ID,
        "timestamp": Utc::now().to_rfc3339(),
    }))
}

async fn create_session(State(state): State<AppState>) -> WalkieResult<impl IntoResponse> {
    let session = state.sessions.create_session().await?;
    Ok(api_success(session))
}

async fn get_session(
    Path(id): Path<String>,
    State(state): State<AppState>,
) -> WalkieResult<impl IntoResponse> {
    let session = state.sessions.get_session(&id).await?;
    Ok(api_success(session))
}

/// Joins a specific room (`{"roomId": ...}`) or any free one (empty body).
async fn join_room(
    Path(id): Path<String>,
    State(state): State<AppState>,
    body: Bytes,
) -> WalkieResult<impl IntoResponse> {
    let request: JoinRequest = if body.iter().all(u8::is_ascii_whitespace) {
        JoinRequest::default()
    } else {
        serde_json::from_slice(&body)
            .map_err(|e| WalkieError::InvalidRequest(format!("invalid join body: {}", e)))?
    };

    let room = state
        .matchmaker
        .join(&id, request.room_id.as_deref())
        .await?;
    Ok(api_success(room))
}

async fn leave_room(
    Path(id): Path<String>,
    State(state): State<AppState>,
) -> WalkieResult<impl IntoResponse> {
    state.matchmaker.leave(&id).await?;
    Ok(api_ok())
}

async fn skip_connection(
    Path(id): Path<String>,
    State(state): State<AppState>,
) -> WalkieResult<impl IntoResponse> {
    let room = state.matchmaker.skip(&id).await?;
    Ok(api_success(room))
}

async fn set_speaking(
    Path(id): Path<String>,
    State(state): State<AppState>,
    payload: Result<Json<SpeakingRequest>, JsonRejection>,
) -> WalkieResult<impl IntoResponse> {
    let Json(payload) = payload?;
    let session = state.turns.set_speaking(&id, payload.speaking).await?;
    Ok(api_success(session))
}

async fn disconnect(
    Path(id): Path<String>,
    State(state): State<AppState>,
) -> WalkieResult<impl IntoResponse> {
    let session = state.matchmaker.disconnect(&id).await?;
    Ok(api_success(session))
}

async fn send_voice_message(
    Path(id): Path<String>,
    State(state): State<AppState>,
    payload: Result<Json<VoiceMessageRequest>, JsonRejection>,
) -> WalkieResult<impl IntoResponse> {
    let Json(payload) = payload?;
    let (audio, duration_ms) = payload.into_parts()?;
    let message = state
        .turns
        .record_voice_message(&id, audio, duration_ms)
        .await?;
    Ok(api_success(message))
}

/// Polled by clients to learn their room and partner.
async fn room_status(
    Path(id): Path<String>,
    State(state): State<AppState>,
) -> WalkieResult<impl IntoResponse> {
    let status = state.presence.status(&id).await?;
    Ok(api_success(status))
}

async fn list_messages(
    Path(id): Path<String>,
    State(state): State<AppState>,
    query: Result<Query<MessagesQuery>, QueryRejection>,
) -> WalkieResult<impl IntoResponse> {
    let Query(query) = query?;
    let messages = state.turns.list_messages(&id, query.after).await?;
    Ok(api_success(json!({ "messages": messages })))
}
