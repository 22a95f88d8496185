//! Read-only query interface over the session store and message log.
//!
//! These are request/response snapshots for collaborators (UI polling,
//! diagnostics); live traffic flows over the WebSocket relay.

use axum::extract::{Path, State};
use axum::routing::get;
use axum::{Json, Router};
use chrono::{DateTime, Utc};
use serde::Serialize;
use utoipa::ToSchema;

use crate::error::ApiError;
use crate::models::message::ChatMessage;
use crate::models::session::{Session, SessionState};
use crate::AppState;

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/api/sessions/{session}", get(get_session))
        .route("/api/sessions/{session}/messages", get(list_session_messages))
}

/// Session metadata snapshot. Connection handles are process-local and not
/// exposed.
#[derive(Debug, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct SessionResponse {
    pub id: String,
    pub connection_code: String,
    pub state: SessionState,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
    pub connected_at: Option<DateTime<Utc>>,
}

impl From<Session> for SessionResponse {
    fn from(session: Session) -> Self {
        Self {
            is_active: session.is_active(),
            id: session.id,
            connection_code: session.pairing_code,
            state: session.state,
            created_at: session.created_at,
            connected_at: session.connected_at,
        }
    }
}

// ---------------------------------------------------------------------------
// GET /api/sessions/{session}
// ---------------------------------------------------------------------------

#[utoipa::path(
    get,
    path = "/api/sessions/{session}",
    tag = "Sessions",
    params(("session" = String, Path, description = "Pairing code")),
    responses(
        (status = 200, description = "Session metadata", body = SessionResponse),
        (status = 404, description = "No session holds this code", body = crate::error::ApiErrorBody),
    ),
)]
pub async fn get_session(
    State(state): State<AppState>,
    Path(code): Path<String>,
) -> Result<Json<SessionResponse>, ApiError> {
    let session = state
        .store
        .session_by_code(&code)
        .await
        .ok_or_else(|| ApiError::not_found("Session not found"))?;
    Ok(Json(SessionResponse::from(session)))
}

// ---------------------------------------------------------------------------
// GET /api/sessions/{session}/messages
// ---------------------------------------------------------------------------

#[utoipa::path(
    get,
    path = "/api/sessions/{session}/messages",
    tag = "Sessions",
    params(("session" = String, Path, description = "Session ID")),
    responses(
        (status = 200, description = "Chat transcript in append order", body = [ChatMessage]),
        (status = 404, description = "Unknown session ID", body = crate::error::ApiErrorBody),
    ),
)]
pub async fn list_session_messages(
    State(state): State<AppState>,
    Path(session_id): Path<String>,
) -> Result<Json<Vec<ChatMessage>>, ApiError> {
    if state.store.session_by_id(&session_id).await.is_none() {
        return Err(ApiError::not_found("Session not found"));
    }
    Ok(Json(state.store.messages_by_session(&session_id).await))
}
