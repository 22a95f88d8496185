pub mod health;
pub mod sessions;

use axum::Router;
use utoipa::OpenApi;
use utoipa_swagger_ui::SwaggerUi;

use crate::AppState;

pub fn router() -> Router<AppState> {
    Router::new()
        .merge(health::router())
        .merge(crate::relay::server::router())
        .merge(sessions::router())
        .merge(SwaggerUi::new("/docs").url("/api/openapi.json", ApiDoc::openapi()))
}

#[derive(OpenApi)]
#[openapi(
    paths(
        health::health,
        sessions::get_session,
        sessions::list_session_messages,
    ),
    components(
        schemas(
            crate::error::ApiErrorBody,
            crate::error::ApiErrorDetail,
            crate::models::message::ChatMessage,
            crate::models::message::Sender,
            crate::models::session::SessionState,
            health::HealthResponse,
            sessions::SessionResponse,
        )
    ),
    info(
        title = "PairLink Relay API",
        description = "Read-only queries over pairing sessions and chat transcripts. Live relay traffic uses the /ws WebSocket."
    )
)]
pub struct ApiDoc;
