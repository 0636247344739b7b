//! HTTP route definitions

use axum::{
    extract::{Path, State},
    http::{header, HeaderValue, Method, StatusCode},
    response::{IntoResponse, Json},
    routing::get,
    Router,
};
use serde::Serialize;
use tower_http::{
    compression::CompressionLayer,
    cors::{AllowOrigin, CorsLayer},
    trace::TraceLayer,
};

use crate::app::AppState;
use crate::util::time::uptime_secs;
use crate::ws::handler::ws_handler;
use crate::ws::protocol::ServerMsg;

/// Build the application router
pub fn build_router(state: AppState) -> Router {
    // CORS configuration - any origin unless CLIENT_ORIGIN narrows it
    let allowed_origins: Vec<HeaderValue> = state
        .config
        .client_origins
        .iter()
        .filter_map(|s| s.parse::<HeaderValue>().ok())
        .collect();
    let allow_origin = if allowed_origins.is_empty() {
        AllowOrigin::any()
    } else {
        AllowOrigin::list(allowed_origins)
    };

    let cors = CorsLayer::new()
        .allow_origin(allow_origin)
        .allow_methods([Method::GET, Method::OPTIONS])
        .allow_headers([header::CONTENT_TYPE]);

    Router::new()
        .route("/health", get(health_handler))
        .route("/ws/game/:room_code", get(ws_handler))
        .route("/rooms/:room_code/state", get(room_state_handler))
        .layer(CompressionLayer::new())
        .layer(TraceLayer::new_for_http())
        .layer(cors)
        .with_state(state)
}

// ============================================================================
// Health endpoint
// ============================================================================

#[derive(Serialize)]
struct HealthResponse {
    status: &'static str,
    uptime_secs: u64,
    active_rooms: usize,
    active_simulations: usize,
}

async fn health_handler(State(state): State<AppState>) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok",
        uptime_secs: uptime_secs(),
        active_rooms: state.registry.active_rooms(),
        active_simulations: state.registry.active_simulations(),
    })
}

// ============================================================================
// Room state endpoint
// ============================================================================

async fn room_state_handler(
    State(state): State<AppState>,
    Path(room_code): Path<String>,
) -> Result<Json<ServerMsg>, AppError> {
    state
        .registry
        .snapshot(&room_code)
        .map(|snapshot| Json(ServerMsg::GameUpdate(snapshot)))
        .ok_or_else(|| AppError::NotFound(format!("Room {} has no match", room_code)))
}

// ============================================================================
// Error handling
// ============================================================================

#[derive(Debug, thiserror::Error)]
pub enum AppError {
    #[error("Not found: {0}")]
    NotFound(String),
}

impl IntoResponse for AppError {
    fn into_response(self) -> axum::response::Response {
        let (status, message) = match &self {
            AppError::NotFound(msg) => (StatusCode::NOT_FOUND, msg.clone()),
        };

        let body = serde_json::json!({
            "error": message
        });

        (status, Json(body)).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Config;
    use crate::room::ConnectionHandle;
    use crate::store::MatchRecorder;
    use crate::ws::protocol::JoinRole;
    use axum::body::{to_bytes, Body};
    use axum::http::Request;
    use tower::ServiceExt;

    fn app_state() -> AppState {
        let config = Config::from_lookup(|_| None).unwrap();
        let (recorder, _rx) = MatchRecorder::channel();
        AppState::new(config, recorder)
    }

    async fn get_json(router: Router, uri: &str) -> (StatusCode, serde_json::Value) {
        let response = router
            .oneshot(Request::builder().uri(uri).body(Body::empty()).unwrap())
            .await
            .unwrap();
        let status = response.status();
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        (status, serde_json::from_slice(&bytes).unwrap())
    }

    #[tokio::test]
    async fn health_reports_counts() {
        crate::util::time::init_server_time();
        let state = app_state();
        state.registry.ensure_room("HEALTH");

        let (status, body) = get_json(build_router(state), "/health").await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["status"], "ok");
        assert_eq!(body["active_rooms"], 1);
        assert_eq!(body["active_simulations"], 0);
    }

    #[tokio::test]
    async fn room_state_returns_snapshot() {
        let state = app_state();
        let (conn, _rx) = ConnectionHandle::channel(16);
        state.registry.join("SNAP", &conn, JoinRole::Player);

        let (status, body) = get_json(build_router(state), "/rooms/SNAP/state").await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["type"], "game_update");
        assert_eq!(body["status"], "waiting_for_opponent");
        assert_eq!(body["score_p1"], 0);
    }

    #[tokio::test]
    async fn missing_room_is_not_found() {
        let (status, body) = get_json(build_router(app_state()), "/rooms/NOPE/state").await;
        assert_eq!(status, StatusCode::NOT_FOUND);
        assert!(body["error"].as_str().unwrap().contains("NOPE"));
    }
}
