use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::{IntoResponse, Json, Response},
    routing::{get, post},
    Router,
};
use log::{info, warn};
use serde::Deserialize;
use std::sync::Arc;
use tower_http::cors::CorsLayer;

use crate::bot::ModerationBot;
use crate::error::ControlError;

/// Shared state handed to every route
#[derive(Clone)]
pub struct DashboardState {
    pub bot: Arc<ModerationBot>,
}

pub struct WebDashboard {
    state: DashboardState,
}

impl WebDashboard {
    pub fn new(bot: Arc<ModerationBot>) -> Self {
        Self {
            state: DashboardState { bot },
        }
    }

    pub fn get_state(&self) -> DashboardState {
        self.state.clone()
    }

    pub async fn start_server(&self, port: u16) -> anyhow::Result<()> {
        let app = self.create_routes();

        info!("Binding to 0.0.0.0:{}...", port);
        let listener = tokio::net::TcpListener::bind(format!("0.0.0.0:{}", port)).await?;
        info!("Control API available at http://localhost:{}/api/status", port);

        axum::serve(listener, app).await?;
        Ok(())
    }

    pub fn create_routes(&self) -> Router {
        Router::new()
            .route("/api/status", get(get_status))
            .route("/api/connect", post(connect))
            .route("/api/disconnect", post(disconnect))
            .route("/api/groups", get(list_groups))
            .route("/api/groups/:group_id/toggle", post(toggle_group))
            .route("/api/offensive-words", get(get_offensive_words).post(set_offensive_words))
            .route("/api/stats", get(get_stats))
            .route("/api/clear-data", post(clear_data))
            .layer(CorsLayer::permissive())
            .with_state(self.state.clone())
    }
}

impl IntoResponse for ControlError {
    fn into_response(self) -> Response {
        let status = match self {
            ControlError::Validation(_) => StatusCode::BAD_REQUEST,
            ControlError::NotConnected => StatusCode::SERVICE_UNAVAILABLE,
            ControlError::Gateway(_) => StatusCode::BAD_GATEWAY,
        };
        warn!("Control request failed ({}): {}", self.error_code(), self);

        let body = Json(serde_json::json!({
            "success": false,
            "error": self.to_string(),
        }));
        (status, body).into_response()
    }
}

type ApiResult = Result<Json<serde_json::Value>, ControlError>;

fn data(value: impl serde::Serialize) -> ApiResult {
    Ok(Json(serde_json::json!({
        "success": true,
        "data": value
    })))
}

fn message(text: String) -> ApiResult {
    Ok(Json(serde_json::json!({
        "success": true,
        "message": text
    })))
}

#[derive(Debug, Deserialize)]
struct ToggleRequest {
    active: bool,
}

#[derive(Debug, Deserialize)]
struct ClearRequest {
    #[serde(rename = "type")]
    scope: String,
}

// API Route Handlers

async fn get_status(State(state): State<DashboardState>) -> ApiResult {
    data(state.bot.get_status().await)
}

async fn connect(State(state): State<DashboardState>) -> ApiResult {
    message(state.bot.connect().await?)
}

async fn disconnect(State(state): State<DashboardState>) -> ApiResult {
    message(state.bot.disconnect().await?)
}

async fn list_groups(State(state): State<DashboardState>) -> ApiResult {
    data(state.bot.list_groups().await)
}

async fn toggle_group(
    State(state): State<DashboardState>,
    Path(group_id): Path<String>,
    Json(request): Json<ToggleRequest>,
) -> ApiResult {
    message(state.bot.toggle_group(&group_id, request.active).await?)
}

async fn get_offensive_words(State(state): State<DashboardState>) -> ApiResult {
    data(state.bot.get_blocked_words().await)
}

async fn set_offensive_words(State(state): State<DashboardState>, Json(body): Json<serde_json::Value>) -> ApiResult {
    let words = body.get("words").cloned().unwrap_or(serde_json::Value::Null);
    message(state.bot.set_blocked_words(&words).await?)
}

async fn get_stats(State(state): State<DashboardState>) -> ApiResult {
    data(state.bot.get_stats().await)
}

async fn clear_data(State(state): State<DashboardState>, Json(request): Json<ClearRequest>) -> ApiResult {
    message(state.bot.clear_data(&request.scope).await?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bot::persistence::FileStateStore;
    use crate::config::BotConfiguration;
    use crate::platforms::memory::MemoryGateway;
    use axum::body::Body;
    use axum::http::Request;
    use tempfile::TempDir;
    use tower::ServiceExt;

    async fn dashboard() -> (WebDashboard, TempDir) {
        let dir = tempfile::tempdir().unwrap();
        let store = Arc::new(FileStateStore::new(dir.path().join("bot_data.json")));
        let bot = ModerationBot::new(&BotConfiguration::default(), Box::new(MemoryGateway::new()), store)
            .await
            .unwrap();
        (WebDashboard::new(Arc::new(bot)), dir)
    }

    async fn call(app: Router, method: &str, uri: &str, body: Option<serde_json::Value>) -> (StatusCode, serde_json::Value) {
        let request = Request::builder().method(method).uri(uri);
        let request = match body {
            Some(body) => request
                .header("content-type", "application/json")
                .body(Body::from(body.to_string()))
                .unwrap(),
            None => request.body(Body::empty()).unwrap(),
        };

        let response = app.oneshot(request).await.unwrap();
        let status = response.status();
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX).await.unwrap();
        (status, serde_json::from_slice(&bytes).unwrap_or(serde_json::Value::Null))
    }

    #[tokio::test]
    async fn test_status_before_connect() {
        let (dashboard, _dir) = dashboard().await;
        let (status, body) = call(dashboard.create_routes(), "GET", "/api/status", None).await;

        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["data"]["status"], "disconnected");
        assert_eq!(body["data"]["activeGroupsCount"], 0);
    }

    #[tokio::test]
    async fn test_toggle_group_and_stats() {
        let (dashboard, _dir) = dashboard().await;

        let (status, body) = call(
            dashboard.create_routes(),
            "POST",
            "/api/groups/123@g.us/toggle",
            Some(serde_json::json!({"active": true})),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["success"], true);

        let (_, body) = call(dashboard.create_routes(), "GET", "/api/stats", None).await;
        assert_eq!(body["data"]["activeGroups"], 1);
        assert_eq!(body["data"]["offensiveWordsCount"], 12);
    }

    #[tokio::test]
    async fn test_rejects_non_array_words() {
        let (dashboard, _dir) = dashboard().await;
        let (status, body) = call(
            dashboard.create_routes(),
            "POST",
            "/api/offensive-words",
            Some(serde_json::json!({"words": "porra"})),
        )
        .await;

        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["success"], false);
        assert!(body["error"].as_str().unwrap().contains("array"));

        let (_, body) = call(dashboard.create_routes(), "GET", "/api/offensive-words", None).await;
        assert_eq!(body["data"].as_array().unwrap().len(), 12);
    }

    #[tokio::test]
    async fn test_clear_data_scopes() {
        let (dashboard, _dir) = dashboard().await;

        let (status, _) = call(
            dashboard.create_routes(),
            "POST",
            "/api/clear-data",
            Some(serde_json::json!({"type": "all"})),
        )
        .await;
        assert_eq!(status, StatusCode::OK);

        let (status, body) = call(
            dashboard.create_routes(),
            "POST",
            "/api/clear-data",
            Some(serde_json::json!({"type": "everything"})),
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["success"], false);
    }
}
