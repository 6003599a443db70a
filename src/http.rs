//! HTTP server for the read API and Prometheus metrics endpoint.
//!
//! Runs on a separate tokio task. Serves room history, live presence, and
//! notification queries against the same room-key resolver the WebSocket
//! handlers use, plus `/metrics` for Prometheus scraping.

use crate::db::{Database, DbError, MessageRecord, NotificationRecord};
use crate::error::HandlerError;
use crate::rooms;
use crate::state::SessionRegistry;
use axum::extract::{Query, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use serde::Deserialize;
use serde_json::json;
use std::net::SocketAddr;
use std::sync::Arc;

/// Cap on rows returned by the message history route.
const MESSAGE_LIMIT: i64 = 200;
/// Cap on rows returned by the notification list route.
const NOTIFICATION_LIMIT: i64 = 50;

/// Shared state for the API handlers.
#[derive(Clone)]
pub struct ApiState {
    registry: Arc<SessionRegistry>,
    db: Database,
}

impl ApiState {
    pub fn new(registry: Arc<SessionRegistry>, db: Database) -> Self {
        Self { registry, db }
    }
}

/// API errors, surfaced as JSON bodies.
enum ApiError {
    BadRequest(String),
    Internal(DbError),
}

impl From<HandlerError> for ApiError {
    fn from(err: HandlerError) -> Self {
        Self::BadRequest(err.to_string())
    }
}

impl From<DbError> for ApiError {
    fn from(err: DbError) -> Self {
        Self::Internal(err)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        match self {
            Self::BadRequest(message) => {
                (StatusCode::BAD_REQUEST, Json(json!({ "error": message }))).into_response()
            }
            Self::Internal(err) => {
                tracing::error!(error = %err, "Storage error serving API request");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    Json(json!({ "error": "internal storage error" })),
                )
                    .into_response()
            }
        }
    }
}

fn default_room_type() -> String {
    rooms::KIND_GROUP.to_string()
}

/// Room addressing query parameters, mirroring the WebSocket events.
#[derive(Debug, Deserialize)]
struct RoomQuery {
    #[serde(default = "default_room_type")]
    room_type: String,
    room_name: Option<String>,
    user: Option<String>,
    target: Option<String>,
}

impl RoomQuery {
    fn resolve(&self) -> Result<String, ApiError> {
        Ok(rooms::room_key(
            &self.room_type,
            self.room_name.as_deref(),
            self.user.as_deref(),
            self.target.as_deref(),
        )?)
    }
}

#[derive(Debug, Deserialize)]
struct UserQuery {
    user: Option<String>,
}

#[derive(Debug, Deserialize)]
struct MarkReadBody {
    user: Option<String>,
    #[serde(default)]
    notification_ids: Vec<i64>,
}

/// Handler for GET /api/messages - room history, oldest first.
async fn get_messages(
    State(state): State<ApiState>,
    Query(query): Query<RoomQuery>,
) -> Result<Json<Vec<MessageRecord>>, ApiError> {
    let key = query.resolve()?;
    let messages = state.db.messages().list_for_room(&key, MESSAGE_LIMIT).await?;
    Ok(Json(messages))
}

/// Handler for GET /api/room_users - live presence for a room.
async fn get_room_users(
    State(state): State<ApiState>,
    Query(query): Query<RoomQuery>,
) -> Result<Json<serde_json::Value>, ApiError> {
    let key = query.resolve()?;
    let users = state.registry.members_of(&key);
    Ok(Json(json!({ "users": users })))
}

/// Handler for GET /api/notifications - a user's notifications, newest first.
async fn get_notifications(
    State(state): State<ApiState>,
    Query(query): Query<UserQuery>,
) -> Result<Json<Vec<NotificationRecord>>, ApiError> {
    let user = query
        .user
        .filter(|u| !u.is_empty())
        .ok_or_else(|| ApiError::BadRequest("user parameter required".to_string()))?;
    let notifications = state
        .db
        .notifications()
        .list_for_user(&user, NOTIFICATION_LIMIT)
        .await?;
    Ok(Json(notifications))
}

/// Handler for POST /api/notifications/read - bulk or targeted mark-read.
async fn mark_notifications_read(
    State(state): State<ApiState>,
    Json(body): Json<MarkReadBody>,
) -> Result<Json<serde_json::Value>, ApiError> {
    let user = body
        .user
        .filter(|u| !u.is_empty())
        .ok_or_else(|| ApiError::BadRequest("user parameter required".to_string()))?;
    let updated = state
        .db
        .notifications()
        .mark_read(&user, Some(&body.notification_ids))
        .await?;
    Ok(Json(json!({ "updated": updated })))
}

/// Handler for GET /metrics - returns Prometheus metrics in text format.
async fn metrics_handler() -> String {
    crate::metrics::gather_metrics()
}

fn router(state: ApiState) -> Router {
    Router::new()
        .route("/api/messages", get(get_messages))
        .route("/api/room_users", get(get_room_users))
        .route("/api/notifications", get(get_notifications))
        .route("/api/notifications/read", post(mark_notifications_read))
        .route("/metrics", get(metrics_handler))
        .with_state(state)
}

/// Run the HTTP server for the read API.
///
/// This is a long-running task that should be spawned in the background.
pub async fn run_http_server(addr: SocketAddr, state: ApiState) {
    let app = router(state);

    tracing::info!("HTTP API listening on {}", addr);

    let listener = match tokio::net::TcpListener::bind(&addr).await {
        Ok(listener) => listener,
        Err(e) => {
            tracing::error!("Failed to bind HTTP server on {}: {}", addr, e);
            return;
        }
    };

    if let Err(e) = axum::serve(listener, app).await {
        tracing::error!("HTTP server error: {}", e);
    }
}
