//! HTTP and WebSocket routes (feature `server`).
//!
//! | Route | |
//! |-------|-|
//! | `POST /api/send` | start a batch, answers at once with its id |
//! | `GET /ws` | live [`Notification`] stream |
//! | `GET /api/stats` | aggregate counters |
//! | `GET /api/history` | joined send history, newest first |
//! | `GET /api/recipients?search=` | stored recipients, optionally filtered |
//!
//! ```rust,ignore
//! let app = mailshot::server::router(AppState::new(dispatcher, broadcaster));
//! let listener = tokio::net::TcpListener::bind("0.0.0.0:8080").await?;
//! axum::serve(listener, app).await?;
//! ```

use std::sync::Arc;

use axum::{
    extract::{
        rejection::JsonRejection,
        ws::{Message, WebSocket, WebSocketUpgrade},
        Query, State,
    },
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use serde::{Deserialize, Serialize};
use tower_http::cors::CorsLayer;
use uuid::Uuid;

use crate::dispatch::{BatchRequest, Dispatcher};
use crate::error::{DispatchError, StoreError};
use crate::progress::{Broadcaster, ProgressSink};
use crate::providers::ProviderKind;

/// Shared state for every route.
#[derive(Clone)]
pub struct AppState {
    pub dispatcher: Arc<Dispatcher>,
    pub broadcaster: Broadcaster,
}

impl AppState {
    pub fn new(dispatcher: Arc<Dispatcher>, broadcaster: Broadcaster) -> Self {
        Self {
            dispatcher,
            broadcaster,
        }
    }
}

/// Envelope for command responses and errors.
#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ApiResponse {
    pub success: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub batch_id: Option<Uuid>,
}

impl ApiResponse {
    fn error(status: StatusCode, error: impl Into<String>) -> Response {
        let body = ApiResponse {
            success: false,
            message: None,
            error: Some(error.into()),
            batch_id: None,
        };
        (status, Json(body)).into_response()
    }
}

/// Build the router.
pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/api/send", post(send_batch))
        .route("/ws", get(ws_handler))
        .route("/api/stats", get(stats))
        .route("/api/history", get(history))
        .route("/api/recipients", get(recipients))
        .layer(CorsLayer::permissive())
        .with_state(state)
}

// ── Batches ─────────────────────────────────────────────────────────────

async fn send_batch(
    State(state): State<AppState>,
    payload: Result<Json<BatchRequest>, JsonRejection>,
) -> Response {
    let Json(batch) = match payload {
        Ok(batch) => batch,
        Err(rejection) => {
            tracing::debug!(error = %rejection, "Rejected batch payload");
            return ApiResponse::error(StatusCode::BAD_REQUEST, "Invalid data");
        }
    };

    let kind = match batch.provider.as_deref().map(str::trim).filter(|p| !p.is_empty()) {
        Some(provider) => match provider.parse::<ProviderKind>() {
            Ok(kind) => kind,
            Err(e) => return ApiResponse::error(StatusCode::BAD_REQUEST, e),
        },
        None => state.dispatcher.mailers().default_provider(),
    };
    if state.dispatcher.mailers().get(kind).is_none() {
        let e = DispatchError::ProviderNotRegistered(kind);
        return ApiResponse::error(StatusCode::BAD_REQUEST, e.to_string());
    }

    let sink: Arc<dyn ProgressSink> = Arc::new(state.broadcaster.clone());
    let handle = state.dispatcher.spawn(batch, sink);

    let body = ApiResponse {
        success: true,
        message: Some("Sending started".to_string()),
        error: None,
        batch_id: Some(handle.batch_id()),
    };
    (StatusCode::ACCEPTED, Json(body)).into_response()
}

// ── WebSocket ───────────────────────────────────────────────────────────

async fn ws_handler(ws: WebSocketUpgrade, State(state): State<AppState>) -> impl IntoResponse {
    ws.on_upgrade(move |socket| forward_notifications(socket, state.broadcaster))
}

async fn forward_notifications(mut socket: WebSocket, broadcaster: Broadcaster) {
    let mut subscription = broadcaster.subscribe().await;
    let id = subscription.id();
    tracing::info!(observer = id, "WebSocket observer connected");

    loop {
        tokio::select! {
            notification = subscription.recv() => {
                let Some(notification) = notification else {
                    tracing::debug!(observer = id, "Subscription closed");
                    break;
                };
                let json = match serde_json::to_string(&notification) {
                    Ok(json) => json,
                    Err(e) => {
                        tracing::warn!(error = %e, "Notification not serializable");
                        continue;
                    }
                };
                if socket.send(Message::Text(json.into())).await.is_err() {
                    tracing::debug!(observer = id, "Client disconnected during send");
                    break;
                }
            }

            incoming = socket.recv() => {
                match incoming {
                    Some(Ok(Message::Ping(data))) => {
                        if socket.send(Message::Pong(data)).await.is_err() {
                            break;
                        }
                    }
                    Some(Ok(Message::Close(_))) | None => break,
                    Some(Err(e)) => {
                        tracing::warn!(observer = id, error = %e, "WebSocket error");
                        break;
                    }
                    _ => {}
                }
            }
        }
    }

    broadcaster.unsubscribe(id).await;
    tracing::info!(observer = id, "WebSocket observer disconnected");
}

// ── Reporting ───────────────────────────────────────────────────────────

fn store_failure(e: StoreError) -> Response {
    tracing::error!(error = %e, "Reporting query failed");
    ApiResponse::error(StatusCode::INTERNAL_SERVER_ERROR, e.to_string())
}

async fn stats(State(state): State<AppState>) -> Response {
    match state.dispatcher.store().stats().await {
        Ok(stats) => Json(serde_json::json!({ "success": true, "stats": stats })).into_response(),
        Err(e) => store_failure(e),
    }
}

async fn history(State(state): State<AppState>) -> Response {
    match state.dispatcher.store().history().await {
        Ok(history) => {
            Json(serde_json::json!({ "success": true, "history": history })).into_response()
        }
        Err(e) => store_failure(e),
    }
}

#[derive(Debug, Deserialize)]
struct RecipientQuery {
    search: Option<String>,
}

async fn recipients(
    State(state): State<AppState>,
    Query(query): Query<RecipientQuery>,
) -> Response {
    let store = state.dispatcher.store();
    let result = match query.search.as_deref().map(str::trim).filter(|s| !s.is_empty()) {
        Some(fragment) => store.search_recipients(fragment).await,
        None => store.recipients().await,
    };
    match result {
        Ok(recipients) => {
            Json(serde_json::json!({ "success": true, "recipients": recipients })).into_response()
        }
        Err(e) => store_failure(e),
    }
}
