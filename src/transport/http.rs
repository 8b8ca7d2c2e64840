//! HTTP control surface
//!
//! Topic management and introspection endpoints, served by the same router
//! as the `/ws` upgrade:
//!
//! - `POST   /topics`         - create a topic
//! - `DELETE /topics/{name}`  - delete a topic, evicting its subscribers
//! - `GET    /topics`         - list topics with subscriber counts
//! - `GET    /health`         - uptime and aggregate counts
//! - `GET    /stats`          - per-topic message and subscriber counters
//! - `GET    /subscriptions`  - per-client and per-topic subscription state

use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::{delete, get, post};
use axum::{Json, Router};
use serde::{Deserialize, Serialize};
use serde_json::json;
use std::sync::Arc;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

use crate::broker::engine::TopicInfo;
use crate::broker::Broker;
use crate::transport::websocket;

/// Shared state handed to every handler.
#[derive(Clone)]
pub struct AppState {
    pub broker: Arc<Broker>,
}

#[derive(Debug, Deserialize)]
pub struct CreateTopicRequest {
    pub name: String,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct TopicActionResponse {
    pub status: String,
    pub topic: String,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct TopicsResponse {
    pub topics: Vec<TopicInfo>,
}

/// Builds the application router serving both the control surface and the
/// WebSocket endpoint. CORS is permissive and requests are traced at the
/// HTTP layer.
pub fn build_router(broker: Arc<Broker>) -> Router {
    Router::new()
        .route("/ws", get(websocket::ws_handler))
        .route("/topics", post(create_topic).get(list_topics))
        .route("/topics/{name}", delete(delete_topic))
        .route("/health", get(health))
        .route("/stats", get(stats))
        .route("/subscriptions", get(subscriptions))
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(AppState { broker })
}

async fn create_topic(
    State(state): State<AppState>,
    Json(req): Json<CreateTopicRequest>,
) -> Response {
    if req.name.is_empty() {
        return (
            StatusCode::BAD_REQUEST,
            Json(json!({ "error": "topic name is required" })),
        )
            .into_response();
    }

    match state.broker.create_topic(&req.name) {
        Ok(()) => (
            StatusCode::CREATED,
            Json(TopicActionResponse {
                status: "created".to_string(),
                topic: req.name,
            }),
        )
            .into_response(),
        Err(_) => (
            StatusCode::CONFLICT,
            Json(TopicActionResponse {
                status: "exists".to_string(),
                topic: req.name,
            }),
        )
            .into_response(),
    }
}

async fn delete_topic(State(state): State<AppState>, Path(name): Path<String>) -> Response {
    match state.broker.delete_topic(&name) {
        Ok(()) => (
            StatusCode::OK,
            Json(TopicActionResponse {
                status: "deleted".to_string(),
                topic: name,
            }),
        )
            .into_response(),
        Err(_) => (
            StatusCode::NOT_FOUND,
            Json(json!({ "error": "Topic not found" })),
        )
            .into_response(),
    }
}

async fn list_topics(State(state): State<AppState>) -> Json<TopicsResponse> {
    Json(TopicsResponse {
        topics: state.broker.topics(),
    })
}

async fn health(State(state): State<AppState>) -> impl IntoResponse {
    Json(state.broker.health())
}

async fn stats(State(state): State<AppState>) -> impl IntoResponse {
    Json(state.broker.stats())
}

async fn subscriptions(State(state): State<AppState>) -> impl IntoResponse {
    Json(state.broker.subscriptions())
}
