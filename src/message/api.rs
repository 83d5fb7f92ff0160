//! Message REST API handlers.
//!
//! - `GET    /messages`            — all stored messages
//! - `POST   /message`             — submit, enrich, store, notify
//! - `DELETE /message/:id`         — delete (idempotent)
//! - `POST   /abandoned-message`   — record a captured draft
//! - `GET    /abandoned-messages`  — all captured drafts

use std::net::SocketAddr;

use axum::{
    extract::{ConnectInfo, Path, State},
    http::{HeaderMap, StatusCode},
    response::IntoResponse,
    routing::{delete, get, post},
    Json, Router,
};
use chrono::{SecondsFormat, Utc};
use serde::Deserialize;
use serde_json::{json, Value};

use super::types::{AbandonReason, AbandonedMessage, Coordinates, Message};
use crate::state::AppState;

// ── Request Types ─────────────────────────────────────────────────────────

/// POST /message
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PostMessageRequest {
    pub message: String,
    pub coordinates: Option<Coordinates>,
    pub share_tag: Option<String>,
    pub time_on_page: Option<Value>,
    pub click_patterns: Option<Value>,
    pub text_history: Option<Value>,
}

/// POST /abandoned-message
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PostAbandonedRequest {
    pub partial_message: String,
    pub reason: Option<AbandonReason>,
    pub coordinates: Option<Coordinates>,
    pub share_tag: Option<String>,
    pub time_on_page: Option<Value>,
    pub click_patterns: Option<Value>,
    pub text_history: Option<Value>,
}

// ── Router ────────────────────────────────────────────────────────────────

pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/messages", get(list_messages))
        .route("/message", post(post_message))
        .route("/message/:id", delete(delete_message))
        .route("/abandoned-messages", get(list_abandoned))
        .route("/abandoned-message", post(post_abandoned))
}

// ── Handlers ──────────────────────────────────────────────────────────────

/// GET /messages — all messages in storage order (clients re-sort by
/// timestamp for display).
async fn list_messages(State(state): State<AppState>) -> impl IntoResponse {
    Json(state.store.list_all())
}

/// POST /message — validate, enrich, store, respond, notify.
///
/// The notification is enqueued after the record is stored and is never
/// awaited; the 201 goes out regardless of delivery.
async fn post_message(
    State(state): State<AppState>,
    ConnectInfo(addr): ConnectInfo<SocketAddr>,
    headers: HeaderMap,
    Json(req): Json<PostMessageRequest>,
) -> impl IntoResponse {
    let content = req.message.trim();
    if content.is_empty() {
        return (
            StatusCode::BAD_REQUEST,
            Json(json!({ "error": "Message content is required" })),
        )
            .into_response();
    }

    let enrichment = state
        .pipeline
        .enrich(&headers, addr.ip(), req.coordinates)
        .await;

    let now = Utc::now();
    let mut message = Message::compose(
        now.timestamp_millis(),
        now.to_rfc3339_opts(SecondsFormat::Millis, true),
        content,
        enrichment,
    );
    message.share_tag = req.share_tag;
    message.time_on_page = req.time_on_page;
    message.click_patterns = req.click_patterns;
    message.text_history = req.text_history;

    state.store.append(message.clone());
    state.notifier.notify_message(&message);

    (StatusCode::CREATED, Json(message)).into_response()
}

/// DELETE /message/:id — succeeds whether or not the id existed.
async fn delete_message(
    State(state): State<AppState>,
    Path(id): Path<i64>,
) -> impl IntoResponse {
    state.store.delete_by_id(id);
    Json(json!({ "success": true }))
}

/// GET /abandoned-messages — all captured drafts.
async fn list_abandoned(State(state): State<AppState>) -> impl IntoResponse {
    Json(state.store.list_abandoned())
}

/// POST /abandoned-message — record a draft the visitor walked away from.
/// Drafts below the configured minimum length are acknowledged but skipped.
async fn post_abandoned(
    State(state): State<AppState>,
    ConnectInfo(addr): ConnectInfo<SocketAddr>,
    headers: HeaderMap,
    Json(req): Json<PostAbandonedRequest>,
) -> impl IntoResponse {
    let partial = req.partial_message.trim();
    if partial.chars().count() < state.config.min_abandoned_chars {
        return (StatusCode::OK, Json(json!({ "skipped": true }))).into_response();
    }

    let enrichment = state
        .pipeline
        .enrich(&headers, addr.ip(), req.coordinates)
        .await;

    let now = Utc::now();
    let mut draft = AbandonedMessage::compose(
        now.timestamp_millis(),
        now.to_rfc3339_opts(SecondsFormat::Millis, true),
        partial,
        req.reason.unwrap_or_default(),
        enrichment,
    );
    draft.share_tag = req.share_tag;
    draft.time_on_page = req.time_on_page;
    draft.click_patterns = req.click_patterns;
    draft.text_history = req.text_history;

    state.store.append_abandoned(draft.clone());
    state.notifier.notify_abandoned(&draft);

    (StatusCode::CREATED, Json(draft)).into_response()
}

// ── Tests ─────────────────────────────────────────────────────────────────
