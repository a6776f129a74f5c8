use std::sync::Arc;

use axum::Json;
use axum::Router;
use axum::extract::{Path, State};
use axum::http::HeaderMap;
use axum::routing::{get, post};
use chrono::Utc;
use serde::{Deserialize, Serialize};
use tracing::info;
use uuid::Uuid;

use crate::api::rest::require_actor;
use crate::engine::assistant::{run_assistant, wants_assistant};
use crate::error::AppError;
use crate::models::identity::{GeoPoint, Identity};
use crate::models::message::{ChatMessage, Thread};
use crate::state::AppState;
use crate::store::Collection;
use crate::sync::threads::{self, GUEST_LABEL};

pub fn router() -> Router<Arc<AppState>> {
    Router::new()
        .route("/threads", get(list_threads))
        .route("/threads/:id/messages", get(thread_messages))
        .route("/messages", post(post_message))
}

/// Who is talking: an authenticated identity, or a guest session carrying a
/// locally-generated id that doubles as its thread id.
enum Caller {
    Known(Identity),
    Guest(Uuid),
}

fn resolve_caller(state: &AppState, headers: &HeaderMap) -> Result<Caller, AppError> {
    if headers.contains_key("x-actor-id") {
        return require_actor(state, headers).map(Caller::Known);
    }

    let raw = headers
        .get("x-guest-id")
        .and_then(|value| value.to_str().ok())
        .ok_or_else(|| {
            AppError::ValidationFailed("missing x-actor-id or x-guest-id header".to_string())
        })?;
    let id = Uuid::parse_str(raw)
        .map_err(|_| AppError::ValidationFailed("malformed x-guest-id header".to_string()))?;
    Ok(Caller::Guest(id))
}

fn visible_messages(state: &AppState, caller: &Caller) -> Result<Vec<ChatMessage>, AppError> {
    let all = state.store.all_as::<ChatMessage>(Collection::Messages)?;
    let visible = match caller {
        Caller::Known(identity) if identity.role.is_admin() => all,
        Caller::Known(identity) => all
            .into_iter()
            .filter(|m| m.thread_id == identity.id)
            .collect(),
        Caller::Guest(id) => all.into_iter().filter(|m| m.thread_id == *id).collect(),
    };
    Ok(visible)
}

#[derive(Serialize)]
struct ThreadsResponse {
    threads: Vec<Thread>,
    active_thread_id: Option<Uuid>,
}

async fn list_threads(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
) -> Result<Json<ThreadsResponse>, AppError> {
    let caller = resolve_caller(&state, &headers)?;
    let visible = visible_messages(&state, &caller)?;
    let threads = threads::resolve_threads(&visible);

    let active_thread_id = match &caller {
        Caller::Known(identity) => threads::default_active_thread(identity, &threads),
        Caller::Guest(id) => Some(*id),
    };

    Ok(Json(ThreadsResponse {
        threads,
        active_thread_id,
    }))
}

async fn thread_messages(
    State(state): State<Arc<AppState>>,
    Path(id): Path<Uuid>,
    headers: HeaderMap,
) -> Result<Json<Vec<ChatMessage>>, AppError> {
    let caller = resolve_caller(&state, &headers)?;

    let allowed = match &caller {
        Caller::Known(identity) => identity.role.is_admin() || identity.id == id,
        Caller::Guest(guest_id) => *guest_id == id,
    };
    if !allowed {
        return Err(AppError::WriteDenied(
            "thread belongs to another participant".to_string(),
        ));
    }

    let all = state.store.all_as::<ChatMessage>(Collection::Messages)?;
    Ok(Json(threads::thread_messages(&all, id)))
}

#[derive(Deserialize)]
pub struct PostMessageRequest {
    pub text: String,
    /// Required for admin senders, who pick which conversation to answer;
    /// everyone else can only write into their own thread.
    #[serde(default)]
    pub thread_id: Option<Uuid>,
    #[serde(default)]
    pub location: Option<GeoPoint>,
    #[serde(default)]
    pub display_name: Option<String>,
}

async fn post_message(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Json(payload): Json<PostMessageRequest>,
) -> Result<Json<ChatMessage>, AppError> {
    if payload.text.trim().is_empty() {
        return Err(AppError::ValidationFailed(
            "message text is required".to_string(),
        ));
    }

    let caller = resolve_caller(&state, &headers)?;
    let (thread_id, sender_id, sender_name, is_admin) = match &caller {
        Caller::Known(identity) if identity.role.is_admin() => {
            let thread_id = payload.thread_id.ok_or_else(|| {
                AppError::ValidationFailed("admin replies must name a thread".to_string())
            })?;
            (thread_id, identity.id, identity.name.clone(), true)
        }
        Caller::Known(identity) => (identity.id, identity.id, identity.name.clone(), false),
        Caller::Guest(id) => (
            *id,
            *id,
            payload
                .display_name
                .as_deref()
                .map(str::trim)
                .filter(|name| !name.is_empty())
                .unwrap_or(GUEST_LABEL)
                .to_string(),
            false,
        ),
    };

    let mut message = ChatMessage {
        id: Uuid::nil(),
        thread_id,
        sender_id,
        sender_name,
        text: payload.text,
        is_admin,
        sent_at: Some(Utc::now()),
        links: Vec::new(),
    };

    // The user's message is persisted first; whatever the assistant does
    // afterwards cannot lose it.
    let doc = serde_json::to_value(&message).map_err(|err| AppError::Internal(err.to_string()))?;
    message.id = state.store.create(Collection::Messages, doc)?;
    info!(message_id = %message.id, thread_id = %thread_id, is_admin, "message posted");

    if !is_admin && wants_assistant(&message.text) {
        tokio::spawn(run_assistant(
            state.clone(),
            thread_id,
            message.text.clone(),
            payload.location,
        ));
    }

    Ok(Json(message))
}
