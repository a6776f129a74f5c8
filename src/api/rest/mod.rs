pub mod deliveries;
pub mod messages;
pub mod users;
pub mod vendors;
pub mod ws;

use std::sync::Arc;

use axum::Json;
use axum::Router;
use axum::extract::State;
use axum::http::{HeaderMap, StatusCode};
use axum::response::IntoResponse;
use axum::routing::get;
use serde::Serialize;
use tower_http::cors::CorsLayer;
use uuid::Uuid;

use crate::error::AppError;
use crate::models::identity::Identity;
use crate::models::settings::{GLOBAL_SETTINGS, SystemSettings};
use crate::state::AppState;
use crate::store::Collection;

pub fn router(state: Arc<AppState>) -> Router {
    Router::new()
        .merge(users::router())
        .merge(deliveries::router())
        .merge(vendors::router())
        .merge(messages::router())
        .route("/settings", get(get_settings).put(put_settings))
        .route("/health", get(health))
        .route("/metrics", get(metrics))
        .route("/ws", get(ws::ws_handler))
        .layer(CorsLayer::permissive())
        .with_state(state)
}

/// Resolves the acting identity from the `x-actor-id` header. Credential
/// mechanics live at login; past that point the actor id is trusted the way
/// the store's security rules would trust an authenticated uid.
pub(crate) fn require_actor(state: &AppState, headers: &HeaderMap) -> Result<Identity, AppError> {
    let raw = headers
        .get("x-actor-id")
        .and_then(|value| value.to_str().ok())
        .ok_or_else(|| AppError::ValidationFailed("missing x-actor-id header".to_string()))?;
    let id = Uuid::parse_str(raw)
        .map_err(|_| AppError::ValidationFailed("malformed x-actor-id header".to_string()))?;

    match state.store.get_as::<Identity>(Collection::Users, id) {
        Ok(identity) => Ok(identity),
        Err(AppError::NotFound(_)) => Err(AppError::WriteDenied("unknown actor".to_string())),
        Err(err) => Err(err),
    }
}

#[derive(Serialize)]
struct HealthResponse {
    status: &'static str,
    store_online: bool,
    users: usize,
    deliveries: usize,
    messages: usize,
    fleet_markers: usize,
}

async fn health(State(state): State<Arc<AppState>>) -> Json<HealthResponse> {
    let fleet_markers = state
        .fleet
        .read()
        .unwrap_or_else(std::sync::PoisonError::into_inner)
        .len();

    Json(HealthResponse {
        status: if state.store.is_online() { "ok" } else { "degraded" },
        store_online: state.store.is_online(),
        users: state.store.count(Collection::Users),
        deliveries: state.store.count(Collection::Deliveries),
        messages: state.store.count(Collection::Messages),
        fleet_markers,
    })
}

async fn metrics(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    match state.metrics.encode() {
        Ok(body) => (
            StatusCode::OK,
            [("content-type", "text/plain; version=0.0.4; charset=utf-8")],
            body,
        )
            .into_response(),
        Err(err) => (StatusCode::INTERNAL_SERVER_ERROR, err).into_response(),
    }
}

async fn get_settings(State(state): State<Arc<AppState>>) -> Json<SystemSettings> {
    Json(state.settings())
}

/// Full overwrite of the settings singleton; partial edits are not a thing
/// for this document, the form saves it whole.
async fn put_settings(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Json(payload): Json<SystemSettings>,
) -> Result<Json<SystemSettings>, AppError> {
    let actor = require_actor(&state, &headers)?;
    if !actor.role.is_admin() {
        return Err(AppError::WriteDenied(
            "only admins can edit settings".to_string(),
        ));
    }

    if payload.price_per_km <= 0.0 || payload.minimum_base_price < 0.0 {
        return Err(AppError::ValidationFailed(
            "pricing parameters must be positive".to_string(),
        ));
    }

    let doc = serde_json::to_value(&payload).map_err(|err| AppError::Internal(err.to_string()))?;
    state.store.set(Collection::Settings, GLOBAL_SETTINGS, doc)?;

    Ok(Json(state.settings()))
}
