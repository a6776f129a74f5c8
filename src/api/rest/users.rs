use std::sync::Arc;

use axum::Json;
use axum::Router;
use axum::extract::{Path, State};
use axum::http::HeaderMap;
use axum::routing::{get, patch, post};
use serde::Deserialize;
use serde_json::json;
use tracing::info;
use uuid::Uuid;

use crate::api::rest::require_actor;
use crate::error::AppError;
use crate::models::delivery::TransportMode;
use crate::models::identity::{GeoPoint, Identity, RiderStatus, Role};
use crate::state::AppState;
use crate::store::Collection;
use crate::sync::telemetry::RiderMarker;

pub fn router() -> Router<Arc<AppState>> {
    Router::new()
        .route("/users/register", post(register))
        .route("/users/login", post(login))
        .route("/users", get(list_users))
        .route("/users/:id/approve", post(approve_user))
        .route("/users/:id/location", patch(update_location))
        .route("/users/:id/status", patch(update_rider_status))
        .route("/fleet/markers", get(fleet_markers))
}

#[derive(Deserialize)]
pub struct RegisterRequest {
    pub name: String,
    pub phone: String,
    pub pin: String,
    pub role: Role,
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default)]
    pub vehicle: Option<TransportMode>,
    #[serde(default)]
    pub picture: Option<String>,
}

#[derive(Deserialize)]
pub struct LoginRequest {
    pub phone: String,
    pub pin: String,
}

#[derive(Deserialize)]
pub struct UpdateLocationRequest {
    /// `null` means the device sensor is unavailable or denied; the stored
    /// location is cleared rather than defaulted.
    pub location: Option<GeoPoint>,
}

#[derive(Deserialize)]
pub struct UpdateRiderStatusRequest {
    pub rider_status: RiderStatus,
}

fn valid_pin(pin: &str) -> bool {
    (4..=6).contains(&pin.len()) && pin.chars().all(|c| c.is_ascii_digit())
}

async fn register(
    State(state): State<Arc<AppState>>,
    Json(payload): Json<RegisterRequest>,
) -> Result<Json<Identity>, AppError> {
    if payload.name.trim().is_empty() || payload.phone.trim().is_empty() {
        return Err(AppError::ValidationFailed(
            "name and phone are required".to_string(),
        ));
    }
    if !valid_pin(&payload.pin) {
        return Err(AppError::ValidationFailed(
            "PIN must be 4 to 6 digits".to_string(),
        ));
    }
    if payload.role.is_admin() {
        return Err(AppError::WriteDenied(
            "operator accounts cannot self-register".to_string(),
        ));
    }
    if payload.role == Role::Rider && payload.vehicle.is_none() {
        return Err(AppError::ValidationFailed(
            "riders must register a vehicle".to_string(),
        ));
    }

    let wanted = payload.name.trim().to_lowercase();
    let taken = state
        .store
        .all_as::<Identity>(Collection::Users)?
        .iter()
        .any(|user| user.name.trim().to_lowercase() == wanted);
    if taken {
        return Err(AppError::ValidationFailed(
            "display name already taken".to_string(),
        ));
    }

    let mut identity = Identity::new(
        payload.name.trim(),
        payload.phone.trim(),
        payload.role,
        payload.pin,
    );
    identity.email = payload.email;
    identity.vehicle = payload.vehicle;
    identity.picture = payload.picture;

    let doc = serde_json::to_value(&identity).map_err(|err| AppError::Internal(err.to_string()))?;
    identity.id = state.store.create(Collection::Users, doc)?;

    info!(user_id = %identity.id, role = ?identity.role, active = identity.active, "user registered");
    Ok(Json(identity))
}

async fn login(
    State(state): State<Arc<AppState>>,
    Json(payload): Json<LoginRequest>,
) -> Result<Json<Identity>, AppError> {
    let users = state.store.all_as::<Identity>(Collection::Users)?;
    let identity = users
        .into_iter()
        .find(|user| user.phone == payload.phone.trim() && user.pin == payload.pin)
        .ok_or_else(|| AppError::ValidationFailed("invalid phone or PIN".to_string()))?;

    if !identity.active {
        return Err(AppError::ValidationFailed(
            "account pending approval".to_string(),
        ));
    }

    Ok(Json(identity))
}

async fn list_users(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
) -> Result<Json<Vec<Identity>>, AppError> {
    let actor = require_actor(&state, &headers)?;
    if !actor.role.is_admin() {
        return Err(AppError::WriteDenied(
            "only admins can list users".to_string(),
        ));
    }

    Ok(Json(state.store.all_as(Collection::Users)?))
}

async fn approve_user(
    State(state): State<Arc<AppState>>,
    Path(id): Path<Uuid>,
    headers: HeaderMap,
) -> Result<Json<Identity>, AppError> {
    let actor = require_actor(&state, &headers)?;
    if !actor.role.is_admin() {
        return Err(AppError::WriteDenied(
            "only admins can approve accounts".to_string(),
        ));
    }

    state
        .store
        .update(Collection::Users, id, json!({ "active": true }))?;
    info!(user_id = %id, "account approved");

    state.store.get_as(Collection::Users, id).map(Json)
}

async fn update_location(
    State(state): State<Arc<AppState>>,
    Path(id): Path<Uuid>,
    headers: HeaderMap,
    Json(payload): Json<UpdateLocationRequest>,
) -> Result<Json<Identity>, AppError> {
    let actor = require_actor(&state, &headers)?;
    if actor.id != id || actor.role != Role::Rider {
        return Err(AppError::WriteDenied(
            "riders report their own location".to_string(),
        ));
    }

    state
        .store
        .update(Collection::Users, id, json!({ "location": payload.location }))?;

    state.store.get_as(Collection::Users, id).map(Json)
}

async fn update_rider_status(
    State(state): State<Arc<AppState>>,
    Path(id): Path<Uuid>,
    headers: HeaderMap,
    Json(payload): Json<UpdateRiderStatusRequest>,
) -> Result<Json<Identity>, AppError> {
    let actor = require_actor(&state, &headers)?;
    if actor.id != id || actor.role != Role::Rider {
        return Err(AppError::WriteDenied(
            "riders set their own duty status".to_string(),
        ));
    }
    if payload.rider_status == RiderStatus::OnDelivery {
        return Err(AppError::ValidationFailed(
            "OnDelivery is set by assignment, not by hand".to_string(),
        ));
    }

    state.store.update(
        Collection::Users,
        id,
        json!({ "rider_status": payload.rider_status }),
    )?;

    state.store.get_as(Collection::Users, id).map(Json)
}

async fn fleet_markers(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
) -> Result<Json<Vec<RiderMarker>>, AppError> {
    let actor = require_actor(&state, &headers)?;
    if !actor.role.is_admin() {
        return Err(AppError::WriteDenied(
            "only admins can view the fleet map".to_string(),
        ));
    }

    let markers = state
        .fleet
        .read()
        .unwrap_or_else(std::sync::PoisonError::into_inner)
        .markers();
    Ok(Json(markers))
}
