use std::sync::Arc;

use axum::Json;
use axum::Router;
use axum::extract::{Path, Query, State};
use axum::http::HeaderMap;
use axum::routing::{get, post};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::api::rest::require_actor;
use crate::engine::lifecycle::{self, NewDelivery};
use crate::engine::pricing::{self, Quote};
use crate::error::AppError;
use crate::models::delivery::{Delivery, DeliveryStatus, TransportMode};
use crate::state::AppState;
use crate::store::Collection;
use crate::sync::projector::{self, DeliveryBoard};

pub fn router() -> Router<Arc<AppState>> {
    Router::new()
        .route("/deliveries", post(create_delivery).get(delivery_board))
        .route("/deliveries/quote", get(quote_delivery))
        .route("/deliveries/:id", get(get_delivery))
        .route("/deliveries/:id/assign", post(assign_rider))
        .route("/deliveries/:id/status", post(advance_status))
        .route("/deliveries/:id/verify-payment", post(verify_payment))
}

#[derive(Deserialize)]
pub struct CreateDeliveryRequest {
    #[serde(default)]
    pub customer_name: String,
    #[serde(default)]
    pub customer_phone: String,
    pub pickup_address: String,
    pub dropoff_address: String,
    #[serde(default)]
    pub package_notes: Option<String>,
    pub transport_mode: TransportMode,
    #[serde(default)]
    pub vendor_id: Option<Uuid>,
}

#[derive(Deserialize)]
pub struct QuoteParams {
    pub origin: String,
    pub destination: String,
    pub mode: TransportMode,
}

#[derive(Serialize)]
pub struct QuoteResponse {
    #[serde(flatten)]
    pub quote: Quote,
    pub currency: String,
}

#[derive(Deserialize)]
pub struct AssignRequest {
    pub rider_id: Uuid,
}

#[derive(Deserialize)]
pub struct StatusRequest {
    pub status: DeliveryStatus,
}

async fn create_delivery(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Json(payload): Json<CreateDeliveryRequest>,
) -> Result<Json<Delivery>, AppError> {
    let actor = require_actor(&state, &headers)?;

    let delivery = lifecycle::create_delivery(
        &state,
        &actor,
        NewDelivery {
            customer_name: payload.customer_name,
            customer_phone: payload.customer_phone,
            pickup_address: payload.pickup_address,
            dropoff_address: payload.dropoff_address,
            package_notes: payload.package_notes,
            transport_mode: payload.transport_mode,
            vendor_id: payload.vendor_id,
        },
    )?;

    Ok(Json(delivery))
}

/// Live re-derivation while the order form is edited; nothing is persisted.
async fn quote_delivery(
    State(state): State<Arc<AppState>>,
    Query(params): Query<QuoteParams>,
) -> Json<QuoteResponse> {
    let settings = state.settings();
    let quote = pricing::quote(
        state.estimator.as_ref(),
        &settings,
        &params.origin,
        &params.destination,
        params.mode,
    );

    Json(QuoteResponse {
        quote,
        currency: settings.currency,
    })
}

async fn delivery_board(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
) -> Result<Json<DeliveryBoard>, AppError> {
    let actor = require_actor(&state, &headers)?;
    let all = state.store.all_as::<Delivery>(Collection::Deliveries)?;
    Ok(Json(projector::board(&actor, all)))
}

async fn get_delivery(
    State(state): State<Arc<AppState>>,
    Path(id): Path<Uuid>,
    headers: HeaderMap,
) -> Result<Json<Delivery>, AppError> {
    let actor = require_actor(&state, &headers)?;
    let delivery: Delivery = state.store.get_as(Collection::Deliveries, id)?;

    // Out-of-scope deliveries read as absent, not forbidden.
    if !projector::can_view(&actor, &delivery) {
        return Err(AppError::NotFound(format!("deliveries {id} not found")));
    }

    Ok(Json(delivery))
}

async fn assign_rider(
    State(state): State<Arc<AppState>>,
    Path(id): Path<Uuid>,
    headers: HeaderMap,
    Json(payload): Json<AssignRequest>,
) -> Result<Json<Delivery>, AppError> {
    let actor = require_actor(&state, &headers)?;
    lifecycle::assign_rider(&state, &actor, id, payload.rider_id).map(Json)
}

async fn advance_status(
    State(state): State<Arc<AppState>>,
    Path(id): Path<Uuid>,
    headers: HeaderMap,
    Json(payload): Json<StatusRequest>,
) -> Result<Json<Delivery>, AppError> {
    let actor = require_actor(&state, &headers)?;
    lifecycle::advance_status(&state, &actor, id, payload.status).map(Json)
}

async fn verify_payment(
    State(state): State<Arc<AppState>>,
    Path(id): Path<Uuid>,
    headers: HeaderMap,
) -> Result<Json<Delivery>, AppError> {
    let actor = require_actor(&state, &headers)?;
    lifecycle::verify_payment(&state, &actor, id).map(Json)
}
