use std::sync::Arc;

use axum::Json;
use axum::Router;
use axum::extract::{Path, State};
use axum::http::HeaderMap;
use axum::routing::{get, post};
use serde::Serialize;
use uuid::Uuid;

use crate::api::rest::require_actor;
use crate::engine::settlement::{self, SettlementReceipt};
use crate::error::AppError;
use crate::models::delivery::{Delivery, DeliveryStatus};
use crate::models::identity::{Identity, Role};
use crate::state::AppState;
use crate::store::Collection;

pub fn router() -> Router<Arc<AppState>> {
    Router::new()
        .route("/vendors/:id/performance", get(vendor_performance))
        .route("/vendors/:id/settle", post(settle_commission))
}

#[derive(Debug, Serialize)]
pub struct VendorPerformance {
    pub vendor_id: Uuid,
    pub total_orders: usize,
    pub completed_orders: usize,
    pub on_time_rate: f64,
}

fn performance_for(vendor_id: Uuid, deliveries: &[Delivery]) -> VendorPerformance {
    let own: Vec<&Delivery> = deliveries
        .iter()
        .filter(|d| d.vendor_id == Some(vendor_id))
        .collect();

    let completed: Vec<&Delivery> = own
        .iter()
        .copied()
        .filter(|d| d.status == DeliveryStatus::Delivered)
        .collect();

    let on_time = completed
        .iter()
        .filter(|d| {
            d.delivered_at.is_some_and(|delivered| {
                (delivered - d.created_at).num_minutes() <= i64::from(d.estimated_minutes)
            })
        })
        .count();

    let on_time_rate = if completed.is_empty() {
        0.0
    } else {
        on_time as f64 / completed.len() as f64
    };

    VendorPerformance {
        vendor_id,
        total_orders: own.len(),
        completed_orders: completed.len(),
        on_time_rate,
    }
}

async fn vendor_performance(
    State(state): State<Arc<AppState>>,
    Path(id): Path<Uuid>,
    headers: HeaderMap,
) -> Result<Json<VendorPerformance>, AppError> {
    let actor = require_actor(&state, &headers)?;
    if !actor.role.is_admin() && actor.id != id {
        return Err(AppError::WriteDenied(
            "vendors can only read their own performance".to_string(),
        ));
    }

    let vendor: Identity = state.store.get_as(Collection::Users, id)?;
    if vendor.role != Role::Vendor {
        return Err(AppError::ValidationFailed(
            "account is not a vendor".to_string(),
        ));
    }

    let deliveries = state.store.all_as::<Delivery>(Collection::Deliveries)?;
    Ok(Json(performance_for(id, &deliveries)))
}

async fn settle_commission(
    State(state): State<Arc<AppState>>,
    Path(id): Path<Uuid>,
    headers: HeaderMap,
) -> Result<Json<SettlementReceipt>, AppError> {
    let actor = require_actor(&state, &headers)?;
    settlement::settle(&state, &actor, id).map(Json)
}

#[cfg(test)]
mod tests {
    use chrono::{Duration, Utc};

    use super::*;
    use crate::models::delivery::{CustomerInfo, PaymentStatus, TransportMode};

    fn vendor_delivery(
        vendor_id: Uuid,
        status: DeliveryStatus,
        estimated_minutes: u32,
        took_minutes: i64,
    ) -> Delivery {
        let created_at = Utc::now() - Duration::hours(2);
        Delivery {
            id: Uuid::new_v4(),
            customer: CustomerInfo {
                id: None,
                name: "Customer".to_string(),
                phone: "0800".to_string(),
            },
            rider: None,
            vendor_id: Some(vendor_id),
            pickup_address: "A".to_string(),
            dropoff_address: "B".to_string(),
            package_notes: None,
            transport_mode: TransportMode::Bike,
            status,
            payment_status: PaymentStatus::Paid,
            price: 1500.0,
            estimated_minutes,
            created_at,
            delivered_at: (status == DeliveryStatus::Delivered)
                .then(|| created_at + Duration::minutes(took_minutes)),
            updated_at: None,
        }
    }

    #[test]
    fn on_time_rate_counts_only_completed_orders() {
        let vendor_id = Uuid::from_u128(7);
        let deliveries = vec![
            vendor_delivery(vendor_id, DeliveryStatus::Delivered, 30, 20), // on time
            vendor_delivery(vendor_id, DeliveryStatus::Delivered, 30, 45), // late
            vendor_delivery(vendor_id, DeliveryStatus::Pending, 30, 0),
            vendor_delivery(Uuid::from_u128(8), DeliveryStatus::Delivered, 30, 10),
        ];

        let perf = performance_for(vendor_id, &deliveries);
        assert_eq!(perf.total_orders, 3);
        assert_eq!(perf.completed_orders, 2);
        assert_eq!(perf.on_time_rate, 0.5);
    }

    #[test]
    fn a_vendor_with_no_completions_scores_zero() {
        let vendor_id = Uuid::from_u128(7);
        let deliveries = vec![vendor_delivery(vendor_id, DeliveryStatus::Pending, 30, 0)];

        let perf = performance_for(vendor_id, &deliveries);
        assert_eq!(perf.completed_orders, 0);
        assert_eq!(perf.on_time_rate, 0.0);
    }
}
