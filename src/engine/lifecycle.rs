use chrono::Utc;
use serde_json::json;
use tracing::{info, warn};
use uuid::Uuid;

use crate::engine::pricing;
use crate::error::AppError;
use crate::models::delivery::{
    CustomerInfo, Delivery, DeliveryStatus, PaymentStatus, RiderSnapshot, TransportMode,
};
use crate::models::identity::{Identity, RiderStatus, Role};
use crate::state::AppState;
use crate::store::Collection;

/// Order form contents for a new delivery. Customer fields are ignored when
/// the actor is a customer (their own identity is stamped instead).
#[derive(Debug)]
pub struct NewDelivery {
    pub customer_name: String,
    pub customer_phone: String,
    pub pickup_address: String,
    pub dropoff_address: String,
    pub package_notes: Option<String>,
    pub transport_mode: TransportMode,
    pub vendor_id: Option<Uuid>,
}

fn status_label(status: DeliveryStatus) -> &'static str {
    match status {
        DeliveryStatus::Pending => "Pending",
        DeliveryStatus::Assigned => "Assigned",
        DeliveryStatus::PickedUp => "PickedUp",
        DeliveryStatus::InTransit => "InTransit",
        DeliveryStatus::Delivered => "Delivered",
        DeliveryStatus::Failed => "Failed",
    }
}

pub fn create_delivery(
    state: &AppState,
    actor: &Identity,
    new: NewDelivery,
) -> Result<Delivery, AppError> {
    if actor.role == Role::Rider {
        return Err(AppError::WriteDenied(
            "riders cannot create deliveries".to_string(),
        ));
    }
    if new.pickup_address.trim().is_empty() || new.dropoff_address.trim().is_empty() {
        return Err(AppError::ValidationFailed(
            "pickup and dropoff addresses are required".to_string(),
        ));
    }

    let customer = if actor.role == Role::Customer {
        CustomerInfo {
            id: Some(actor.id),
            name: actor.name.clone(),
            phone: actor.phone.clone(),
        }
    } else {
        if new.customer_name.trim().is_empty() || new.customer_phone.trim().is_empty() {
            return Err(AppError::ValidationFailed(
                "customer name and phone are required".to_string(),
            ));
        }
        CustomerInfo {
            id: None,
            name: new.customer_name.clone(),
            phone: new.customer_phone.clone(),
        }
    };

    let vendor_id = if actor.role == Role::Vendor {
        Some(actor.id)
    } else {
        new.vendor_id
    };

    // Quoted against the live settings and frozen into the record; later
    // settings edits never reprice an existing delivery.
    let settings = state.settings();
    let quote = pricing::quote(
        state.estimator.as_ref(),
        &settings,
        &new.pickup_address,
        &new.dropoff_address,
        new.transport_mode,
    );

    let mut delivery = Delivery {
        id: Uuid::nil(),
        customer,
        rider: None,
        vendor_id,
        pickup_address: new.pickup_address,
        dropoff_address: new.dropoff_address,
        package_notes: new.package_notes,
        transport_mode: new.transport_mode,
        status: DeliveryStatus::Pending,
        payment_status: PaymentStatus::Unpaid,
        price: quote.price,
        estimated_minutes: quote.estimated_minutes,
        created_at: Utc::now(),
        delivered_at: None,
        updated_at: None,
    };

    let doc = serde_json::to_value(&delivery).map_err(|err| AppError::Internal(err.to_string()))?;
    delivery.id = state.store.create(Collection::Deliveries, doc)?;
    state.metrics.deliveries_created_total.inc();

    info!(delivery_id = %delivery.id, price = delivery.price, "delivery created");
    Ok(delivery)
}

/// Admin-only `Pending -> Assigned`. Embeds a snapshot of the rider's
/// identity fields; the snapshot is never refreshed afterwards.
pub fn assign_rider(
    state: &AppState,
    actor: &Identity,
    delivery_id: Uuid,
    rider_id: Uuid,
) -> Result<Delivery, AppError> {
    if !actor.role.is_admin() {
        return Err(AppError::WriteDenied(
            "only admins can assign riders".to_string(),
        ));
    }

    let delivery: Delivery = state.store.get_as(Collection::Deliveries, delivery_id)?;
    if delivery.status != DeliveryStatus::Pending {
        return Err(AppError::IllegalTransition {
            from: delivery.status,
            to: DeliveryStatus::Assigned,
        });
    }

    let rider: Identity = state.store.get_as(Collection::Users, rider_id)?;
    if rider.role != Role::Rider {
        return Err(AppError::ValidationFailed(
            "assignee is not a rider".to_string(),
        ));
    }
    if !rider.active {
        return Err(AppError::ValidationFailed(
            "rider is pending approval".to_string(),
        ));
    }

    let snapshot = RiderSnapshot {
        id: rider.id,
        name: rider.name.clone(),
        phone: rider.phone.clone(),
        picture: rider.picture.clone(),
    };
    state.store.update(
        Collection::Deliveries,
        delivery_id,
        json!({ "status": DeliveryStatus::Assigned, "rider": snapshot }),
    )?;
    state.store.update(
        Collection::Users,
        rider_id,
        json!({ "rider_status": RiderStatus::OnDelivery }),
    )?;

    state
        .metrics
        .status_transitions_total
        .with_label_values(&["Assigned"])
        .inc();
    info!(delivery_id = %delivery_id, rider_id = %rider_id, "rider assigned");

    state.store.get_as(Collection::Deliveries, delivery_id)
}

/// Validates and applies a status mutation. Transition legality lives here,
/// not in whatever surface happens to issue the request.
pub fn advance_status(
    state: &AppState,
    actor: &Identity,
    delivery_id: Uuid,
    requested: DeliveryStatus,
) -> Result<Delivery, AppError> {
    let delivery: Delivery = state.store.get_as(Collection::Deliveries, delivery_id)?;
    let current = delivery.status;

    match requested {
        DeliveryStatus::Failed => {
            if !actor.role.is_admin() {
                return Err(AppError::WriteDenied(
                    "only admins can mark a delivery failed".to_string(),
                ));
            }
            if current.is_terminal() {
                return Err(AppError::IllegalTransition {
                    from: current,
                    to: requested,
                });
            }
            state.store.update(
                Collection::Deliveries,
                delivery_id,
                json!({ "status": DeliveryStatus::Failed }),
            )?;
            release_rider(state, &delivery)?;
        }
        DeliveryStatus::PickedUp | DeliveryStatus::InTransit | DeliveryStatus::Delivered => {
            let assigned = delivery.rider.as_ref().ok_or(AppError::IllegalTransition {
                from: current,
                to: requested,
            })?;
            if actor.id != assigned.id {
                return Err(AppError::WriteDenied(
                    "only the assigned rider can advance this delivery".to_string(),
                ));
            }
            if current.next_forward() != Some(requested) {
                return Err(AppError::IllegalTransition {
                    from: current,
                    to: requested,
                });
            }

            if requested == DeliveryStatus::Delivered {
                state.store.update(
                    Collection::Deliveries,
                    delivery_id,
                    json!({ "status": requested, "delivered_at": Utc::now() }),
                )?;
                release_rider(state, &delivery)?;
                accrue_commission(state, &delivery);
            } else {
                state.store.update(
                    Collection::Deliveries,
                    delivery_id,
                    json!({ "status": requested }),
                )?;
            }
        }
        DeliveryStatus::Pending | DeliveryStatus::Assigned => {
            return Err(AppError::IllegalTransition {
                from: current,
                to: requested,
            });
        }
    }

    state
        .metrics
        .status_transitions_total
        .with_label_values(&[status_label(requested)])
        .inc();
    info!(delivery_id = %delivery_id, from = status_label(current), to = status_label(requested), "delivery status changed");

    state.store.get_as(Collection::Deliveries, delivery_id)
}

/// Admin payment verification. `Unpaid -> Paid` only; re-verifying a paid
/// delivery is a no-op rather than an error.
pub fn verify_payment(
    state: &AppState,
    actor: &Identity,
    delivery_id: Uuid,
) -> Result<Delivery, AppError> {
    if !actor.role.is_admin() {
        return Err(AppError::WriteDenied(
            "only admins can verify payment".to_string(),
        ));
    }

    let delivery: Delivery = state.store.get_as(Collection::Deliveries, delivery_id)?;
    if delivery.payment_status == PaymentStatus::Paid {
        return Ok(delivery);
    }

    state.store.update(
        Collection::Deliveries,
        delivery_id,
        json!({ "payment_status": PaymentStatus::Paid }),
    )?;
    info!(delivery_id = %delivery_id, "payment verified");

    state.store.get_as(Collection::Deliveries, delivery_id)
}

fn release_rider(state: &AppState, delivery: &Delivery) -> Result<(), AppError> {
    let Some(rider) = &delivery.rider else {
        return Ok(());
    };
    match state.store.update(
        Collection::Users,
        rider.id,
        json!({ "rider_status": RiderStatus::Available }),
    ) {
        Ok(()) => Ok(()),
        Err(AppError::NotFound(_)) => {
            warn!(rider_id = %rider.id, "assigned rider record no longer exists");
            Ok(())
        }
        Err(err) => Err(err),
    }
}

/// Credits the vendor's commission for a completed delivery via an atomic
/// increment. Failures are logged, not propagated; the delivery is already
/// delivered and the balance can be corrected out of band.
fn accrue_commission(state: &AppState, delivery: &Delivery) {
    let Some(vendor_id) = delivery.vendor_id else {
        return;
    };

    let vendor: Identity = match state.store.get_as(Collection::Users, vendor_id) {
        Ok(vendor) => vendor,
        Err(err) => {
            warn!(error = %err, vendor_id = %vendor_id, "commission accrual skipped");
            return;
        }
    };

    let rate = vendor.commission_rate.unwrap_or(0.0);
    if rate <= 0.0 {
        return;
    }

    let commission = delivery.price * rate;
    match state
        .store
        .increment(Collection::Users, vendor_id, "commission_balance", commission)
    {
        Ok(balance) => {
            info!(vendor_id = %vendor_id, commission, balance, "vendor commission accrued");
        }
        Err(err) => {
            warn!(error = %err, vendor_id = %vendor_id, "commission accrual failed");
        }
    }
}
