use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Canonical delivery lifecycle states. Historical data carried the synonyms
/// `InProgress` and `Completed`; they are accepted on decode and collapsed
/// here, and only canonical values are ever written back.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum DeliveryStatus {
    Pending,
    Assigned,
    PickedUp,
    #[serde(alias = "InProgress")]
    InTransit,
    #[serde(alias = "Completed")]
    Delivered,
    Failed,
}

impl DeliveryStatus {
    pub fn is_terminal(&self) -> bool {
        matches!(self, DeliveryStatus::Delivered | DeliveryStatus::Failed)
    }

    /// The single next state along the rider's forward track, if any.
    pub fn next_forward(&self) -> Option<DeliveryStatus> {
        match self {
            DeliveryStatus::Assigned => Some(DeliveryStatus::PickedUp),
            DeliveryStatus::PickedUp => Some(DeliveryStatus::InTransit),
            DeliveryStatus::InTransit => Some(DeliveryStatus::Delivered),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum PaymentStatus {
    Unpaid,
    Paid,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum TransportMode {
    Bike,
    Truck,
    PublicTransport,
}

impl TransportMode {
    /// Minutes-per-kilometre multiplier used for the frozen ETA.
    pub fn minutes_per_km(&self) -> f64 {
        match self {
            TransportMode::Bike => 2.5,
            TransportMode::Truck => 4.0,
            TransportMode::PublicTransport => 6.0,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CustomerInfo {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<Uuid>,
    pub name: String,
    pub phone: String,
}

/// Copy of the rider's identity fields taken at assignment time. Deliberately
/// not a live reference: later edits to the rider record do not flow back.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RiderSnapshot {
    pub id: Uuid,
    pub name: String,
    pub phone: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub picture: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Delivery {
    pub id: Uuid,
    pub customer: CustomerInfo,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rider: Option<RiderSnapshot>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub vendor_id: Option<Uuid>,
    pub pickup_address: String,
    pub dropoff_address: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub package_notes: Option<String>,
    pub transport_mode: TransportMode,
    pub status: DeliveryStatus,
    pub payment_status: PaymentStatus,
    pub price: f64,
    pub estimated_minutes: u32,
    pub created_at: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub delivered_at: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub updated_at: Option<DateTime<Utc>>,
}
