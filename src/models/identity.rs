use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::models::delivery::TransportMode;

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct GeoPoint {
    pub lat: f64,
    pub lng: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Role {
    SuperAdmin,
    Admin,
    Vendor,
    Rider,
    Customer,
}

impl Role {
    pub fn is_admin(&self) -> bool {
        matches!(self, Role::SuperAdmin | Role::Admin)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum RiderStatus {
    Available,
    OnDelivery,
    Offline,
}

/// A principal known to the system. Role-specific fields are kept flat and
/// optional so partial document merges can touch them independently.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Identity {
    pub id: Uuid,
    pub name: String,
    pub phone: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
    pub role: Role,
    pub pin: String,
    pub active: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub picture: Option<String>,

    // Vendor fields. `commission_balance` is never negative; settlement zeroes
    // it while crediting `total_withdrawn` by the same amount.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub commission_balance: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub total_withdrawn: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub commission_rate: Option<f64>,

    // Rider fields. `location: None` means the device sensor is unavailable
    // or denied, which is distinct from any default position.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub vehicle: Option<TransportMode>,
    #[serde(default)]
    pub location: Option<GeoPoint>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rider_status: Option<RiderStatus>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub updated_at: Option<DateTime<Utc>>,
}

/// Share of a delivery's price accrued to the vendor unless overridden.
pub const DEFAULT_COMMISSION_RATE: f64 = 0.10;

impl Identity {
    /// Fresh account with the role's initial field set. Vendors and riders
    /// start inactive (pending approval); customers and operators are live
    /// immediately. The store replaces the placeholder id on create.
    pub fn new(
        name: impl Into<String>,
        phone: impl Into<String>,
        role: Role,
        pin: impl Into<String>,
    ) -> Self {
        let is_vendor = role == Role::Vendor;
        let is_rider = role == Role::Rider;

        Self {
            id: Uuid::nil(),
            name: name.into(),
            phone: phone.into(),
            email: None,
            role,
            pin: pin.into(),
            active: !(is_vendor || is_rider),
            picture: None,
            commission_balance: is_vendor.then_some(0.0),
            total_withdrawn: is_vendor.then_some(0.0),
            commission_rate: is_vendor.then_some(DEFAULT_COMMISSION_RATE),
            vehicle: None,
            location: None,
            rider_status: is_rider.then_some(RiderStatus::Offline),
            updated_at: None,
        }
    }

    pub fn has_live_location(&self) -> bool {
        self.role == Role::Rider && self.location.is_some()
    }
}
