use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Id of the single settings document in the `settings` collection.
pub const GLOBAL_SETTINGS: Uuid = Uuid::nil();

/// Global configuration record, edited as a whole via the store's one-shot
/// overwrite and consumed read-only by pricing and branding.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SystemSettings {
    pub brand_name: String,
    pub price_per_km: f64,
    pub minimum_base_price: f64,
    pub currency: String,
    pub notification_sound: String,
}

impl Default for SystemSettings {
    fn default() -> Self {
        Self {
            brand_name: "Dispatch Hub".to_string(),
            price_per_km: 150.0,
            minimum_base_price: 1500.0,
            currency: "NGN".to_string(),
            notification_sound: "chime".to_string(),
        }
    }
}
