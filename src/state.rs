use std::sync::{Arc, RwLock};
use std::time::Duration;

use crate::config::Config;
use crate::engine::assistant::Assistant;
use crate::engine::pricing::DistanceEstimator;
use crate::error::AppError;
use crate::models::identity::{Identity, Role};
use crate::models::settings::{GLOBAL_SETTINGS, SystemSettings};
use crate::observability::metrics::Metrics;
use crate::store::{Collection, MemoryStore};
use crate::sync::telemetry::FleetView;

pub struct AppState {
    pub store: MemoryStore,
    pub fleet: RwLock<FleetView>,
    pub assistant: Arc<dyn Assistant>,
    pub estimator: Arc<dyn DistanceEstimator>,
    pub assistant_timeout: Duration,
    pub metrics: Metrics,
}

impl AppState {
    pub fn new(
        assistant: Arc<dyn Assistant>,
        estimator: Arc<dyn DistanceEstimator>,
        assistant_timeout: Duration,
    ) -> Self {
        Self {
            store: MemoryStore::new(),
            fleet: RwLock::new(FleetView::default()),
            assistant,
            estimator,
            assistant_timeout,
            metrics: Metrics::new(),
        }
    }

    /// Seeds the settings singleton and the root operator account when the
    /// store starts empty.
    pub fn bootstrap(&self, config: &Config) -> Result<(), AppError> {
        if self.store.get(Collection::Settings, GLOBAL_SETTINGS).is_none() {
            let defaults = serde_json::to_value(SystemSettings::default())
                .map_err(|err| AppError::Internal(err.to_string()))?;
            self.store
                .set(Collection::Settings, GLOBAL_SETTINGS, defaults)?;
            tracing::info!("seeded default system settings");
        }

        let users = self.store.all_as::<Identity>(Collection::Users)?;
        if !users.iter().any(|u| u.role == Role::SuperAdmin) {
            let root = Identity::new(
                "Root Admin",
                config.root_phone.clone(),
                Role::SuperAdmin,
                config.root_pin.clone(),
            );
            let doc = serde_json::to_value(&root)
                .map_err(|err| AppError::Internal(err.to_string()))?;
            let id = self.store.create(Collection::Users, doc)?;
            tracing::info!(root_id = %id, "seeded root operator account");
        }

        Ok(())
    }

    /// Current settings document, falling back to defaults when unset or
    /// unreadable; pricing must not go dark because the singleton is off.
    pub fn settings(&self) -> SystemSettings {
        self.store
            .get(Collection::Settings, GLOBAL_SETTINGS)
            .and_then(|doc| serde_json::from_value(doc).ok())
            .unwrap_or_default()
    }
}
