use std::collections::HashMap;
use std::sync::Arc;

use serde::Serialize;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::models::delivery::TransportMode;
use crate::models::identity::{GeoPoint, Identity, RiderStatus};
use crate::state::AppState;
use crate::store::Collection;
use crate::store::diff::SetDiff;

/// One live map marker.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RiderMarker {
    pub rider_id: Uuid,
    pub name: String,
    pub location: GeoPoint,
    pub status: RiderStatus,
    pub vehicle: Option<TransportMode>,
}

impl RiderMarker {
    pub fn from_identity(identity: &Identity) -> Option<Self> {
        if !identity.has_live_location() {
            return None;
        }
        Some(Self {
            rider_id: identity.id,
            name: identity.name.clone(),
            location: identity.location?,
            status: identity.rider_status.unwrap_or(RiderStatus::Offline),
            vehicle: identity.vehicle,
        })
    }
}

#[derive(Debug, Default)]
pub struct ReconcileSummary {
    pub added: usize,
    pub moved: usize,
    pub removed: usize,
}

impl ReconcileSummary {
    pub fn is_noop(&self) -> bool {
        self.added == 0 && self.moved == 0 && self.removed == 0
    }
}

/// Keyed view of the fleet's live markers. Each incoming batch is the full
/// current result set of the location query, so reconciliation always
/// converges the key set to exactly the batch's members: the latest snapshot
/// wins outright, with no per-rider staleness comparison.
#[derive(Debug, Default)]
pub struct FleetView {
    markers: HashMap<Uuid, RiderMarker>,
}

impl FleetView {
    pub fn reconcile(&mut self, batch: &[RiderMarker]) -> ReconcileSummary {
        let diff = SetDiff::between(
            &self.markers,
            batch,
            |m| m.rider_id,
            |old, new| old != new,
        );

        let summary = ReconcileSummary {
            added: diff.added.len(),
            moved: diff.updated.len(),
            removed: diff.removed.len(),
        };

        for id in &diff.removed {
            self.markers.remove(id);
        }
        for marker in batch {
            self.markers.insert(marker.rider_id, marker.clone());
        }

        summary
    }

    /// Markers ordered by rider id for deterministic output.
    pub fn markers(&self) -> Vec<RiderMarker> {
        let mut all: Vec<RiderMarker> = self.markers.values().cloned().collect();
        all.sort_by_key(|m| m.rider_id);
        all
    }

    pub fn len(&self) -> usize {
        self.markers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.markers.is_empty()
    }
}

/// Background consumer of the rider-location feed. Runs for the life of the
/// process; every delivered set is safe to re-apply.
pub async fn run_fleet_telemetry(state: Arc<AppState>) {
    let mut sub = state.store.subscribe(Collection::Users, |doc| {
        serde_json::from_value::<Identity>(doc.clone())
            .map(|user| user.has_live_location())
            .unwrap_or(false)
    });

    info!("fleet telemetry synchronizer started");

    loop {
        let batch: Vec<RiderMarker> = sub
            .latest()
            .into_iter()
            .filter_map(|doc| serde_json::from_value::<Identity>(doc).ok())
            .filter_map(|user| RiderMarker::from_identity(&user))
            .collect();

        let (summary, total) = {
            let mut fleet = state
                .fleet
                .write()
                .unwrap_or_else(std::sync::PoisonError::into_inner);
            let summary = fleet.reconcile(&batch);
            (summary, fleet.len())
        };

        state.metrics.fleet_markers.set(total as i64);
        if !summary.is_noop() {
            debug!(
                added = summary.added,
                moved = summary.moved,
                removed = summary.removed,
                total,
                "fleet markers reconciled"
            );
        }

        if sub.changed().await.is_err() {
            break;
        }
    }

    warn!("fleet telemetry synchronizer stopped: location feed closed");
}
