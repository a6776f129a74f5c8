use serde::Serialize;

use crate::models::delivery::TransportMode;
use crate::models::settings::SystemSettings;

/// Source of the distance estimate between two free-text addresses.
pub trait DistanceEstimator: Send + Sync {
    fn estimate_km(&self, origin: &str, destination: &str) -> f64;
}

/// Deterministic stand-in for a real geocoding/routing provider. Swapping in
/// a live provider only replaces this impl; the pricing formula stays put.
pub struct HeuristicDistanceEstimator;

impl DistanceEstimator for HeuristicDistanceEstimator {
    fn estimate_km(&self, origin: &str, destination: &str) -> f64 {
        let span = origin.trim().chars().count() + destination.trim().chars().count();
        5.0 + (span % 15) as f64
    }
}

/// Price and ETA for one delivery. Computed live while the order form is
/// edited, then frozen into the record at submission.
#[derive(Debug, Clone, Serialize)]
pub struct Quote {
    pub distance_km: f64,
    pub price: f64,
    pub estimated_minutes: u32,
}

pub fn quote(
    estimator: &dyn DistanceEstimator,
    settings: &SystemSettings,
    origin: &str,
    destination: &str,
    mode: TransportMode,
) -> Quote {
    let distance_km = estimator.estimate_km(origin, destination);
    let price = (distance_km * settings.price_per_km).max(settings.minimum_base_price);
    let estimated_minutes = (distance_km * mode.minutes_per_km()).round() as u32;

    Quote {
        distance_km,
        price,
        estimated_minutes,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn settings() -> SystemSettings {
        SystemSettings {
            price_per_km: 150.0,
            minimum_base_price: 1500.0,
            ..SystemSettings::default()
        }
    }

    #[test]
    fn short_routes_fall_back_to_the_base_price() {
        let q = quote(
            &HeuristicDistanceEstimator,
            &settings(),
            "123 Cable Point, Asaba",
            "456 Nnebisi Road, Asaba",
            TransportMode::Bike,
        );

        assert!(q.distance_km * 150.0 < 1500.0);
        assert_eq!(q.price, 1500.0);
    }

    #[test]
    fn distance_is_five_plus_length_mod_fifteen() {
        // 5 + (5 + 5) % 15 = 15 km.
        let q = quote(
            &HeuristicDistanceEstimator,
            &settings(),
            "aaaaa",
            "bbbbb",
            TransportMode::Bike,
        );

        assert_eq!(q.distance_km, 15.0);
        assert_eq!(q.price, 2250.0);
        assert_eq!(q.estimated_minutes, 38); // 15 * 2.5 = 37.5, rounded
    }

    #[test]
    fn surrounding_whitespace_does_not_change_the_quote() {
        let trimmed = quote(
            &HeuristicDistanceEstimator,
            &settings(),
            "aaaaa",
            "bbbbb",
            TransportMode::Truck,
        );
        let padded = quote(
            &HeuristicDistanceEstimator,
            &settings(),
            "  aaaaa  ",
            "\tbbbbb\n",
            TransportMode::Truck,
        );

        assert_eq!(trimmed.distance_km, padded.distance_km);
        assert_eq!(trimmed.price, padded.price);
    }

    #[test]
    fn slower_modes_stretch_the_eta() {
        let s = settings();
        let bike = quote(&HeuristicDistanceEstimator, &s, "aaaaa", "bbbbb", TransportMode::Bike);
        let truck = quote(&HeuristicDistanceEstimator, &s, "aaaaa", "bbbbb", TransportMode::Truck);
        let public = quote(
            &HeuristicDistanceEstimator,
            &s,
            "aaaaa",
            "bbbbb",
            TransportMode::PublicTransport,
        );

        assert!(bike.estimated_minutes < truck.estimated_minutes);
        assert!(truck.estimated_minutes < public.estimated_minutes);
        assert_eq!(public.estimated_minutes, 90); // 15 km * 6 min/km
    }
}
