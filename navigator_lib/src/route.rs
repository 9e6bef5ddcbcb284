use serde::{Deserialize, Serialize};

use crate::coordinate::Coordinate;

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct RouteRequest {
    pub from: Coordinate,
    pub to: Coordinate,
}

/// Routed path to the current target. Display and ETA only; arrival and proximity
/// always use the direct haversine distance.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Route {
    pub geometry: Vec<Coordinate>,
    pub distance_m: f64,
    pub duration_s: f64,
}

impl Route {
    pub fn new(geometry: Vec<Coordinate>, distance_m: f64, duration_s: f64) -> Self {
        Self {
            geometry,
            distance_m,
            duration_s,
        }
    }

    pub fn distance_km(&self) -> f64 {
        self.distance_m / 1000.
    }

    pub fn eta_minutes(&self) -> u64 {
        (self.duration_s / 60.).round().max(0.) as u64
    }
}

#[test]
fn eta_rounds_to_minutes() {
    let route = Route::new(Vec::new(), 2_345., 150.);
    assert_eq!(route.eta_minutes(), 3);
    assert!((route.distance_km() - 2.345).abs() < 1e-9);
}
