use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};

use crate::{
    coordinate::Position,
    itinerary::{Itinerary, Stop, StopId},
    route::Route,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum NavigationState {
    Idle,
    Active,
    Completed,
}

/// Ephemeral, per-run navigation state. Indexes into an itinerary it does not own.
#[derive(Debug, Clone, PartialEq)]
pub struct NavigationSession {
    /// Bumped on every stop. Results from an older epoch are ignored.
    pub epoch: u64,
    pub cursor: StopId,
    pub position: Option<Position>,
    pub route: Option<Route>,
    pub notified: BTreeSet<StopId>,
    /// Cursor whose arrival has been announced and whose advance timer is running.
    pub pending_advance: Option<StopId>,
}

impl Default for NavigationSession {
    fn default() -> Self {
        Self {
            epoch: 0,
            cursor: StopId(0),
            position: None,
            route: None,
            notified: BTreeSet::new(),
            pending_advance: None,
        }
    }
}

impl NavigationSession {
    /// Everything except the last known position and the epoch goes back to defaults.
    pub fn reset(&mut self) {
        self.epoch += 1;
        self.cursor = StopId(0);
        self.route = None;
        self.notified.clear();
        self.pending_advance = None;
    }

    pub fn target<'a>(&self, itinerary: &'a Itinerary) -> Option<&'a Stop> {
        itinerary.stop(self.cursor)
    }

    /// Direct distance from the last fix to the current target.
    pub fn distance_to_target(&self, itinerary: &Itinerary) -> Option<f64> {
        let position = self.position?;
        let stop = self.target(itinerary)?;
        Some(position.coordinate.distance_to(&stop.coordinate))
    }
}

/// Read-only view published to the display surface after every event.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NavigationSnapshot {
    pub state: NavigationState,
    pub trip_id: String,
    pub district: String,
    pub cursor: usize,
    pub stop_count: usize,
    pub current_stop: Option<Stop>,
    pub day: Option<String>,
    pub position: Option<Position>,
    pub route: Option<Route>,
    pub eta_minutes: Option<u64>,
    pub route_distance_km: Option<f64>,
    pub distance_to_stop_m: Option<f64>,
    pub notified: Vec<usize>,
}

impl NavigationSnapshot {
    pub fn new(state: NavigationState, session: &NavigationSession, itinerary: &Itinerary) -> Self {
        Self {
            state,
            trip_id: itinerary.trip_id.clone(),
            district: itinerary.district.clone(),
            cursor: session.cursor.index(),
            stop_count: itinerary.stop_count(),
            current_stop: session.target(itinerary).cloned(),
            day: itinerary.day_of(session.cursor).map(str::to_string),
            position: session.position,
            route: session.route.clone(),
            eta_minutes: session.route.as_ref().map(Route::eta_minutes),
            route_distance_km: session.route.as_ref().map(Route::distance_km),
            distance_to_stop_m: session.distance_to_target(itinerary),
            notified: session.notified.iter().map(|id| id.index()).collect(),
        }
    }
}
