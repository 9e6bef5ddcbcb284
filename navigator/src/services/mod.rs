use async_trait::async_trait;
use navigator_lib::{
    coordinate::Position,
    itinerary::Itinerary,
    proximity::ProximityAlert,
    route::{Route, RouteRequest},
};
use tokio::sync::mpsc;

use crate::error::ServiceError;

pub mod itinerary;
pub mod notifier;
pub mod position;
pub mod routing;
pub mod sms;
pub mod speech;

pub use itinerary::{BackendItinerarySource, GpxItinerarySource};
pub use notifier::LogNotifier;
pub use position::{GpxReplaySource, LinePositionSource, PositionUpdate, PositionWatch};
pub use routing::OsrmRouteService;
pub use sms::BackendSmsGateway;
pub use speech::LogSpeechEngine;

/// Device location.
#[async_trait]
pub trait PositionSource: Send + Sync {
    /// One-shot fix used when navigation starts without a known position.
    async fn current_position(&self) -> Result<Position, ServiceError>;

    /// Starts a continuous watch feeding `updates` until the returned handle is cancelled
    /// or dropped.
    fn watch(&self, updates: mpsc::Sender<PositionUpdate>) -> PositionWatch;
}

#[async_trait]
pub trait RouteService: Send + Sync {
    async fn route(&self, request: RouteRequest) -> Result<Route, ServiceError>;
}

#[async_trait]
pub trait SmsGateway: Send + Sync {
    async fn send_proximity_alert(&self, alert: &ProximityAlert) -> Result<(), ServiceError>;
}

/// Read-only access to saved trips.
#[async_trait]
pub trait ItinerarySource: Send + Sync {
    async fn fetch_itinerary(&self, trip_id: &str) -> Result<Itinerary, ServiceError>;
}
