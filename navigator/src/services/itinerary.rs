use std::path::Path;

use async_trait::async_trait;
use navigator_data::DataManager;
use navigator_lib::itinerary::Itinerary;
use serde::Deserialize;
use serde_json::Value;

use super::ItinerarySource;
use crate::{config::trim_base_url, error::ServiceError};

/// Saved trips served by the trip backend.
pub struct BackendItinerarySource {
    client: reqwest::Client,
    base_url: String,
}

impl BackendItinerarySource {
    pub fn new(client: reqwest::Client, backend_url: &str) -> Self {
        Self {
            client,
            base_url: trim_base_url(backend_url),
        }
    }
}

#[derive(Debug, Deserialize)]
struct SavedTripResponse {
    success: bool,
    data: Option<Value>,
    #[serde(default)]
    message: Option<String>,
}

impl SavedTripResponse {
    fn into_itinerary(self, trip_id: &str) -> Result<Itinerary, ServiceError> {
        let document = match (self.success, self.data) {
            (true, Some(document)) => document,
            _ => {
                let reason = self.message.unwrap_or_else(|| format!("Trip {trip_id} not found"));
                return Err(ServiceError::Itinerary(reason));
            }
        };

        Ok(Itinerary::from_saved_trip(trip_id, &document)?)
    }
}

#[async_trait]
impl ItinerarySource for BackendItinerarySource {
    async fn fetch_itinerary(&self, trip_id: &str) -> Result<Itinerary, ServiceError> {
        let url = format!("{}/api/saved-trips/{trip_id}", self.base_url);
        let response = self.client.get(url).send().await?;

        let status = response.status();
        if !status.is_success() {
            let reason = format!("Backend returned {status} for trip {trip_id}");
            return Err(ServiceError::Itinerary(reason));
        }

        let body: SavedTripResponse = response.json().await?;
        body.into_itinerary(trip_id)
    }
}

/// Itineraries stored as GPX files. The trip id is the file path.
pub struct GpxItinerarySource {
    data: DataManager,
}

impl GpxItinerarySource {
    pub fn new(data: DataManager) -> Self {
        Self { data }
    }
}

#[async_trait]
impl ItinerarySource for GpxItinerarySource {
    async fn fetch_itinerary(&self, trip_id: &str) -> Result<Itinerary, ServiceError> {
        self.data
            .import_itinerary_gpx(Path::new(trip_id))
            .map_err(|err| ServiceError::Itinerary(err.to_string()))
    }
}
