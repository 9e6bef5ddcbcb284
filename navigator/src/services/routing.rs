use async_trait::async_trait;
use navigator_lib::{coordinate::Coordinate, route::{Route, RouteRequest}};
use serde::Deserialize;

use super::RouteService;
use crate::{config::trim_base_url, error::ServiceError};

/// Driving routes from an OSRM server.
pub struct OsrmRouteService {
    client: reqwest::Client,
    base_url: String,
}

impl OsrmRouteService {
    pub fn new(client: reqwest::Client, base_url: &str) -> Self {
        Self {
            client,
            base_url: trim_base_url(base_url),
        }
    }

    pub fn route_url(&self, request: &RouteRequest) -> String {
        format!(
            "{}/route/v1/driving/{},{};{},{}?overview=full&geometries=geojson",
            self.base_url,
            request.from.longitude,
            request.from.latitude,
            request.to.longitude,
            request.to.latitude,
        )
    }
}

#[async_trait]
impl RouteService for OsrmRouteService {
    async fn route(&self, request: RouteRequest) -> Result<Route, ServiceError> {
        let response = self.client.get(self.route_url(&request)).send().await?;
        let status = response.status();
        let body: OsrmResponse = response.json().await?;

        if !status.is_success() {
            let reason = format!("Routing returned {status}: {}", body.code);
            return Err(ServiceError::Unavailable(reason));
        }
        body.into_route()
    }
}

#[derive(Debug, Deserialize)]
struct OsrmResponse {
    code: String,
    #[serde(default)]
    routes: Vec<OsrmRoute>,
}

#[derive(Debug, Deserialize)]
struct OsrmRoute {
    geometry: OsrmGeometry,
    distance: f64,
    duration: f64,
}

#[derive(Debug, Deserialize)]
struct OsrmGeometry {
    /// GeoJSON order: `[lon, lat]`.
    coordinates: Vec<[f64; 2]>,
}

impl OsrmResponse {
    fn into_route(self) -> Result<Route, ServiceError> {
        if self.code != "Ok" {
            return Err(ServiceError::Unavailable(format!("Routing returned code {}", self.code)));
        }

        let route = self.routes.into_iter().next()
            .ok_or_else(|| ServiceError::Unavailable("No route found".to_string()))?;

        let geometry = route.geometry.coordinates.into_iter()
            .map(|[lon, lat]| Coordinate::new(lat, lon))
            .collect();

        Ok(Route::new(geometry, route.distance, route.duration))
    }
}
