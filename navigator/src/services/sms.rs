use async_trait::async_trait;
use navigator_lib::proximity::ProximityAlert;
use serde::{Deserialize, Serialize};

use super::SmsGateway;
use crate::{config::trim_base_url, error::ServiceError};

/// Sends proximity alerts through the trip backend's SMS endpoint. No retries.
pub struct BackendSmsGateway {
    client: reqwest::Client,
    url: String,
}

impl BackendSmsGateway {
    pub fn new(client: reqwest::Client, backend_url: &str) -> Self {
        Self {
            client,
            url: format!("{}/api/sms/send-proximity-alert", trim_base_url(backend_url)),
        }
    }
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct ProximityAlertRequest<'a> {
    phone_number: &'a str,
    place_name: &'a str,
    distance: u32,
    timing: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    rating: Option<f64>,
}

impl<'a> From<&'a ProximityAlert> for ProximityAlertRequest<'a> {
    fn from(alert: &'a ProximityAlert) -> Self {
        Self {
            phone_number: &alert.phone_number,
            place_name: &alert.place_name,
            distance: alert.distance_m,
            timing: alert.timing.as_deref().unwrap_or("N/A"),
            rating: alert.rating,
        }
    }
}

#[derive(Debug, Deserialize)]
struct SmsResponse {
    success: bool,
    #[serde(default)]
    message: Option<String>,
    #[serde(default)]
    error: Option<String>,
}

#[async_trait]
impl SmsGateway for BackendSmsGateway {
    async fn send_proximity_alert(&self, alert: &ProximityAlert) -> Result<(), ServiceError> {
        let response = self.client
            .post(&self.url)
            .json(&ProximityAlertRequest::from(alert))
            .send()
            .await?;

        let status = response.status();
        let body: SmsResponse = response.json().await?;

        if status.is_success() && body.success {
            Ok(())
        } else {
            let reason = body.error.or(body.message).unwrap_or_else(|| status.to_string());
            Err(ServiceError::Unavailable(format!("SMS not sent: {reason}")))
        }
    }
}
