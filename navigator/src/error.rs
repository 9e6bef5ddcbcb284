use std::fmt;

use navigator_lib::itinerary::ItineraryError;

/// Failures talking to the outside world: backend, router, position feed.
#[derive(Debug)]
pub enum ServiceError {
    Http(String),
    Decode(String),
    /// The service answered but could not do what was asked.
    Unavailable(String),
    PermissionDenied,
    Itinerary(String),
}

impl fmt::Display for ServiceError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ServiceError::Http(msg) => write!(f, "HTTP request failed: {msg}"),
            ServiceError::Decode(msg) => write!(f, "Unexpected response: {msg}"),
            ServiceError::Unavailable(msg) => write!(f, "Service unavailable: {msg}"),
            ServiceError::PermissionDenied => write!(f, "Location permission denied"),
            ServiceError::Itinerary(msg) => write!(f, "Itinerary error: {msg}"),
        }
    }
}

impl std::error::Error for ServiceError {}

impl From<reqwest::Error> for ServiceError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_decode() {
            ServiceError::Decode(err.to_string())
        } else {
            ServiceError::Http(err.to_string())
        }
    }
}

impl From<ItineraryError> for ServiceError {
    fn from(err: ItineraryError) -> Self {
        ServiceError::Itinerary(err.to_string())
    }
}
