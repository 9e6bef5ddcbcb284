use std::fmt;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::coordinate::Coordinate;

/// Index of a stop in the flattened, day-ordered stop list.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct StopId(pub usize);

impl StopId {
    pub fn index(self) -> usize {
        self.0
    }

    pub fn next(self) -> StopId {
        StopId(self.0 + 1)
    }
}

impl fmt::Display for StopId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0 + 1)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Stop {
    pub name: String,
    pub kind: Option<String>,
    pub coordinate: Coordinate,
    pub duration_hours: Option<f64>,
    pub rating: Option<f64>,
    /// Display window, e.g. "6 AM - 8 PM".
    pub timing: Option<String>,
}

impl Stop {
    pub fn new(name: impl Into<String>, coordinate: Coordinate) -> Self {
        Self {
            name: name.into(),
            kind: None,
            coordinate,
            duration_hours: None,
            rating: None,
            timing: None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Day {
    pub label: String,
    pub stops: Vec<Stop>,
}

/// The ordered stops of a trip, grouped by day. Never mutated after loading.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Itinerary {
    pub trip_id: String,
    pub district: String,
    pub days: Vec<Day>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum ItineraryError {
    Malformed(String),
}

impl fmt::Display for ItineraryError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ItineraryError::Malformed(reason) => write!(f, "Malformed itinerary: {reason}"),
        }
    }
}

impl std::error::Error for ItineraryError {}

impl Itinerary {
    pub fn new(trip_id: impl Into<String>, district: impl Into<String>, days: Vec<Day>) -> Self {
        Self {
            trip_id: trip_id.into(),
            district: district.into(),
            days,
        }
    }

    pub fn stops(&self) -> impl Iterator<Item = &Stop> {
        self.days.iter().flat_map(|day| day.stops.iter())
    }

    pub fn enumerated(&self) -> impl Iterator<Item = (StopId, &Stop)> {
        self.stops().enumerate().map(|(i, stop)| (StopId(i), stop))
    }

    pub fn stop_count(&self) -> usize {
        self.days.iter().map(|day| day.stops.len()).sum()
    }

    pub fn stop(&self, id: StopId) -> Option<&Stop> {
        self.stops().nth(id.0)
    }

    pub fn first_stop(&self) -> Option<&Stop> {
        self.stops().next()
    }

    pub fn is_last(&self, id: StopId) -> bool {
        id.0 + 1 == self.stop_count()
    }

    /// Label of the day a stop belongs to.
    pub fn day_of(&self, id: StopId) -> Option<&str> {
        let mut remaining = id.0;
        for day in &self.days {
            if remaining < day.stops.len() {
                return Some(&day.label);
            }
            remaining -= day.stops.len();
        }
        None
    }

    /// Parses the saved-trip document served by the trip backend
    /// (`{ _id, tripData: { district, itinerary: { "Day 1": [place, ..], .. } } }`).
    ///
    /// Places without a usable latitude/longitude are skipped. Days keep document order.
    pub fn from_saved_trip(trip_id: &str, document: &Value) -> Result<Self, ItineraryError> {
        let saved: SavedTripDocument = serde_json::from_value(document.clone())
            .map_err(|err| ItineraryError::Malformed(err.to_string()))?;

        let trip_id = saved.id.unwrap_or_else(|| trip_id.to_string());

        let mut days = Vec::new();
        for (label, places) in saved.trip_data.itinerary {
            let places: Vec<PlaceDocument> = serde_json::from_value(places)
                .map_err(|err| ItineraryError::Malformed(format!("{label}: {err}")))?;

            let stops = places.into_iter().filter_map(PlaceDocument::into_stop).collect();
            days.push(Day { label, stops });
        }

        Ok(Self::new(trip_id, saved.trip_data.district, days))
    }
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct SavedTripDocument {
    #[serde(rename = "_id")]
    id: Option<String>,
    trip_data: TripDataDocument,
}

#[derive(Deserialize)]
struct TripDataDocument {
    district: String,
    #[serde(default)]
    itinerary: Map<String, Value>,
}

#[derive(Deserialize)]
struct PlaceDocument {
    name: String,
    #[serde(rename = "type")]
    kind: Option<String>,
    duration: Option<f64>,
    rating: Option<f64>,
    timing: Option<String>,
    latitude: Option<Value>,
    longitude: Option<Value>,
}

impl PlaceDocument {
    fn into_stop(self) -> Option<Stop> {
        let coordinate = Coordinate::new(
            parse_degrees(self.latitude.as_ref()?)?,
            parse_degrees(self.longitude.as_ref()?)?,
        );
        if !coordinate.is_valid() {
            return None;
        }

        Some(Stop {
            name: self.name,
            kind: self.kind,
            coordinate,
            duration_hours: self.duration,
            rating: self.rating,
            timing: self.timing.filter(|timing| !timing.is_empty()),
        })
    }
}

// The backend stores coordinates as strings.
fn parse_degrees(value: &Value) -> Option<f64> {
    match value {
        Value::String(s) => s.trim().parse().ok(),
        Value::Number(n) => n.as_f64(),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    fn document() -> Value {
        json!({
            "_id": "665f1c",
            "tripData": {
                "district": "Chennai",
                "days": 2,
                "itinerary": {
                    "Day 1": [
                        { "name": "Marina Beach", "type": "beach", "duration": 2, "rating": 4.5,
                          "timing": "5 AM - 9 PM", "latitude": "13.0500", "longitude": "80.2824" },
                        { "name": "No coordinates", "type": "temple", "duration": 1, "rating": 4.0,
                          "timing": "", "latitude": "", "longitude": "80.1" }
                    ],
                    "Day 2": [
                        { "name": "Kapaleeshwarar Temple", "type": "temple", "duration": 1,
                          "rating": 4.7, "timing": "", "latitude": 13.0339, "longitude": 80.2695 }
                    ]
                }
            }
        })
    }

    #[test]
    fn parses_saved_trip_and_flattens_in_day_order() {
        let itinerary = Itinerary::from_saved_trip("fallback", &document()).unwrap();

        assert_eq!(itinerary.trip_id, "665f1c");
        assert_eq!(itinerary.district, "Chennai");
        assert_eq!(itinerary.stop_count(), 2);

        let names: Vec<&str> = itinerary.stops().map(|s| s.name.as_str()).collect();
        assert_eq!(names, vec!["Marina Beach", "Kapaleeshwarar Temple"]);

        assert_eq!(itinerary.day_of(StopId(1)), Some("Day 2"));
        assert!(itinerary.is_last(StopId(1)));
        assert_eq!(itinerary.stop(StopId(1)).unwrap().timing, None);
        assert_eq!(itinerary.stop(StopId(0)).unwrap().coordinate, Coordinate::new(13.05, 80.2824));
    }

    #[test]
    fn missing_trip_data_is_malformed() {
        let err = Itinerary::from_saved_trip("x", &json!({ "success": true })).unwrap_err();
        assert!(matches!(err, ItineraryError::Malformed(_)));
    }

    #[test]
    fn stop_lookup_out_of_range() {
        let itinerary = Itinerary::from_saved_trip("x", &document()).unwrap();
        assert!(itinerary.stop(StopId(2)).is_none());
        assert!(itinerary.day_of(StopId(5)).is_none());
    }
}
