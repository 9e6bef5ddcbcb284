use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};

use crate::{
    coordinate::Coordinate,
    itinerary::{Itinerary, Stop, StopId},
    notify::Notification,
    preferences::AlertPreferences,
};

/// Payload handed to the SMS gateway.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProximityAlert {
    pub stop: StopId,
    pub phone_number: String,
    pub place_name: String,
    pub distance_m: u32,
    pub timing: Option<String>,
    pub rating: Option<f64>,
}

impl ProximityAlert {
    fn new(stop_id: StopId, stop: &Stop, phone_number: &str, distance_m: f64) -> Self {
        Self {
            stop: stop_id,
            phone_number: phone_number.to_string(),
            place_name: stop.name.clone(),
            distance_m: distance_m.round() as u32,
            timing: stop.timing.clone(),
            rating: stop.rating,
        }
    }

    /// Message text as the gateway delivers it.
    pub fn sms_body(&self) -> String {
        let mut body = format!(
            "TRIP ALERT!\n\nYou're {}m away from:\n{}\n",
            self.distance_m, self.place_name
        );
        if let Some(rating) = self.rating {
            body.push_str(&format!("Rating: {rating}/5\n"));
        }
        if let Some(timing) = &self.timing {
            body.push_str(&format!("Best time: {timing}\n"));
        }
        body.push_str("\nEnjoy your visit!");
        body
    }

    /// Visual alert mirroring the SMS.
    pub fn notification(&self) -> Notification {
        Notification::new(
            format!("Near {}", self.place_name),
            format!("You're {}m away! SMS alert sent.", self.distance_m),
        )
    }
}

/// Checks the live position against every stop, not only the current target.
///
/// Stops within the radius that are not in `notified` are inserted into it and returned.
/// Insertion happens here, before any SMS is attempted, so a stop is alerted at most once
/// per session no matter how the send turns out.
pub fn check_proximity(
    position: &Coordinate,
    itinerary: &Itinerary,
    preferences: &AlertPreferences,
    notified: &mut BTreeSet<StopId>,
) -> Vec<ProximityAlert> {
    let armed = preferences.is_armed();
    let Some(phone_number) = preferences.phone_number.as_deref().filter(|_| armed) else {
        return Vec::new();
    };

    let mut alerts = Vec::new();
    for (id, stop) in itinerary.enumerated() {
        if notified.contains(&id) {
            continue;
        }

        let distance = position.distance_to(&stop.coordinate);
        if distance <= preferences.proximity_radius_m {
            notified.insert(id);
            alerts.push(ProximityAlert::new(id, stop, phone_number, distance));
        }
    }

    alerts
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{coordinate::offset, itinerary::Day};

    fn origin() -> Coordinate {
        Coordinate::new(13.0827, 80.2707)
    }

    fn itinerary() -> Itinerary {
        let mut near = Stop::new("Near", offset(&origin(), 0., 300.));
        near.rating = Some(4.5);
        near.timing = Some("6 AM - 8 PM".into());
        let far = Stop::new("Far", offset(&origin(), 90., 2_000.));
        let also_near = Stop::new("Also near", offset(&origin(), 180., 499.));

        Itinerary::new("trip", "Chennai", vec![
            Day { label: "Day 1".into(), stops: vec![far, near] },
            Day { label: "Day 2".into(), stops: vec![also_near] },
        ])
    }

    fn armed() -> AlertPreferences {
        let mut prefs = AlertPreferences::default();
        prefs.set_phone_number("+919876543210").unwrap();
        prefs
    }

    #[test]
    fn alerts_every_stop_inside_radius_once() {
        let itinerary = itinerary();
        let mut notified = BTreeSet::new();

        let alerts = check_proximity(&origin(), &itinerary, &armed(), &mut notified);
        let ids: Vec<StopId> = alerts.iter().map(|a| a.stop).collect();
        assert_eq!(ids, vec![StopId(1), StopId(2)]);
        assert_eq!(alerts[0].distance_m, 300);

        let again = check_proximity(&origin(), &itinerary, &armed(), &mut notified);
        assert!(again.is_empty());
        assert_eq!(notified.len(), 2);
    }

    #[test]
    fn disarmed_preferences_do_nothing() {
        let mut notified = BTreeSet::new();
        let prefs = AlertPreferences::default();
        let alerts = check_proximity(&origin(), &itinerary(), &prefs, &mut notified);
        assert!(alerts.is_empty());
        assert!(notified.is_empty());
    }

    #[test]
    fn sms_body_includes_optional_details() {
        let mut notified = BTreeSet::new();
        let alerts = check_proximity(&origin(), &itinerary(), &armed(), &mut notified);

        let body = alerts[0].sms_body();
        assert!(body.contains("You're 300m away from:\nNear"));
        assert!(body.contains("Rating: 4.5/5"));
        assert!(body.contains("Best time: 6 AM - 8 PM"));

        let body = alerts[1].sms_body();
        assert!(!body.contains("Rating"));
    }
}
