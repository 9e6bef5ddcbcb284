use std::fmt;

use chrono::NaiveTime;
use serde::{Deserialize, Serialize};

/// Something the narrator says out loud.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Announcement {
    Welcome {
        traveller: String,
        local_time: NaiveTime,
        destination: String,
        first_stop: String,
    },
    Proximity {
        place: String,
        distance_m: u32,
    },
    Arrival {
        place: String,
    },
    NextStop {
        place: String,
    },
    GoingTo {
        place: String,
    },
    Completed,
    Goodbye {
        traveller: String,
    },
    VoiceOn,
    AlertsOn,
}

impl fmt::Display for Announcement {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Announcement::Welcome { traveller, local_time, destination, first_stop } => write!(
                f,
                "Hello {traveller}. Now time is {}. Your final destination is {destination}. \
                 The next nearest planned spot is {first_stop} as per the plan. Let's go!",
                local_time.format("%-I:%M %p")
            ),
            Announcement::Proximity { place, distance_m } => {
                write!(f, "You are near {place}. It is {distance_m} meters away.")
            }
            Announcement::Arrival { place } => {
                write!(f, "You have reached {place}. Enjoy your visit!")
            }
            Announcement::NextStop { place } => write!(f, "Next stop is {place}"),
            Announcement::GoingTo { place } => write!(f, "Going to {place}"),
            Announcement::Completed => {
                write!(f, "Trip completed. Thank you for traveling with us. Have a great day!")
            }
            Announcement::Goodbye { traveller } => {
                write!(f, "Navigation stopped. Goodbye {traveller}. Have a nice day!")
            }
            Announcement::VoiceOn => write!(f, "Voice guidance is now on"),
            Announcement::AlertsOn => write!(f, "S M S alerts are now on"),
        }
    }
}

#[test]
fn welcome_uses_twelve_hour_clock() {
    let announcement = Announcement::Welcome {
        traveller: "Priya".into(),
        local_time: NaiveTime::from_hms_opt(14, 5, 0).unwrap(),
        destination: "Chennai".into(),
        first_stop: "Marina Beach".into(),
    };

    assert_eq!(
        announcement.to_string(),
        "Hello Priya. Now time is 2:05 PM. Your final destination is Chennai. \
         The next nearest planned spot is Marina Beach as per the plan. Let's go!"
    );
}

#[test]
fn proximity_reads_rounded_meters() {
    let announcement = Announcement::Proximity { place: "Fort".into(), distance_m: 420 };
    assert_eq!(announcement.to_string(), "You are near Fort. It is 420 meters away.");
}
