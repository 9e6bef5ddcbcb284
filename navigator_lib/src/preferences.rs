use std::fmt;

use serde::{Deserialize, Serialize};

pub const DEFAULT_PROXIMITY_RADIUS_M: f64 = 500.;
pub const MIN_PHONE_NUMBER_LENGTH: usize = 10;

/// User settings for proximity SMS alerts. Stored locally, never validated by a server.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AlertPreferences {
    pub phone_number: Option<String>,
    pub enabled: bool,
    pub proximity_radius_m: f64,
}

impl Default for AlertPreferences {
    fn default() -> Self {
        Self {
            phone_number: None,
            enabled: false,
            proximity_radius_m: DEFAULT_PROXIMITY_RADIUS_M,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum PreferenceError {
    InvalidPhoneNumber(String),
    InvalidRadius(f64),
    MissingPhoneNumber,
}

impl fmt::Display for PreferenceError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PreferenceError::InvalidPhoneNumber(number) => {
                write!(f, "Please enter a valid phone number (got {number:?})")
            }
            PreferenceError::InvalidRadius(radius) => write!(
                f,
                "Proximity radius must be a positive distance in meters (got {radius})"
            ),
            PreferenceError::MissingPhoneNumber => {
                write!(f, "A phone number is required before alerts can be enabled")
            }
        }
    }
}

impl std::error::Error for PreferenceError {}

impl AlertPreferences {
    /// Alerts fire only when enabled and a number is on file.
    pub fn is_armed(&self) -> bool {
        self.enabled && self.phone_number.as_deref().is_some_and(|number| !number.is_empty())
    }

    /// Stores the number and turns alerts on.
    pub fn set_phone_number(&mut self, number: &str) -> Result<(), PreferenceError> {
        let number = number.trim();
        if number.len() < MIN_PHONE_NUMBER_LENGTH {
            return Err(PreferenceError::InvalidPhoneNumber(number.to_string()));
        }
        self.phone_number = Some(number.to_string());
        self.enabled = true;
        Ok(())
    }

    pub fn set_enabled(&mut self, enabled: bool) -> Result<(), PreferenceError> {
        if enabled && self.phone_number.is_none() {
            return Err(PreferenceError::MissingPhoneNumber);
        }
        self.enabled = enabled;
        Ok(())
    }

    pub fn set_radius(&mut self, meters: f64) -> Result<(), PreferenceError> {
        if !meters.is_finite() || meters <= 0. {
            return Err(PreferenceError::InvalidRadius(meters));
        }
        self.proximity_radius_m = meters;
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Preferences {
    pub alerts: AlertPreferences,
    pub voice_enabled: bool,
}

impl Default for Preferences {
    fn default() -> Self {
        Self {
            alerts: AlertPreferences::default(),
            voice_enabled: true,
        }
    }
}

#[test]
fn defaults_are_disarmed_with_500m_radius() {
    let prefs = Preferences::default();
    assert!(!prefs.alerts.is_armed());
    assert!(prefs.voice_enabled);
    assert_eq!(prefs.alerts.proximity_radius_m, 500.);
}

#[test]
fn short_phone_numbers_are_rejected() {
    let mut alerts = AlertPreferences::default();
    assert!(matches!(
        alerts.set_phone_number("12345"),
        Err(PreferenceError::InvalidPhoneNumber(_))
    ));
    assert!(!alerts.is_armed());

    alerts.set_phone_number(" +919876543210 ").unwrap();
    assert_eq!(alerts.phone_number.as_deref(), Some("+919876543210"));
    assert!(alerts.is_armed());
}

#[test]
fn enabling_requires_a_number() {
    let mut alerts = AlertPreferences::default();
    assert_eq!(alerts.set_enabled(true), Err(PreferenceError::MissingPhoneNumber));
    assert!(alerts.set_enabled(false).is_ok());
}

#[test]
fn radius_must_be_positive() {
    let mut alerts = AlertPreferences::default();
    assert!(alerts.set_radius(0.).is_err());
    assert!(alerts.set_radius(f64::NAN).is_err());
    alerts.set_radius(250.).unwrap();
    assert_eq!(alerts.proximity_radius_m, 250.);
}
