pub const PREFERENCES_TABLE_NAME: &str = "Preferences";
pub const PREFERENCES_ID: &str = "preferences_id";
pub const PHONE_NUMBER: &str = "phone_number";
pub const ALERTS_ENABLED: &str = "alerts_enabled";
pub const PROXIMITY_RADIUS: &str = "proximity_radius";
pub const VOICE_ENABLED: &str = "voice_enabled";

pub const ALERT_LOG_TABLE_NAME: &str = "AlertLog";
pub const ALERT_ID: &str = "alert_id";
pub const TRIP_ID: &str = "trip_id";
pub const STOP_INDEX: &str = "stop_index";
pub const PLACE_NAME: &str = "place_name";
pub const DISTANCE: &str = "distance";
pub const DELIVERED: &str = "delivered";
pub const TIMESTAMP: &str = "timestamp";

/// Preferences live in a single row.
pub const PREFERENCES_ROW: i64 = 1;
