use std::path::PathBuf;

use chrono::{DateTime, Utc};
use const_format::concatcp;
use navigator_lib::preferences::{AlertPreferences, Preferences};
use sqlx::{
    query, query_as,
    sqlite::{SqliteConnectOptions, SqlitePoolOptions},
    Executor, FromRow, Pool, Sqlite, SqlitePool,
};

use crate::{DataError, DATABASE_PATH};

use super::constants::*;

/// One SMS attempt, delivered or not.
#[derive(Debug, Clone, PartialEq, FromRow)]
pub struct AlertRecord {
    pub alert_id: i64,
    pub trip_id: String,
    pub stop_index: i64,
    pub place_name: String,
    pub phone_number: String,
    pub distance: i64,
    pub delivered: bool,
    pub timestamp: DateTime<Utc>,
}

#[derive(Clone)]
pub struct NavigatorDatabase {
    pool: Pool<Sqlite>,
}

impl NavigatorDatabase {
    pub async fn connect() -> Result<Self, DataError> {
        let root: PathBuf = project_root::get_project_root()
            .map_err(|err| DataError::Database(format!("Failed to locate project root: {err}")))?;
        let path = root.join(DATABASE_PATH);
        tracing::debug!("Opening database {}", path.display());
        let options = SqliteConnectOptions::new()
            .filename(&path)
            .create_if_missing(true);

        let pool = SqlitePool::connect_with(options).await
            .map_err(|err| DataError::Database(format!("Failed to connect to database: {err}")))?;

        let db = Self {
            pool
        };

        db.init().await?;

        Ok(db)
    }

    /// Private database that disappears with the pool.
    pub async fn in_memory() -> Result<Self, DataError> {
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .connect("sqlite::memory:").await
            .map_err(|_| DataError::Database("Failed to open in-memory database".to_string()))?;

        let db = Self {
            pool
        };

        db.init().await?;

        Ok(db)
    }

    pub async fn init(&self) -> Result<(), DataError> {
        self.pool.execute(concatcp!("
            CREATE TABLE IF NOT EXISTS ", PREFERENCES_TABLE_NAME, "(",
                PREFERENCES_ID,   " INTEGER PRIMARY KEY,",
                PHONE_NUMBER,     " TEXT,",
                ALERTS_ENABLED,   " BOOLEAN NOT NULL,",
                PROXIMITY_RADIUS, " REAL NOT NULL,",
                VOICE_ENABLED,    " BOOLEAN NOT NULL);

            CREATE TABLE IF NOT EXISTS ", ALERT_LOG_TABLE_NAME, "(",
                ALERT_ID,     " INTEGER PRIMARY KEY AUTOINCREMENT,",
                TRIP_ID,      " TEXT NOT NULL,",
                STOP_INDEX,   " INTEGER NOT NULL,",
                PLACE_NAME,   " TEXT NOT NULL,",
                PHONE_NUMBER, " TEXT NOT NULL,",
                DISTANCE,     " INTEGER NOT NULL,",
                DELIVERED,    " BOOLEAN NOT NULL,",
                TIMESTAMP,    " TIMESTAMP NOT NULL
            )")).await
            .map_err(|_| DataError::Database("Failed to create tables".to_string()))
            .map(|_| ())
    }

    /// Defaults when nothing has been saved yet.
    pub async fn get_preferences(&self) -> Result<Preferences, DataError> {
        let row = query_as::<_, (Option<String>, bool, f64, bool)>(concatcp!("
            SELECT ", PHONE_NUMBER, ", ", ALERTS_ENABLED, ", ",
            PROXIMITY_RADIUS, ", ", VOICE_ENABLED, "
            FROM ", PREFERENCES_TABLE_NAME, " WHERE ", PREFERENCES_ID, " = ?1"))
                .bind(PREFERENCES_ROW)
                .fetch_optional(&self.pool).await
                .map_err(|_| DataError::Database("Failed to get preferences".to_string()))?;

        Ok(match row {
            Some((phone_number, enabled, proximity_radius_m, voice_enabled)) => Preferences {
                alerts: AlertPreferences {
                    phone_number,
                    enabled,
                    proximity_radius_m,
                },
                voice_enabled,
            },
            None => Preferences::default(),
        })
    }

    pub async fn set_preferences(&self, preferences: &Preferences) -> Result<(), DataError> {
        query(concatcp!("
            INSERT INTO ", PREFERENCES_TABLE_NAME, "(",
            PREFERENCES_ID, ", ", PHONE_NUMBER, ", ", ALERTS_ENABLED, ", ",
            PROXIMITY_RADIUS, ", ", VOICE_ENABLED, ")
            VALUES (?1, ?2, ?3, ?4, ?5)
            ON CONFLICT(", PREFERENCES_ID, ") DO UPDATE SET ",
                PHONE_NUMBER,     " = excluded.", PHONE_NUMBER, ", ",
                ALERTS_ENABLED,   " = excluded.", ALERTS_ENABLED, ", ",
                PROXIMITY_RADIUS, " = excluded.", PROXIMITY_RADIUS, ", ",
                VOICE_ENABLED,    " = excluded.", VOICE_ENABLED))
            .bind(PREFERENCES_ROW)
            .bind(&preferences.alerts.phone_number)
            .bind(preferences.alerts.enabled)
            .bind(preferences.alerts.proximity_radius_m)
            .bind(preferences.voice_enabled)
            .execute(&self.pool).await
            .map_err(|_| DataError::Database("Failed to save preferences".to_string()))
            .map(|_| ())
    }

    #[allow(clippy::too_many_arguments)]
    pub async fn insert_alert(
        &self,
        trip_id: &str,
        stop_index: i64,
        place_name: &str,
        phone_number: &str,
        distance: i64,
        delivered: bool,
        timestamp: DateTime<Utc>,
    ) -> Result<i64, DataError> {
        query_as::<_, (i64,)>(concatcp!("
            INSERT INTO ", ALERT_LOG_TABLE_NAME, "(",
            ALERT_ID, ", ", TRIP_ID, ", ", STOP_INDEX, ", ", PLACE_NAME, ", ",
            PHONE_NUMBER, ", ", DISTANCE, ", ", DELIVERED, ", ", TIMESTAMP, ")
            VALUES (NULL, ?1, ?2, ?3, ?4, ?5, ?6, ?7) RETURNING ", ALERT_ID))
                .bind(trip_id)
                .bind(stop_index)
                .bind(place_name)
                .bind(phone_number)
                .bind(distance)
                .bind(delivered)
                .bind(timestamp)
                .fetch_one(&self.pool).await
                .map_err(|_| DataError::Database("Failed to insert alert".to_string()))
                .map(|row| row.0)
    }

    pub async fn get_alerts(&self, trip_id: &str) -> Result<Vec<AlertRecord>, DataError> {
        query_as::<_, AlertRecord>(concatcp!(
            "SELECT * FROM ", ALERT_LOG_TABLE_NAME,
            " WHERE ", TRIP_ID, " = ?1 ORDER BY ", ALERT_ID
        ))
            .bind(trip_id)
            .fetch_all(&self.pool).await
            .map_err(|_| DataError::Database("Failed to get alerts".to_string()))
    }
}

#[tokio::test]
async fn preferences_default_until_saved() {
    let db = NavigatorDatabase::in_memory().await.unwrap();
    assert_eq!(db.get_preferences().await.unwrap(), Preferences::default());
}

#[tokio::test]
async fn preferences_round_trip_and_overwrite() {
    let db = NavigatorDatabase::in_memory().await.unwrap();

    let mut preferences = Preferences::default();
    preferences.alerts.set_phone_number("+919876543210").unwrap();
    preferences.alerts.set_radius(750.).unwrap();
    preferences.voice_enabled = false;
    db.set_preferences(&preferences).await.unwrap();
    assert_eq!(db.get_preferences().await.unwrap(), preferences);

    preferences.alerts.set_enabled(false).unwrap();
    db.set_preferences(&preferences).await.unwrap();
    let loaded = db.get_preferences().await.unwrap();
    assert!(!loaded.alerts.enabled);
    assert_eq!(loaded.alerts.phone_number.as_deref(), Some("+919876543210"));
}

#[tokio::test]
async fn alert_log_is_per_trip() {
    let db = NavigatorDatabase::in_memory().await.unwrap();
    let now = Utc::now();

    db.insert_alert("trip-a", 0, "Marina Beach", "+919876543210", 420, true, now).await.unwrap();
    db.insert_alert("trip-a", 2, "Fort St. George", "+919876543210", 180, false, now)
        .await
        .unwrap();
    db.insert_alert("trip-b", 0, "Elsewhere", "+919876543210", 10, true, now).await.unwrap();

    let alerts = db.get_alerts("trip-a").await.unwrap();
    assert_eq!(alerts.len(), 2);
    assert_eq!(alerts[0].place_name, "Marina Beach");
    assert!(!alerts[1].delivered);
    assert_eq!(alerts[1].stop_index, 2);
}
