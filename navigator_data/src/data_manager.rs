use std::path::{Path, PathBuf};

use chrono::Utc;
use navigator_lib::{
    coordinate::Position, itinerary::Itinerary, preferences::Preferences, proximity::ProximityAlert,
};

use crate::{database::db::{AlertRecord, NavigatorDatabase}, gpx_util, DataError, DATA_DIR};

#[derive(Clone)]
pub struct DataManager {
    pub(crate) database: NavigatorDatabase,
}

/// The public interface for everything the navigator keeps on disk.
impl DataManager {
    pub async fn start() -> Result<Self, DataError> {
        let root: PathBuf = project_root::get_project_root()
            .map_err(|err| DataError::Database(format!("Failed to locate project root: {err}")))?;
        let data_dir = root.join(DATA_DIR);
        if !data_dir.exists() {
            std::fs::create_dir_all(&data_dir).map_err(|_| {
                DataError::Database(format!("Failed to create data directory: {:?}", data_dir))
            })?;
        }

        let database = NavigatorDatabase::connect().await?;

        Ok(DataManager {
            database,
        })
    }

    /// Nothing is written to disk.
    pub async fn in_memory() -> Result<Self, DataError> {
        Ok(DataManager {
            database: NavigatorDatabase::in_memory().await?,
        })
    }

    pub async fn load_preferences(&self) -> Result<Preferences, DataError> {
        self.database.get_preferences().await
    }

    pub async fn save_preferences(&self, preferences: &Preferences) -> Result<(), DataError> {
        self.database.set_preferences(preferences).await
    }

    /// Loads, applies `change` and saves. Nothing is saved if `change` fails.
    pub async fn update_preferences<F, E>(&self, change: F) -> Result<Preferences, DataError>
    where
        F: FnOnce(&mut Preferences) -> Result<(), E>,
        E: std::fmt::Display,
    {
        let mut preferences = self.load_preferences().await?;
        change(&mut preferences).map_err(|err| DataError::Preferences(err.to_string()))?;
        self.save_preferences(&preferences).await?;
        Ok(preferences)
    }

    pub async fn record_alert(
        &self,
        trip_id: &str,
        alert: &ProximityAlert,
        delivered: bool,
    ) -> Result<i64, DataError> {
        self.database.insert_alert(
            trip_id,
            alert.stop.index() as i64,
            &alert.place_name,
            &alert.phone_number,
            alert.distance_m as i64,
            delivered,
            Utc::now(),
        ).await
    }

    pub async fn get_alerts(&self, trip_id: &str) -> Result<Vec<AlertRecord>, DataError> {
        self.database.get_alerts(trip_id).await
    }

    pub fn import_itinerary_gpx(&self, path: &Path) -> Result<Itinerary, DataError> {
        gpx_util::read_itinerary_gpx(path)
    }

    pub fn read_track_gpx(&self, path: &Path) -> Result<Vec<Position>, DataError> {
        gpx_util::read_track_gpx(path)
    }
}
