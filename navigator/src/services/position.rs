use std::{
    path::{Path, PathBuf},
    sync::{
        atomic::{AtomicUsize, Ordering},
        Arc, Mutex,
    },
    time::Duration,
};

use async_trait::async_trait;
use chrono::Utc;
use navigator_data::{DataError, DataManager};
use navigator_lib::coordinate::{Coordinate, Position};
use tokio::{
    fs::File,
    io::{AsyncBufReadExt, BufReader},
    sync::mpsc,
    task::JoinHandle,
};

use super::PositionSource;
use crate::error::ServiceError;

/// How long a one-shot request waits for a line-fed fix.
const FIRST_FIX_TIMEOUT: Duration = Duration::from_secs(10);

#[derive(Debug, Clone, PartialEq)]
pub enum PositionUpdate {
    Fix(Position),
    /// Still searching. The watch keeps going.
    NoFix,
    PermissionDenied,
}

/// Handle to a running watch. Cancelling aborts the feeding tasks right away,
/// so nothing is sent after `cancel` returns.
#[derive(Debug, Default)]
pub struct PositionWatch {
    tasks: Vec<JoinHandle<()>>,
}

impl PositionWatch {
    pub fn new(task: JoinHandle<()>) -> Self {
        Self { tasks: vec![task] }
    }

    /// Ties another task (e.g. a forwarder) to this watch's lifetime.
    pub fn attach(&mut self, task: JoinHandle<()>) {
        self.tasks.push(task);
    }

    pub fn cancel(&mut self) {
        for task in self.tasks.drain(..) {
            task.abort();
        }
    }
}

impl Drop for PositionWatch {
    fn drop(&mut self) {
        self.cancel();
    }
}

/// Replays a recorded track at a fixed pace. Stopping and restarting picks up where it left off.
pub struct GpxReplaySource {
    positions: Arc<Vec<Position>>,
    interval: Duration,
    progress: Arc<AtomicUsize>,
}

impl GpxReplaySource {
    pub fn new(positions: Vec<Position>, interval: Duration) -> Self {
        Self {
            positions: Arc::new(positions),
            interval,
            progress: Arc::new(AtomicUsize::new(0)),
        }
    }

    pub fn from_gpx(
        data: &DataManager,
        path: &Path,
        interval: Duration,
    ) -> Result<Self, DataError> {
        let positions = data.read_track_gpx(path)?;
        tracing::info!("Replaying {} points from {}", positions.len(), path.display());
        Ok(Self::new(positions, interval))
    }
}

#[async_trait]
impl PositionSource for GpxReplaySource {
    async fn current_position(&self) -> Result<Position, ServiceError> {
        let index = self.progress.load(Ordering::SeqCst);
        self.positions
            .get(index)
            .or_else(|| self.positions.last())
            .map(|position| Position { timestamp: Utc::now(), ..*position })
            .ok_or_else(|| ServiceError::Unavailable("Replay track is empty".to_string()))
    }

    fn watch(&self, updates: mpsc::Sender<PositionUpdate>) -> PositionWatch {
        let positions = self.positions.clone();
        let progress = self.progress.clone();
        let interval = self.interval;

        PositionWatch::new(tokio::spawn(async move {
            loop {
                let index = progress.load(Ordering::SeqCst);
                let Some(position) = positions.get(index) else {
                    tracing::debug!("Replay finished after {} points", positions.len());
                    break;
                };

                let fix = Position { timestamp: Utc::now(), ..*position };
                if updates.send(PositionUpdate::Fix(fix)).await.is_err() {
                    break;
                }
                progress.store(index + 1, Ordering::SeqCst);
                tokio::time::sleep(interval).await;
            }
        }))
    }
}

/// Reads fixes from a text feed, one per line: `lat,lon[,heading]`, `nofix` or `denied`.
/// Works with plain files and named pipes.
pub struct LinePositionSource {
    path: PathBuf,
    last: Arc<Mutex<Option<Position>>>,
}

impl LinePositionSource {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            last: Arc::new(Mutex::new(None)),
        }
    }

    fn last_fix(&self) -> Option<Position> {
        self.last.lock().ok().and_then(|last| *last)
    }
}

#[async_trait]
impl PositionSource for LinePositionSource {
    async fn current_position(&self) -> Result<Position, ServiceError> {
        if let Some(position) = self.last_fix() {
            return Ok(position);
        }

        let first_fix = async {
            let file = File::open(&self.path).await.map_err(|err| {
                ServiceError::Unavailable(format!("Failed to open {}: {err}", self.path.display()))
            })?;
            let mut lines = BufReader::new(file).lines();

            while let Some(line) = lines.next_line().await
                .map_err(|err| ServiceError::Unavailable(err.to_string()))?
            {
                match parse_line(&line) {
                    Ok(Some(PositionUpdate::Fix(position))) => return Ok(position),
                    Ok(Some(PositionUpdate::PermissionDenied)) => {
                        return Err(ServiceError::PermissionDenied);
                    }
                    Ok(_) => {}
                    Err(err) => tracing::warn!("Skipping position line: {err}"),
                }
            }

            Err(ServiceError::Unavailable("No position fix available".to_string()))
        };

        tokio::time::timeout(FIRST_FIX_TIMEOUT, first_fix).await.map_err(|_| {
            ServiceError::Unavailable("Timed out waiting for a position fix".to_string())
        })?
    }

    fn watch(&self, updates: mpsc::Sender<PositionUpdate>) -> PositionWatch {
        let path = self.path.clone();
        let last = self.last.clone();

        PositionWatch::new(tokio::spawn(async move {
            let file = match File::open(&path).await {
                Ok(file) => file,
                Err(err) => {
                    tracing::error!("Failed to open position feed {}: {err}", path.display());
                    return;
                }
            };

            let mut lines = BufReader::new(file).lines();
            loop {
                let line = match lines.next_line().await {
                    Ok(Some(line)) => line,
                    Ok(None) => break,
                    Err(err) => {
                        tracing::error!("Position feed read failed: {err}");
                        break;
                    }
                };

                let update = match parse_line(&line) {
                    Ok(Some(update)) => update,
                    Ok(None) => continue,
                    Err(err) => {
                        tracing::warn!("Skipping position line: {err}");
                        continue;
                    }
                };

                if let PositionUpdate::Fix(position) = &update {
                    if let Ok(mut last) = last.lock() {
                        *last = Some(*position);
                    }
                }

                if updates.send(update).await.is_err() {
                    break;
                }
            }
            tracing::debug!("Position feed {} ended", path.display());
        }))
    }
}

/// Blank lines and `#` comments yield `None`.
pub fn parse_line(line: &str) -> Result<Option<PositionUpdate>, String> {
    let line = line.trim();
    if line.is_empty() || line.starts_with('#') {
        return Ok(None);
    }

    match line.to_ascii_lowercase().as_str() {
        "nofix" => return Ok(Some(PositionUpdate::NoFix)),
        "denied" => return Ok(Some(PositionUpdate::PermissionDenied)),
        _ => {}
    }

    let fields: Vec<&str> = line.split(',').map(str::trim).collect();
    if fields.len() < 2 || fields.len() > 3 {
        return Err(format!("Expected 'lat,lon[,heading]', got {line:?}"));
    }

    let number = |field: &str| field.parse::<f64>().map_err(|_| format!("Not a number: {field:?}"));
    let coordinate = Coordinate::new(number(fields[0])?, number(fields[1])?);
    if !coordinate.is_valid() {
        return Err(format!("Coordinate out of range: {line:?}"));
    }
    let heading = fields.get(2).map(|field| number(*field)).transpose()?;

    Ok(Some(PositionUpdate::Fix(Position::new(coordinate, heading, Utc::now()))))
}
