use std::{fs::File, io::BufReader, path::{Path, PathBuf}};

use chrono::{DateTime, Utc};
use navigator_lib::{coordinate::{bearing, Coordinate, Position}, itinerary::{Day, Itinerary, Stop}};

use crate::{DataError, GPX_DIR};

/// Relative names that don't exist as given are looked up in the data gpx folder.
pub fn resolve_gpx_path(path: &Path) -> PathBuf {
    if path.exists() || path.is_absolute() {
        return path.to_path_buf();
    }

    match project_root::get_project_root() {
        Ok(root) => root.join(GPX_DIR).join(path),
        Err(_) => path.to_path_buf(),
    }
}

fn open_gpx(path: &Path) -> Result<gpx::Gpx, DataError> {
    let file_path = resolve_gpx_path(path);
    let file = File::open(&file_path)
        .map_err(|err| DataError::Gpx(format!("Failed to open {}: {err}", file_path.display())))?;
    gpx::read(BufReader::new(file))
        .map_err(|err| DataError::Gpx(format!("Failed to parse {}: {err}", file_path.display())))
}

/// Each `<rte>` becomes a day, in file order. A file without routes is read as one day
/// made of its top-level waypoints.
pub fn read_itinerary_gpx(path: &Path) -> Result<Itinerary, DataError> {
    let gpx = open_gpx(path)?;

    let stem = path.file_stem()
        .map(|stem| stem.to_string_lossy().to_string())
        .unwrap_or_else(|| "gpx".to_string());

    let district = gpx.metadata.as_ref()
        .and_then(|meta| meta.name.clone())
        .unwrap_or_else(|| stem.clone());

    let mut days = Vec::new();
    let mut count = 0;
    for (i, route) in gpx.routes.into_iter().enumerate() {
        let label = route.name.clone().unwrap_or_else(|| format!("Day {}", i + 1));
        let stops = route.points.into_iter()
            .filter_map(|point| to_stop(point, &mut count))
            .collect();
        days.push(Day { label, stops });
    }

    if days.is_empty() {
        let stops = gpx.waypoints.into_iter()
            .filter_map(|point| to_stop(point, &mut count))
            .collect();
        days.push(Day { label: "Day 1".to_string(), stops });
    }

    if count == 0 {
        return Err(DataError::Gpx(format!("No stops found in {}", path.display())));
    }

    tracing::debug!("Imported {count} stops in {} days from {}", days.len(), path.display());
    Ok(Itinerary::new(stem, district, days))
}

fn to_stop(point: gpx::Waypoint, count: &mut usize) -> Option<Stop> {
    let coordinate = Coordinate::from(point.point());
    if !coordinate.is_valid() {
        return None;
    }

    *count += 1;
    let name = point.name.unwrap_or_else(|| format!("Stop {count}"));
    let mut stop = Stop::new(name, coordinate);
    stop.kind = point.type_;
    Some(stop)
}

/// Flattens every track segment into positions. Headings point at the next point;
/// the last point keeps the previous heading.
pub fn read_track_gpx(path: &Path) -> Result<Vec<Position>, DataError> {
    let gpx = open_gpx(path)?;

    let mut points: Vec<(Coordinate, Option<DateTime<Utc>>)> = Vec::new();
    for track in gpx.tracks {
        for segment in track.segments {
            for point in segment.points {
                let time = point.time
                    .and_then(|time| time.format().ok())
                    .and_then(|time| time.parse::<DateTime<Utc>>().ok());
                points.push((Coordinate::from(point.point()), time));
            }
        }
    }

    if points.is_empty() {
        return Err(DataError::Gpx(format!("No track points found in {}", path.display())));
    }

    let mut positions = Vec::with_capacity(points.len());
    let mut heading = None;
    for (i, (coordinate, time)) in points.iter().enumerate() {
        if let Some((next, _)) = points.get(i + 1) {
            if next != coordinate {
                heading = Some(bearing(coordinate, next));
            }
        }
        positions.push(Position::new(*coordinate, heading, time.unwrap_or_else(Utc::now)));
    }

    tracing::debug!("Read {} track points from {}", positions.len(), path.display());
    Ok(positions)
}
