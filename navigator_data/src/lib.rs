use std::fmt;

use const_format::concatcp;

pub mod database;
pub mod gpx_util;
mod data_manager;

pub use data_manager::*;

pub const DATA_DIR: &str = "data/";
pub const DATABASE_PATH: &str = concatcp!(DATA_DIR, "navigator.db");
pub const GPX_DIR: &str = concatcp!(DATA_DIR, "gpx");

#[derive(Debug)]
pub enum DataError {
    Database(String),
    Gpx(String),
    Preferences(String),
}

impl fmt::Display for DataError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DataError::Database(msg) => write!(f, "Database error: {msg}"),
            DataError::Gpx(msg) => write!(f, "GPX error: {msg}"),
            DataError::Preferences(msg) => write!(f, "Preferences error: {msg}"),
        }
    }
}

impl std::error::Error for DataError {}
