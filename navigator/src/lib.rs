pub mod config;
pub mod console;
pub mod display;
pub mod error;
pub mod runtime;
pub mod services;
pub mod state;
