pub mod config;
pub mod error;
pub mod handler;
pub mod telemetry;
