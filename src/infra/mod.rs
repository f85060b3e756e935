//! Infrastructure adapters and runtime bootstrap.

pub mod analytics;
pub mod db;
pub mod error;
pub mod http;
pub mod telemetry;
