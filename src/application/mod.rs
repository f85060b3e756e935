//! Application services layer.

pub mod error;
pub mod ingest;
pub mod repos;
pub mod tracking;
pub mod trusted;
pub mod validation;
