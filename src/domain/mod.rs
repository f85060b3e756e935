//! Domain layer types and invariants.

pub mod auth;
pub mod cache;
pub mod consumer;
pub mod error;
pub mod matches;
