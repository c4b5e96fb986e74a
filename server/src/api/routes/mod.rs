//! API route handlers

pub mod buckets;
pub mod events;
pub mod health;
pub mod metrics;
