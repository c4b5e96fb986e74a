//! apiinsight server
//!
//! Ingests request events from API producers, rolls them up into hourly
//! buckets and sweeps expired events.

pub mod api;
mod app;
pub mod core;
pub mod data;
pub mod domain;
pub mod utils;
