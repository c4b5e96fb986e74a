//! Shared data types for the transactional backends (SQLite, PostgreSQL)

mod events;
mod keys;

pub use events::{EventSample, MetricBucket, NewEvent};
pub use keys::{ApiKeyRow, ApiKeyValidation, NewApiKey};
