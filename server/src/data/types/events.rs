//! Event and bucket rows
//!
//! All timestamps are microseconds since the Unix epoch (UTC).

use serde::Serialize;

/// Event ready to be persisted
#[derive(Debug, Clone, PartialEq)]
pub struct NewEvent {
    pub created_at: i64,
    /// None when the event never expires
    pub expires_at: Option<i64>,
    pub tenant: String,
    pub project: String,
    pub route: String,
    pub method: String,
    pub status: i32,
    pub duration_ms: i64,
    pub remote_ip: String,
    /// JSON object text
    pub attributes: String,
}

/// Projection of an event used by hourly aggregation
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EventSample {
    pub tenant: String,
    pub project: String,
    pub status: i32,
    pub duration_ms: i64,
}

/// Hourly rollup for one (tenant, project)
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct MetricBucket {
    pub tenant: String,
    pub project: String,
    pub bucket_start: i64,
    pub total_count: i64,
    pub error_count: i64,
    pub p50_ms: i64,
    pub p95_ms: i64,
    pub p99_ms: i64,
}

impl MetricBucket {
    /// Fraction of requests that failed; 0.0 for an empty bucket
    pub fn error_rate(&self) -> f64 {
        if self.total_count == 0 {
            0.0
        } else {
            self.error_count as f64 / self.total_count as f64
        }
    }
}
