//! Domain logic for API request analytics
//!
//! - `ingest` - validation, retention resolution and persistence of event batches
//! - `aggregation` - hourly rollups of raw events into metric buckets
//! - `retention` - periodic deletion of expired events
//! - `metrics` - live request counters rendered in Prometheus text format
//! - `reporting` - self-reporting of this server's own requests
//! - `bootstrap` - provisioning of the internal API key

pub mod aggregation;
pub mod bootstrap;
mod error;
pub mod ingest;
pub mod metrics;
pub mod reporting;
pub mod retention;

pub use aggregation::{AggregationWorker, WindowSummary};
pub use error::SchedulingError;
pub use ingest::{IngestError, Ingestor, RawEvent, RetentionPolicy};
pub use metrics::{MetricsRecorder, NoopRecorder, PrometheusRegistry};
pub use reporting::{ReportingTarget, SelfReporter};
pub use retention::RetentionSweeper;
