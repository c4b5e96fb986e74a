//! Live request metrics
//!
//! Ingestion reports through the [`MetricsRecorder`] capability; the default
//! [`PrometheusRegistry`] keeps the series in memory and renders them in the
//! Prometheus text exposition format.

mod registry;

pub use registry::PrometheusRegistry;

/// Label name/value pairs attached to a sample
pub type Labels<'a> = &'a [(&'a str, &'a str)];

/// Sink for counter increments and histogram observations
///
/// Implementations must never block the caller for long or fail.
pub trait MetricsRecorder: Send + Sync {
    fn increment_counter(&self, name: &str, labels: Labels<'_>);

    fn observe_histogram(&self, name: &str, labels: Labels<'_>, value: f64);
}

/// Recorder that discards everything
#[derive(Debug, Default, Clone, Copy)]
pub struct NoopRecorder;

impl MetricsRecorder for NoopRecorder {
    fn increment_counter(&self, _name: &str, _labels: Labels<'_>) {}

    fn observe_histogram(&self, _name: &str, _labels: Labels<'_>, _value: f64) {}
}
