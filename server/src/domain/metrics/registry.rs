//! Prometheus-backed metrics registry
//!
//! The request counter and duration histogram are registered up front with
//! fixed label names. Rendering gathers every family, keeps the samples of
//! the requested project and encodes them in text exposition format.

use std::collections::HashMap;

use prometheus::proto::{LabelPair, Metric, MetricFamily};
use prometheus::{HistogramOpts, HistogramVec, IntCounterVec, Opts, Registry, TextEncoder};

use super::{Labels, MetricsRecorder};
use crate::core::constants::{
    APP_NAME_LOWER, DURATION_BUCKETS_SECS, METRIC_REQUEST_DURATION_SECONDS, METRIC_REQUESTS_TOTAL,
};

/// Label used to scope series to a project
const PROJECT_LABEL: &str = "project";

const REQUESTS_TOTAL_LABELS: [&str; 4] = [PROJECT_LABEL, "route", "method", "status"];
const REQUEST_DURATION_LABELS: [&str; 3] = [PROJECT_LABEL, "route", "method"];

/// Metrics registry with Prometheus text rendering
#[derive(Clone)]
pub struct PrometheusRegistry {
    registry: Registry,
    requests_total: IntCounterVec,
    request_duration: HistogramVec,
}

impl PrometheusRegistry {
    pub fn new() -> prometheus::Result<Self> {
        let registry = Registry::new();

        let requests_total = IntCounterVec::new(
            Opts::new(METRIC_REQUESTS_TOTAL, "Total number of ingested API requests.")
                .namespace(APP_NAME_LOWER),
            &REQUESTS_TOTAL_LABELS,
        )?;
        let request_duration = HistogramVec::new(
            HistogramOpts::new(
                METRIC_REQUEST_DURATION_SECONDS,
                "Histogram of ingested API request durations in seconds.",
            )
            .namespace(APP_NAME_LOWER)
            .buckets(DURATION_BUCKETS_SECS.to_vec()),
            &REQUEST_DURATION_LABELS,
        )?;

        registry.register(Box::new(requests_total.clone()))?;
        registry.register(Box::new(request_duration.clone()))?;

        Ok(Self {
            registry,
            requests_total,
            request_duration,
        })
    }

    /// Render all series, or only those of one project, in text exposition format
    pub fn render(&self, project_filter: Option<&str>) -> String {
        let families: Vec<MetricFamily> = self
            .registry
            .gather()
            .into_iter()
            .filter_map(|family| filter_family(family, project_filter))
            .collect();

        let mut out = String::new();
        if let Err(e) = TextEncoder::new().encode_utf8(&families, &mut out) {
            tracing::error!(error = %e, "Failed to encode metrics");
            return String::new();
        }
        out
    }
}

impl MetricsRecorder for PrometheusRegistry {
    fn increment_counter(&self, name: &str, labels: Labels<'_>) {
        if name != METRIC_REQUESTS_TOTAL {
            tracing::trace!(metric = name, "Unknown counter ignored");
            return;
        }
        match self.requests_total.get_metric_with(&label_map(labels)) {
            Ok(counter) => counter.inc(),
            Err(e) => tracing::trace!(metric = name, error = %e, "Counter labels rejected"),
        }
    }

    fn observe_histogram(&self, name: &str, labels: Labels<'_>, value: f64) {
        if name != METRIC_REQUEST_DURATION_SECONDS {
            tracing::trace!(metric = name, "Unknown histogram ignored");
            return;
        }
        if !value.is_finite() {
            return;
        }
        match self.request_duration.get_metric_with(&label_map(labels)) {
            Ok(histogram) => histogram.observe(value),
            Err(e) => tracing::trace!(metric = name, error = %e, "Histogram labels rejected"),
        }
    }
}

fn label_map<'a>(labels: Labels<'a>) -> HashMap<&'a str, &'a str> {
    labels.iter().copied().collect()
}

/// Keep the samples of one project; families left empty are dropped
fn filter_family(mut family: MetricFamily, project_filter: Option<&str>) -> Option<MetricFamily> {
    if let Some(project) = project_filter {
        let kept: Vec<Metric> = family
            .get_metric()
            .iter()
            .filter(|metric| matches_project(metric.get_label(), project))
            .cloned()
            .collect();
        family.set_metric(kept.into());
    }
    (!family.get_metric().is_empty()).then_some(family)
}

/// Series without a project label are shared by every project
fn matches_project(labels: &[LabelPair], project: &str) -> bool {
    labels
        .iter()
        .find(|pair| pair.get_name() == PROJECT_LABEL)
        .is_none_or(|pair| pair.get_value() == project)
}
