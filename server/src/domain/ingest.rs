//! Event ingestion
//!
//! Validates a batch of raw events, resolves its retention once, persists the
//! accepted events in a single transaction and then feeds the live counters.

use std::sync::Arc;

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use thiserror::Error;

use super::metrics::MetricsRecorder;
use crate::core::constants::{METRIC_REQUEST_DURATION_SECONDS, METRIC_REQUESTS_TOTAL};
use crate::data::{DataError, EventRepository, NewEvent};
use crate::utils::json::null_as_default;
use crate::utils::time::datetime_to_micros;

/// One request event as reported by a producer
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RawEvent {
    /// Ingestion time when absent
    #[serde(skip_serializing_if = "Option::is_none")]
    pub timestamp: Option<DateTime<Utc>>,
    #[serde(deserialize_with = "null_as_default")]
    pub path: String,
    #[serde(deserialize_with = "null_as_default")]
    pub method: String,
    #[serde(deserialize_with = "null_as_default")]
    pub status: i32,
    #[serde(deserialize_with = "null_as_default")]
    pub duration_ms: i64,
    #[serde(deserialize_with = "null_as_default")]
    pub remote_ip: String,
    #[serde(deserialize_with = "null_as_default")]
    pub attributes: Map<String, Value>,
}

#[derive(Error, Debug)]
pub enum IngestError {
    #[error("No events provided")]
    NoEvents,

    #[error("No valid events in batch")]
    NoValidEvents,

    #[error("Failed to store events: {0}")]
    Storage(#[from] DataError),
}

/// Global retention setting, also the ceiling for per-key overrides
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetentionPolicy {
    /// 0 keeps events forever
    pub global_days: u32,
}

impl RetentionPolicy {
    pub fn new(global_days: u32) -> Self {
        Self { global_days }
    }

    /// Clamp a key's override to the ceiling; 0 is kept as "use global"
    pub fn clamp_key_days(&self, key_days: u32) -> u32 {
        if self.global_days > 0 && key_days > self.global_days {
            self.global_days
        } else {
            key_days
        }
    }

    /// Retention applied to events ingested with a key's override
    pub fn effective_days(&self, key_days: i64) -> u32 {
        let key_days = u32::try_from(key_days.max(0)).unwrap_or(u32::MAX);
        if key_days > 0 {
            self.clamp_key_days(key_days)
        } else {
            self.global_days
        }
    }

    /// Expiry instant in micros for an event created at `created_at`
    pub fn expires_at(days: u32, created_at: i64) -> Option<i64> {
        if days == 0 {
            return None;
        }
        let span = Duration::days(i64::from(days)).num_microseconds()?;
        created_at.checked_add(span)
    }
}

/// Persists event batches and records live metrics for them
#[derive(Clone)]
pub struct Ingestor {
    repo: Arc<dyn EventRepository>,
    recorder: Arc<dyn MetricsRecorder>,
    retention: RetentionPolicy,
}

impl Ingestor {
    pub fn new(
        repo: Arc<dyn EventRepository>,
        recorder: Arc<dyn MetricsRecorder>,
        retention: RetentionPolicy,
    ) -> Self {
        Self {
            repo,
            recorder,
            retention,
        }
    }

    pub fn retention(&self) -> RetentionPolicy {
        self.retention
    }

    /// Ingest a batch for one tenant/project; returns the number accepted
    ///
    /// Events without a path are skipped. The batch is written atomically.
    pub async fn ingest(
        &self,
        tenant: &str,
        project: &str,
        key_retention_days: i64,
        events: Vec<RawEvent>,
    ) -> Result<usize, IngestError> {
        if events.is_empty() {
            return Err(IngestError::NoEvents);
        }

        let days = self.retention.effective_days(key_retention_days);
        let now = Utc::now();
        let received = events.len();

        let rows: Vec<NewEvent> = events
            .into_iter()
            .filter(|event| !event.path.is_empty())
            .map(|event| {
                let created_at = datetime_to_micros(event.timestamp.unwrap_or(now));
                NewEvent {
                    created_at,
                    expires_at: RetentionPolicy::expires_at(days, created_at),
                    tenant: tenant.to_string(),
                    project: project.to_string(),
                    route: event.path,
                    method: event.method,
                    status: event.status,
                    duration_ms: event.duration_ms,
                    remote_ip: event.remote_ip,
                    attributes: Value::Object(event.attributes).to_string(),
                }
            })
            .collect();

        if rows.is_empty() {
            tracing::debug!(tenant, project, received, "Batch had no valid events");
            return Err(IngestError::NoValidEvents);
        }

        let skipped = received - rows.len();
        if skipped > 0 {
            tracing::debug!(tenant, project, skipped, "Skipped events without path");
        }

        self.repo.insert_events(&rows).await?;

        for row in &rows {
            self.record(project, row);
        }

        tracing::debug!(tenant, project, count = rows.len(), retention_days = days, "Ingested events");
        Ok(rows.len())
    }

    fn record(&self, project: &str, event: &NewEvent) {
        let status = event.status.to_string();
        self.recorder.increment_counter(
            METRIC_REQUESTS_TOTAL,
            &[
                ("project", project),
                ("route", event.route.as_str()),
                ("method", event.method.as_str()),
                ("status", status.as_str()),
            ],
        );
        self.recorder.observe_histogram(
            METRIC_REQUEST_DURATION_SECONDS,
            &[
                ("project", project),
                ("route", event.route.as_str()),
                ("method", event.method.as_str()),
            ],
            event.duration_ms as f64 / 1000.0,
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::TransactionalService;
    use crate::data::sqlite::SqliteService;
    use crate::data::{ApiKeyRow, ApiKeyValidation, EventSample, MetricBucket, NewApiKey};
    use crate::domain::metrics::{NoopRecorder, PrometheusRegistry};
    use async_trait::async_trait;
    use chrono::TimeZone;

    /// SQLite-backed repository whose event inserts always fail
    struct FailingInserts {
        inner: Arc<dyn EventRepository>,
    }

    #[async_trait]
    impl EventRepository for FailingInserts {
        async fn insert_events(&self, _events: &[NewEvent]) -> Result<u64, DataError> {
            Err(DataError::Sqlite(sqlx::Error::PoolTimedOut))
        }

        async fn load_window(&self, start: i64, end: i64) -> Result<Vec<EventSample>, DataError> {
            self.inner.load_window(start, end).await
        }

        async fn delete_expired(&self, now: i64) -> Result<u64, DataError> {
            self.inner.delete_expired(now).await
        }

        async fn upsert_bucket(&self, bucket: &MetricBucket) -> Result<(), DataError> {
            self.inner.upsert_bucket(bucket).await
        }

        async fn list_buckets(
            &self,
            tenant: &str,
            project: &str,
            since: i64,
        ) -> Result<Vec<MetricBucket>, DataError> {
            self.inner.list_buckets(tenant, project, since).await
        }

        async fn create_api_key(&self, key: &NewApiKey) -> Result<ApiKeyRow, DataError> {
            self.inner.create_api_key(key).await
        }

        async fn get_api_key_by_hash(
            &self,
            key_hash: &str,
        ) -> Result<Option<ApiKeyValidation>, DataError> {
            self.inner.get_api_key_by_hash(key_hash).await
        }

        async fn list_api_keys(&self, tenant: Option<&str>) -> Result<Vec<ApiKeyRow>, DataError> {
            self.inner.list_api_keys(tenant).await
        }

        async fn deactivate_api_keys(&self, prefix: &str) -> Result<u64, DataError> {
            self.inner.deactivate_api_keys(prefix).await
        }

        async fn ensure_api_key(&self, key: &NewApiKey) -> Result<(), DataError> {
            self.inner.ensure_api_key(key).await
        }
    }

    async fn repo() -> Arc<dyn EventRepository> {
        let service = SqliteService::in_memory().await.unwrap();
        TransactionalService::Sqlite(Arc::new(service)).repository()
    }

    fn event(path: &str, duration_ms: i64) -> RawEvent {
        RawEvent {
            path: path.to_string(),
            method: "GET".to_string(),
            status: 200,
            duration_ms,
            ..Default::default()
        }
    }

    async fn stored(repo: &Arc<dyn EventRepository>) -> Vec<crate::data::EventSample> {
        repo.load_window(i64::MIN, i64::MAX).await.unwrap()
    }

    #[test]
    fn test_retention_clamped_to_global() {
        let policy = RetentionPolicy::new(30);
        assert_eq!(policy.effective_days(90), 30);
        assert_eq!(policy.effective_days(10), 10);
        assert_eq!(policy.effective_days(0), 30);
        assert_eq!(policy.clamp_key_days(90), 30);
        assert_eq!(policy.clamp_key_days(0), 0);
    }

    #[test]
    fn test_retention_unlimited_global() {
        let policy = RetentionPolicy::new(0);
        assert_eq!(policy.effective_days(0), 0);
        assert_eq!(policy.effective_days(400), 400);
        assert_eq!(policy.clamp_key_days(400), 400);
    }

    #[test]
    fn test_expires_at() {
        let created = datetime_to_micros(Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap());
        let expected = datetime_to_micros(Utc.with_ymd_and_hms(2024, 1, 31, 0, 0, 0).unwrap());
        assert_eq!(RetentionPolicy::expires_at(30, created), Some(expected));
        assert_eq!(RetentionPolicy::expires_at(0, created), None);
    }

    #[test]
    fn test_raw_event_defaults() {
        let event: RawEvent = serde_json::from_str(r#"{"path":"/a","duration_ms":5}"#).unwrap();
        assert_eq!(event.path, "/a");
        assert_eq!(event.duration_ms, 5);
        assert!(event.timestamp.is_none());
        assert_eq!(event.method, "");
        assert_eq!(event.status, 0);
        assert!(event.attributes.is_empty());

        let event: RawEvent = serde_json::from_str(
            r#"{"timestamp":"2024-03-01T12:00:00Z","path":"/b","attributes":{"env":"prod","n":1}}"#,
        )
        .unwrap();
        assert_eq!(
            event.timestamp,
            Some(Utc.with_ymd_and_hms(2024, 3, 1, 12, 0, 0).unwrap())
        );
        assert_eq!(event.attributes.get("n"), Some(&Value::from(1)));
    }

    #[test]
    fn test_raw_event_null_fields_default() {
        let event: RawEvent = serde_json::from_str(
            r#"{"timestamp":null,"path":"/a","method":null,"status":null,"duration_ms":5,"remote_ip":null,"attributes":null}"#,
        )
        .unwrap();
        assert_eq!(event.path, "/a");
        assert_eq!(event.duration_ms, 5);
        assert!(event.timestamp.is_none());
        assert_eq!(event.method, "");
        assert_eq!(event.status, 0);
        assert_eq!(event.remote_ip, "");
        assert!(event.attributes.is_empty());

        let event: RawEvent = serde_json::from_str(r#"{"path":null}"#).unwrap();
        assert_eq!(event.path, "");
    }

    #[tokio::test]
    async fn test_partial_batch_accepted() {
        let repo = repo().await;
        let ingestor = Ingestor::new(repo.clone(), Arc::new(NoopRecorder), RetentionPolicy::new(30));

        let accepted = ingestor
            .ingest("42", "payments", 0, vec![event("/a", 5), event("", 5)])
            .await
            .unwrap();

        assert_eq!(accepted, 1);
        assert_eq!(stored(&repo).await.len(), 1);
    }

    #[tokio::test]
    async fn test_all_invalid_rejected() {
        let repo = repo().await;
        let ingestor = Ingestor::new(repo.clone(), Arc::new(NoopRecorder), RetentionPolicy::new(30));

        let result = ingestor.ingest("42", "payments", 0, vec![event("", 5)]).await;

        assert!(matches!(result, Err(IngestError::NoValidEvents)));
        assert!(stored(&repo).await.is_empty());
    }

    #[tokio::test]
    async fn test_empty_batch_rejected() {
        let repo = repo().await;
        let ingestor = Ingestor::new(repo, Arc::new(NoopRecorder), RetentionPolicy::new(30));

        let result = ingestor.ingest("42", "payments", 0, Vec::new()).await;
        assert!(matches!(result, Err(IngestError::NoEvents)));
    }

    #[tokio::test]
    async fn test_storage_failure_records_nothing() {
        let inner = repo().await;
        let registry = Arc::new(PrometheusRegistry::new().unwrap());
        let ingestor = Ingestor::new(
            Arc::new(FailingInserts {
                inner: inner.clone(),
            }),
            registry.clone(),
            RetentionPolicy::new(30),
        );

        let result = ingestor
            .ingest("42", "payments", 0, vec![event("/a", 5), event("/b", 7)])
            .await;

        assert!(matches!(result, Err(IngestError::Storage(_))));
        assert!(stored(&inner).await.is_empty());
        assert_eq!(registry.render(None), "");
    }

    #[tokio::test]
    async fn test_expiry_follows_key_retention() {
        let repo = repo().await;
        let ingestor = Ingestor::new(repo.clone(), Arc::new(NoopRecorder), RetentionPolicy::new(30));
        let ts = Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap();

        let mut e = event("/a", 5);
        e.timestamp = Some(ts);
        ingestor.ingest("42", "payments", 10, vec![e]).await.unwrap();

        // Expires after 10 days: gone at day 10, present just before
        let day10 = datetime_to_micros(ts + Duration::days(10));
        assert_eq!(repo.delete_expired(day10 - 1).await.unwrap(), 0);
        assert_eq!(repo.delete_expired(day10).await.unwrap(), 1);
    }

    #[tokio::test]
    async fn test_records_metrics_for_accepted_events() {
        let repo = repo().await;
        let registry = Arc::new(PrometheusRegistry::new().unwrap());
        let ingestor = Ingestor::new(repo, registry.clone(), RetentionPolicy::new(30));

        let mut failed = event("/a", 1500);
        failed.status = 503;
        ingestor
            .ingest("42", "payments", 0, vec![event("/a", 500), failed, event("", 5)])
            .await
            .unwrap();

        let text = registry.render(Some("payments"));
        assert!(text.contains(
            r#"apiinsight_requests_total{method="GET",project="payments",route="/a",status="200"} 1"#
        ));
        assert!(text.contains(
            r#"apiinsight_requests_total{method="GET",project="payments",route="/a",status="503"} 1"#
        ));
        assert!(text.contains(
            r#"apiinsight_request_duration_seconds_count{method="GET",project="payments",route="/a"} 2"#
        ));
        assert!(text.contains(
            r#"apiinsight_request_duration_seconds_sum{method="GET",project="payments",route="/a"} 2"#
        ));
    }
}
