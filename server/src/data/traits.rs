//! Repository trait for the transactional backends
//!
//! SQLite and PostgreSQL each implement [`EventRepository`] over their own
//! pool; callers obtain a trait object from `TransactionalService::repository`.

use async_trait::async_trait;

use crate::data::error::DataError;
use crate::data::types::{ApiKeyRow, ApiKeyValidation, EventSample, MetricBucket, NewApiKey, NewEvent};

/// Storage operations behind ingestion, aggregation, retention and key management
///
/// Timestamps are microseconds since the Unix epoch (UTC).
#[async_trait]
pub trait EventRepository: Send + Sync {
    // ==================== Event Operations ====================

    /// Insert a batch of events in a single transaction; returns rows written
    async fn insert_events(&self, events: &[NewEvent]) -> Result<u64, DataError>;

    /// Events with `start <= created_at < end`, projected for aggregation
    async fn load_window(&self, start: i64, end: i64) -> Result<Vec<EventSample>, DataError>;

    /// Delete events whose expiry is at or before `now`; returns rows deleted
    async fn delete_expired(&self, now: i64) -> Result<u64, DataError>;

    // ==================== Bucket Operations ====================

    /// Insert or overwrite the bucket keyed on (tenant, project, bucket_start)
    async fn upsert_bucket(&self, bucket: &MetricBucket) -> Result<(), DataError>;

    /// Buckets of one project starting at or after `since`, oldest first
    async fn list_buckets(
        &self,
        tenant: &str,
        project: &str,
        since: i64,
    ) -> Result<Vec<MetricBucket>, DataError>;

    // ==================== API Key Operations ====================

    async fn create_api_key(&self, key: &NewApiKey) -> Result<ApiKeyRow, DataError>;

    /// Active key by hash
    async fn get_api_key_by_hash(
        &self,
        key_hash: &str,
    ) -> Result<Option<ApiKeyValidation>, DataError>;

    async fn list_api_keys(&self, tenant: Option<&str>) -> Result<Vec<ApiKeyRow>, DataError>;

    /// Mark keys whose display prefix starts with `prefix` inactive; returns rows changed
    async fn deactivate_api_keys(&self, prefix: &str) -> Result<u64, DataError>;

    /// Insert the key, or re-own and re-activate an existing row with the same hash
    async fn ensure_api_key(&self, key: &NewApiKey) -> Result<(), DataError>;
}
