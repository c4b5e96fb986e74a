//! EventRepository implementation for PostgreSQL

use std::sync::Arc;

use async_trait::async_trait;

use crate::data::error::DataError;
use crate::data::traits::EventRepository;
use crate::data::types::{ApiKeyRow, ApiKeyValidation, EventSample, MetricBucket, NewApiKey, NewEvent};

use super::PostgresService;
use super::repositories::{api_key, bucket, event};

#[async_trait]
impl EventRepository for Arc<PostgresService> {
    // ==================== Event Operations ====================

    async fn insert_events(&self, events: &[NewEvent]) -> Result<u64, DataError> {
        event::insert_events(self.pool(), events)
            .await
            .map_err(Into::into)
    }

    async fn load_window(&self, start: i64, end: i64) -> Result<Vec<EventSample>, DataError> {
        event::load_window(self.pool(), start, end)
            .await
            .map_err(Into::into)
    }

    async fn delete_expired(&self, now: i64) -> Result<u64, DataError> {
        event::delete_expired(self.pool(), now)
            .await
            .map_err(Into::into)
    }

    // ==================== Bucket Operations ====================

    async fn upsert_bucket(&self, b: &MetricBucket) -> Result<(), DataError> {
        bucket::upsert_bucket(self.pool(), b)
            .await
            .map_err(Into::into)
    }

    async fn list_buckets(
        &self,
        tenant: &str,
        project: &str,
        since: i64,
    ) -> Result<Vec<MetricBucket>, DataError> {
        bucket::list_buckets(self.pool(), tenant, project, since)
            .await
            .map_err(Into::into)
    }

    // ==================== API Key Operations ====================

    async fn create_api_key(&self, key: &NewApiKey) -> Result<ApiKeyRow, DataError> {
        api_key::create_api_key(self.pool(), key)
            .await
            .map_err(Into::into)
    }

    async fn get_api_key_by_hash(
        &self,
        key_hash: &str,
    ) -> Result<Option<ApiKeyValidation>, DataError> {
        api_key::get_by_hash(self.pool(), key_hash)
            .await
            .map_err(Into::into)
    }

    async fn list_api_keys(&self, tenant: Option<&str>) -> Result<Vec<ApiKeyRow>, DataError> {
        api_key::list_api_keys(self.pool(), tenant)
            .await
            .map_err(Into::into)
    }

    async fn deactivate_api_keys(&self, prefix: &str) -> Result<u64, DataError> {
        api_key::deactivate_by_prefix(self.pool(), prefix)
            .await
            .map_err(Into::into)
    }

    async fn ensure_api_key(&self, key: &NewApiKey) -> Result<(), DataError> {
        api_key::ensure_api_key(self.pool(), key)
            .await
            .map_err(Into::into)
    }
}
