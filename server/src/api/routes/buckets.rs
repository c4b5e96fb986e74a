//! Hourly bucket read-out for the key's project

use std::sync::Arc;

use axum::extract::State;
use axum::routing::get;
use axum::{Json, Router};
use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use validator::{Validate, ValidationError};

use crate::api::auth::{ApiKeyAuthState, ApiKeyContext, require_api_key};
use crate::api::extractors::ValidatedQuery;
use crate::api::types::ApiError;
use crate::core::constants::{DEFAULT_BUCKET_LOOKBACK_HOURS, MAX_BUCKET_LOOKBACK_HOURS};
use crate::data::{EventRepository, MetricBucket};
use crate::utils::time::{datetime_to_micros, micros_to_datetime, truncate_to_hour};

#[derive(Clone)]
pub struct BucketsApiState {
    pub repo: Arc<dyn EventRepository>,
}

fn default_hours() -> u32 {
    DEFAULT_BUCKET_LOOKBACK_HOURS
}

/// Validator for the look-back window
pub fn validate_hours(hours: u32) -> Result<(), ValidationError> {
    if hours == 0 || hours > MAX_BUCKET_LOOKBACK_HOURS {
        return Err(ValidationError::new("hours_range").with_message(
            format!("hours must be between 1 and {}", MAX_BUCKET_LOOKBACK_HOURS).into(),
        ));
    }
    Ok(())
}

#[derive(Debug, Deserialize, Validate)]
pub struct BucketsQuery {
    #[serde(default = "default_hours")]
    #[validate(custom(function = "validate_hours"))]
    pub hours: u32,
}

#[derive(Debug, Serialize)]
pub struct BucketDto {
    pub bucket_start: DateTime<Utc>,
    pub total_count: i64,
    pub error_count: i64,
    pub error_rate: f64,
    pub p50_ms: i64,
    pub p95_ms: i64,
    pub p99_ms: i64,
}

impl From<MetricBucket> for BucketDto {
    fn from(b: MetricBucket) -> Self {
        Self {
            bucket_start: micros_to_datetime(b.bucket_start),
            error_rate: b.error_rate(),
            total_count: b.total_count,
            error_count: b.error_count,
            p50_ms: b.p50_ms,
            p95_ms: b.p95_ms,
            p99_ms: b.p99_ms,
        }
    }
}

#[derive(Debug, Serialize)]
pub struct BucketsResponse {
    pub buckets: Vec<BucketDto>,
}

/// Buckets of the key's project starting within the last `hours` hours, oldest first
pub async fn list_buckets(
    State(state): State<BucketsApiState>,
    auth: ApiKeyContext,
    ValidatedQuery(query): ValidatedQuery<BucketsQuery>,
) -> Result<Json<BucketsResponse>, ApiError> {
    let since = truncate_to_hour(Utc::now() - Duration::hours(i64::from(query.hours)));
    let buckets = state
        .repo
        .list_buckets(&auth.tenant, &auth.project, datetime_to_micros(since))
        .await
        .map_err(ApiError::from_data)?;

    Ok(Json(BucketsResponse {
        buckets: buckets.into_iter().map(BucketDto::from).collect(),
    }))
}

/// Build bucket routes (bearer API key required)
pub fn routes(repo: Arc<dyn EventRepository>, auth: ApiKeyAuthState) -> Router<()> {
    Router::new()
        .route("/v1/buckets", get(list_buckets))
        .layer(axum::middleware::from_fn_with_state(auth, require_api_key))
        .with_state(BucketsApiState { repo })
}
