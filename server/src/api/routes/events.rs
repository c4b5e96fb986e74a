//! Event ingestion endpoint

use axum::extract::{DefaultBodyLimit, State};
use axum::http::StatusCode;
use axum::routing::post;
use axum::{Json, Router};
use serde::{Deserialize, Serialize};
use validator::{Validate, ValidationError};

use crate::api::auth::{ApiKeyAuthState, ApiKeyContext, require_api_key};
use crate::api::extractors::ValidatedJson;
use crate::api::types::ApiError;
use crate::core::constants::{INGEST_BODY_LIMIT, MAX_EVENTS_PER_BATCH};
use crate::domain::{Ingestor, RawEvent};
use crate::utils::json::null_as_default;

#[derive(Clone)]
pub struct EventsApiState {
    pub ingestor: Ingestor,
}

/// Validator for the batch size; empty batches are rejected by ingestion
pub fn validate_events_batch<T: AsRef<[RawEvent]>>(events: T) -> Result<(), ValidationError> {
    if events.as_ref().len() > MAX_EVENTS_PER_BATCH {
        return Err(ValidationError::new("events_too_many").with_message(
            format!("Cannot ingest more than {} events at once", MAX_EVENTS_PER_BATCH).into(),
        ));
    }
    Ok(())
}

#[derive(Debug, Deserialize, Validate)]
pub struct IngestRequest {
    #[serde(default, deserialize_with = "null_as_default")]
    #[validate(custom(function = "validate_events_batch"))]
    pub events: Vec<RawEvent>,
}

#[derive(Debug, Serialize)]
pub struct IngestResponse {
    pub status: &'static str,
    pub count: usize,
}

/// Ingest a batch of events for the key's tenant and project
pub async fn ingest_events(
    State(state): State<EventsApiState>,
    auth: ApiKeyContext,
    ValidatedJson(request): ValidatedJson<IngestRequest>,
) -> Result<(StatusCode, Json<IngestResponse>), ApiError> {
    let count = state
        .ingestor
        .ingest(
            &auth.tenant,
            &auth.project,
            auth.retention_days,
            request.events,
        )
        .await?;

    Ok((
        StatusCode::ACCEPTED,
        Json(IngestResponse {
            status: "accepted",
            count,
        }),
    ))
}

/// Build ingestion routes (bearer API key required)
pub fn routes(ingestor: Ingestor, auth: ApiKeyAuthState) -> Router<()> {
    Router::new()
        .route("/v1/events", post(ingest_events))
        .layer(axum::middleware::from_fn_with_state(auth, require_api_key))
        .layer(DefaultBodyLimit::max(INGEST_BODY_LIMIT))
        .with_state(EventsApiState { ingestor })
}
