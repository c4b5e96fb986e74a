//! Prometheus exposition of the live request counters
//!
//! Authenticated by the `api-key` query parameter so scrapers need no
//! header configuration. Only the key's own project is rendered.

use std::sync::Arc;

use axum::Router;
use axum::extract::{Query, State};
use axum::http::header;
use axum::response::{IntoResponse, Response};
use axum::routing::get;
use serde::Deserialize;

use crate::api::auth::api_key::validate_api_key;
use crate::api::auth::{ApiKeyAuthError, ApiKeyAuthState};
use crate::domain::PrometheusRegistry;

const PROMETHEUS_CONTENT_TYPE: &str = "text/plain; version=0.0.4; charset=utf-8";

#[derive(Clone)]
pub struct MetricsApiState {
    pub registry: Arc<PrometheusRegistry>,
    pub auth: ApiKeyAuthState,
}

#[derive(Debug, Deserialize)]
pub struct MetricsQuery {
    #[serde(rename = "api-key")]
    pub api_key: Option<String>,
}

/// Render the key's project metrics in text exposition format
pub async fn project_metrics(
    State(state): State<MetricsApiState>,
    Query(query): Query<MetricsQuery>,
) -> Result<Response, ApiKeyAuthError> {
    let token = query.api_key.ok_or(ApiKeyAuthError::Missing)?;
    let token = token.trim();
    if token.is_empty() {
        return Err(ApiKeyAuthError::EmptyToken);
    }

    let auth = validate_api_key(state.auth.repo.as_ref(), &state.auth.api_key_secret, token).await?;
    let body = state.registry.render(Some(&auth.project));

    Ok((
        [
            (header::CONTENT_TYPE, PROMETHEUS_CONTENT_TYPE),
            (header::CACHE_CONTROL, "no-store"),
        ],
        body,
    )
        .into_response())
}

pub fn routes(registry: Arc<PrometheusRegistry>, auth: ApiKeyAuthState) -> Router<()> {
    Router::new()
        .route("/v1/metrics", get(project_metrics))
        .with_state(MetricsApiState { registry, auth })
}
