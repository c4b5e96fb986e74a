//! HTTP middleware (self-reporting, 404 handler)

use std::net::SocketAddr;
use std::time::Instant;

use axum::body::to_bytes;
use axum::extract::{ConnectInfo, Request, State};
use axum::http::StatusCode;
use axum::middleware::Next;
use axum::response::{IntoResponse, Response};
use chrono::Utc;
use serde_json::{Map, Value};

use crate::core::constants::{INTERNAL_ENVIRONMENT, REPORTING_SKIP_PATHS};
use crate::domain::{RawEvent, SelfReporter};

/// Whether requests to `path` are reported to our own ingestion endpoint
pub fn should_report(path: &str) -> bool {
    !REPORTING_SKIP_PATHS.contains(&path)
}

/// Measure each request and queue it as an event for self-reporting
///
/// Never delays or alters the response; a full queue drops the event.
pub async fn self_report(
    State(reporter): State<SelfReporter>,
    request: Request,
    next: Next,
) -> Response {
    let path = request.uri().path().to_string();
    if !should_report(&path) {
        return next.run(request).await;
    }

    let method = request.method().to_string();
    let remote_ip = request
        .extensions()
        .get::<ConnectInfo<SocketAddr>>()
        .map(|ConnectInfo(addr)| addr.ip().to_string())
        .unwrap_or_default();
    let timestamp = Utc::now();
    let started = Instant::now();

    let response = next.run(request).await;

    let mut attributes = Map::new();
    attributes.insert(
        "env".to_string(),
        Value::String(INTERNAL_ENVIRONMENT.to_string()),
    );
    reporter.report(RawEvent {
        timestamp: Some(timestamp),
        path,
        method,
        status: i32::from(response.status().as_u16()),
        duration_ms: i64::try_from(started.elapsed().as_millis()).unwrap_or(i64::MAX),
        remote_ip,
        attributes,
    });

    response
}

const MAX_404_BODY_LOG: usize = 64 * 1024; // 64KB limit for logging

/// Handle 404 Not Found with logging
pub async fn handle_404(req: Request) -> impl IntoResponse {
    if !tracing::enabled!(tracing::Level::DEBUG) {
        return StatusCode::NOT_FOUND;
    }

    let method = req.method().clone();
    let uri = req.uri().clone();

    let body_bytes = match to_bytes(req.into_body(), MAX_404_BODY_LOG).await {
        Ok(bytes) => bytes,
        Err(_) => {
            tracing::debug!("[404] {} {} (failed to read body)", method, uri);
            return StatusCode::NOT_FOUND;
        }
    };

    let body = if body_bytes.is_empty() {
        String::new()
    } else {
        String::from_utf8(body_bytes.to_vec())
            .unwrap_or_else(|_| format!("<binary {} bytes>", body_bytes.len()))
    };

    tracing::debug!(method = %method, uri = %uri, body = %body, "[404]");

    StatusCode::NOT_FOUND
}
