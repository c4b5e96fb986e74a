//! Self-reporting of this server's own requests
//!
//! Request events are queued on a bounded channel and posted to the server's
//! own ingestion endpoint with the internal API key. Delivery is best-effort:
//! a full queue, a timeout or an HTTP failure drops the event.

use std::sync::Arc;
use std::time::Duration;

use reqwest::header::{AUTHORIZATION, HeaderMap, HeaderValue};
use thiserror::Error;
use tokio::sync::{Semaphore, mpsc, watch};
use tokio::task::JoinHandle;

use super::ingest::RawEvent;
use crate::core::config::{ReportingConfig, ServerConfig, is_all_interfaces};

#[derive(Error, Debug)]
pub enum ReportingError {
    #[error("invalid internal API key: {0}")]
    InvalidKey(String),

    #[error("failed to build HTTP client: {0}")]
    Client(#[from] reqwest::Error),
}

/// Where and how self-reported events are delivered
#[derive(Debug, Clone)]
pub struct ReportingTarget {
    pub url: String,
    pub api_key: String,
    pub concurrency: usize,
    pub timeout: Duration,
    pub queue_capacity: usize,
}

impl ReportingTarget {
    /// Target for this server's own ingestion endpoint; None when reporting is off
    pub fn from_config(server: &ServerConfig, reporting: &ReportingConfig) -> Option<Self> {
        let api_key = reporting.internal_api_key.clone()?;
        Some(Self {
            url: ingest_url(&server.host, server.port),
            api_key,
            concurrency: reporting.concurrency,
            timeout: Duration::from_millis(reporting.timeout_ms),
            queue_capacity: reporting.queue_capacity,
        })
    }
}

/// Ingestion URL reachable from this host
///
/// A wildcard bind address is replaced by loopback; IPv6 hosts are bracketed.
pub fn ingest_url(host: &str, port: u16) -> String {
    let host = if is_all_interfaces(host) {
        "127.0.0.1"
    } else {
        host
    };
    if host.contains(':') && !host.starts_with('[') {
        format!("http://[{}]:{}/v1/events", host, port)
    } else {
        format!("http://{}:{}/v1/events", host, port)
    }
}

/// Handle for queueing self-report events; cheap to clone
#[derive(Debug, Clone)]
pub struct SelfReporter {
    tx: mpsc::Sender<RawEvent>,
}

impl SelfReporter {
    /// Start the dispatcher task and return the queue handle
    pub fn start(
        target: ReportingTarget,
        shutdown_rx: watch::Receiver<bool>,
    ) -> Result<(Self, JoinHandle<()>), ReportingError> {
        let mut headers = HeaderMap::new();
        let mut auth = HeaderValue::from_str(&format!("Bearer {}", target.api_key))
            .map_err(|e| ReportingError::InvalidKey(e.to_string()))?;
        auth.set_sensitive(true);
        headers.insert(AUTHORIZATION, auth);

        let client = reqwest::Client::builder()
            .timeout(target.timeout)
            .default_headers(headers)
            .build()?;

        let (reporter, rx) = Self::queue(target.queue_capacity);
        let semaphore = Arc::new(Semaphore::new(target.concurrency.max(1)));

        tracing::debug!(
            url = %target.url,
            concurrency = target.concurrency,
            "Self-reporting enabled"
        );

        let handle = tokio::spawn(dispatch(client, target.url, rx, semaphore, shutdown_rx));
        Ok((reporter, handle))
    }

    pub(crate) fn queue(capacity: usize) -> (Self, mpsc::Receiver<RawEvent>) {
        let (tx, rx) = mpsc::channel(capacity.max(1));
        (Self { tx }, rx)
    }

    /// Queue an event without waiting; returns false when it was dropped
    pub fn report(&self, event: RawEvent) -> bool {
        match self.tx.try_send(event) {
            Ok(()) => true,
            Err(e) => {
                tracing::trace!(error = %e, "Self-report dropped");
                false
            }
        }
    }
}

async fn dispatch(
    client: reqwest::Client,
    url: String,
    mut rx: mpsc::Receiver<RawEvent>,
    semaphore: Arc<Semaphore>,
    mut shutdown_rx: watch::Receiver<bool>,
) {
    loop {
        let event = tokio::select! {
            biased;
            _ = shutdown_rx.changed() => {
                if *shutdown_rx.borrow() {
                    tracing::debug!("Self-report dispatcher shutting down");
                    break;
                }
                continue;
            }
            event = rx.recv() => match event {
                Some(event) => event,
                None => break,
            },
        };

        let Ok(permit) = Arc::clone(&semaphore).acquire_owned().await else {
            break;
        };
        let client = client.clone();
        let url = url.clone();
        tokio::spawn(async move {
            let _permit = permit;
            let body = serde_json::json!({ "events": [event] });
            match client.post(&url).json(&body).send().await {
                Ok(resp) if resp.status().is_success() => {}
                Ok(resp) => tracing::trace!(status = %resp.status(), "Self-report rejected"),
                Err(e) => tracing::trace!(error = %e, "Self-report failed"),
            }
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::extract::State;
    use axum::http::{HeaderMap as AxumHeaderMap, StatusCode};
    use axum::routing::post;
    use axum::{Json, Router};

    fn target(url: String, queue_capacity: usize) -> ReportingTarget {
        ReportingTarget {
            url,
            api_key: "internal-key".to_string(),
            concurrency: 2,
            timeout: Duration::from_secs(2),
            queue_capacity,
        }
    }

    fn event(path: &str) -> RawEvent {
        RawEvent {
            path: path.to_string(),
            method: "GET".to_string(),
            status: 200,
            duration_ms: 3,
            ..Default::default()
        }
    }

    #[test]
    fn test_ingest_url() {
        assert_eq!(ingest_url("0.0.0.0", 8080), "http://127.0.0.1:8080/v1/events");
        assert_eq!(ingest_url("::", 9000), "http://127.0.0.1:9000/v1/events");
        assert_eq!(ingest_url("localhost", 80), "http://localhost:80/v1/events");
        assert_eq!(ingest_url("::1", 8080), "http://[::1]:8080/v1/events");
    }

    #[test]
    fn test_target_requires_internal_key() {
        let server = ServerConfig {
            host: "0.0.0.0".to_string(),
            port: 8080,
        };
        let mut reporting = ReportingConfig {
            internal_api_key: None,
            internal_tenant: "admin".to_string(),
            concurrency: 4,
            timeout_ms: 2000,
            queue_capacity: 16,
        };
        assert!(ReportingTarget::from_config(&server, &reporting).is_none());

        reporting.internal_api_key = Some("secret".to_string());
        let target = ReportingTarget::from_config(&server, &reporting).unwrap();
        assert_eq!(target.url, "http://127.0.0.1:8080/v1/events");
        assert_eq!(target.timeout, Duration::from_secs(2));
    }

    #[test]
    fn test_full_queue_drops_events() {
        let (reporter, mut rx) = SelfReporter::queue(1);

        assert!(reporter.report(event("/a")));
        assert!(!reporter.report(event("/b")));
        assert_eq!(rx.try_recv().unwrap().path, "/a");
        assert!(rx.try_recv().is_err());
    }

    #[test]
    fn test_closed_queue_drops_events() {
        let (reporter, rx) = SelfReporter::queue(4);
        drop(rx);
        assert!(!reporter.report(event("/a")));
    }

    #[tokio::test]
    async fn test_dispatcher_stops_on_shutdown() {
        let (shutdown_tx, shutdown_rx) = watch::channel(false);
        let (_reporter, handle) = SelfReporter::start(
            target("http://127.0.0.1:9/v1/events".to_string(), 4),
            shutdown_rx,
        )
        .unwrap();

        shutdown_tx.send(true).unwrap();
        tokio::time::timeout(Duration::from_secs(5), handle)
            .await
            .unwrap()
            .unwrap();
    }

    #[tokio::test]
    async fn test_events_posted_with_internal_key() {
        let (seen_tx, mut seen_rx) = mpsc::channel::<(Option<String>, serde_json::Value)>(4);
        let app = Router::new()
            .route(
                "/v1/events",
                post(
                    |State(seen): State<mpsc::Sender<(Option<String>, serde_json::Value)>>,
                     headers: AxumHeaderMap,
                     Json(body): Json<serde_json::Value>| async move {
                        let auth = headers
                            .get("authorization")
                            .and_then(|v| v.to_str().ok())
                            .map(String::from);
                        let _ = seen.send((auth, body)).await;
                        StatusCode::ACCEPTED
                    },
                ),
            )
            .with_state(seen_tx);

        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });

        let (_shutdown_tx, shutdown_rx) = watch::channel(false);
        let (reporter, _handle) = SelfReporter::start(
            target(format!("http://{}/v1/events", addr), 8),
            shutdown_rx,
        )
        .unwrap();

        assert!(reporter.report(event("/api/things")));

        let (auth, body) = tokio::time::timeout(Duration::from_secs(5), seen_rx.recv())
            .await
            .unwrap()
            .unwrap();
        assert_eq!(auth.as_deref(), Some("Bearer internal-key"));
        assert_eq!(body["events"][0]["path"], "/api/things");
        assert_eq!(body["events"][0]["duration_ms"], 3);
    }
}
