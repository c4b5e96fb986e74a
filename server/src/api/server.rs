//! API server initialization

use std::net::SocketAddr;
use std::sync::Arc;

use anyhow::{Context, Result};
use axum::Router;
use axum::extract::DefaultBodyLimit;
use axum::routing::get;
use tokio::net::TcpListener;
use tower_http::compression::CompressionLayer;
use tower_http::trace::TraceLayer;

use super::auth::ApiKeyAuthState;
use super::middleware::{self, self_report};
use super::routes::{buckets, events, health, metrics};
use crate::core::ShutdownService;
use crate::core::config::ServerConfig;
use crate::core::constants::DEFAULT_BODY_LIMIT;
use crate::data::EventRepository;
use crate::domain::{Ingestor, PrometheusRegistry, RetentionPolicy, SelfReporter};

/// Everything the HTTP layer needs from the application
#[derive(Clone)]
pub struct AppState {
    pub repo: Arc<dyn EventRepository>,
    pub registry: Arc<PrometheusRegistry>,
    pub api_key_secret: Arc<[u8]>,
    pub retention: RetentionPolicy,
    /// Present when self-reporting is enabled
    pub reporter: Option<SelfReporter>,
}

/// Build the application router
pub fn build_router(state: AppState) -> Router {
    let AppState {
        repo,
        registry,
        api_key_secret,
        retention,
        reporter,
    } = state;

    let auth = ApiKeyAuthState {
        repo: Arc::clone(&repo),
        api_key_secret,
    };
    let ingestor = Ingestor::new(Arc::clone(&repo), registry.clone(), retention);

    let router = Router::new()
        .route("/healthz", get(health::healthz))
        .route("/api/v1/health", get(health::health))
        .merge(events::routes(ingestor, auth.clone()))
        .merge(metrics::routes(registry, auth.clone()))
        .merge(buckets::routes(repo, auth))
        .fallback(middleware::handle_404);

    let router = match reporter {
        Some(reporter) => router.layer(axum::middleware::from_fn_with_state(reporter, self_report)),
        None => router,
    };

    router
        .layer(CompressionLayer::new())
        .layer(TraceLayer::new_for_http())
        .layer(DefaultBodyLimit::max(DEFAULT_BODY_LIMIT))
}

pub struct ApiServer {
    config: ServerConfig,
    state: AppState,
    shutdown: ShutdownService,
}

impl ApiServer {
    pub fn new(config: ServerConfig, state: AppState, shutdown: ShutdownService) -> Self {
        Self {
            config,
            state,
            shutdown,
        }
    }

    /// Serve until shutdown is triggered
    pub async fn start(self) -> Result<()> {
        let Self {
            config,
            state,
            shutdown,
        } = self;

        let listener = TcpListener::bind((config.host.as_str(), config.port))
            .await
            .with_context(|| format!("Failed to bind {}:{}", config.host, config.port))?;
        let addr = listener.local_addr()?;
        tracing::info!(address = %addr, "Server listening");

        let router = build_router(state);
        axum::serve(
            listener,
            router.into_make_service_with_connect_info::<SocketAddr>(),
        )
        .with_graceful_shutdown(shutdown.wait())
        .await?;

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::constants::MAX_EVENTS_PER_BATCH;
    use crate::data::sqlite::SqliteService;
    use crate::data::{NewApiKey, TransactionalService};
    use crate::domain::aggregation::aggregate_window;
    use crate::utils::api_key::{hash_api_key, key_prefix};
    use crate::utils::time::previous_hour_start;
    use axum::body::{Body, to_bytes};
    use axum::http::{Request, StatusCode, header};
    use axum::response::Response;
    use chrono::{Duration, Utc};
    use tower::ServiceExt;

    const SECRET: &[u8] = b"server-test-secret";
    const TOKEN: &str = "ak-servertestservertestservertestserverte";
    const OTHER_TOKEN: &str = "ak-othertestothertestothertestothertestot";

    async fn state() -> AppState {
        let service = SqliteService::in_memory().await.unwrap();
        let repo = TransactionalService::Sqlite(Arc::new(service)).repository();
        for (token, name) in [(TOKEN, "payments"), (OTHER_TOKEN, "search")] {
            repo.create_api_key(&NewApiKey {
                tenant: "42".to_string(),
                name: name.to_string(),
                environment: "prod".to_string(),
                key_hash: hash_api_key(token, SECRET),
                key_prefix: key_prefix(token),
                retention_days: 0,
            })
            .await
            .unwrap();
        }
        AppState {
            repo,
            registry: Arc::new(PrometheusRegistry::new().unwrap()),
            api_key_secret: Arc::from(SECRET),
            retention: RetentionPolicy::new(30),
            reporter: None,
        }
    }

    fn ingest_request(token: &str, body: &str) -> Request<Body> {
        Request::builder()
            .method("POST")
            .uri("/v1/events")
            .header(header::AUTHORIZATION, format!("Bearer {}", token))
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from(body.to_string()))
            .unwrap()
    }

    async fn body_string(resp: Response) -> String {
        let bytes = to_bytes(resp.into_body(), usize::MAX).await.unwrap();
        String::from_utf8(bytes.to_vec()).unwrap()
    }

    async fn body_json(resp: Response) -> serde_json::Value {
        serde_json::from_str(&body_string(resp).await).unwrap()
    }

    #[tokio::test]
    async fn test_healthz() {
        let resp = build_router(state().await)
            .oneshot(Request::builder().uri("/healthz").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(resp.status(), StatusCode::OK);
        assert_eq!(body_string(resp).await, "ok");
    }

    #[tokio::test]
    async fn test_health_reports_version() {
        let resp = build_router(state().await)
            .oneshot(Request::builder().uri("/api/v1/health").body(Body::empty()).unwrap())
            .await
            .unwrap();
        let body = body_json(resp).await;
        assert_eq!(body["status"], "ok");
        assert_eq!(body["version"], env!("CARGO_PKG_VERSION"));
    }

    #[tokio::test]
    async fn test_ingest_partial_batch() {
        let app = build_router(state().await);
        let resp = app
            .oneshot(ingest_request(
                TOKEN,
                r#"{"events":[{"path":"/a","duration_ms":5},{"path":"","duration_ms":5}]}"#,
            ))
            .await
            .unwrap();

        assert_eq!(resp.status(), StatusCode::ACCEPTED);
        let body = body_json(resp).await;
        assert_eq!(body["status"], "accepted");
        assert_eq!(body["count"], 1);
    }

    #[tokio::test]
    async fn test_ingest_null_fields_treated_as_absent() {
        let state = state().await;
        let repo = Arc::clone(&state.repo);
        let app = build_router(state);

        let resp = app
            .clone()
            .oneshot(ingest_request(
                TOKEN,
                r#"{"events":[{"path":"/a","attributes":null,"remote_ip":null},{"path":null}]}"#,
            ))
            .await
            .unwrap();
        assert_eq!(resp.status(), StatusCode::ACCEPTED);
        assert_eq!(body_json(resp).await["count"], 1);

        let stored = repo.load_window(i64::MIN, i64::MAX).await.unwrap();
        assert_eq!(stored.len(), 1);
        assert_eq!(stored[0].project, "payments");

        let resp = app
            .oneshot(ingest_request(TOKEN, r#"{"events":null}"#))
            .await
            .unwrap();
        assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
        assert_eq!(body_json(resp).await["code"], "NO_EVENTS");
    }

    #[tokio::test]
    async fn test_ingest_rejects_invalid_batches() {
        let state = state().await;
        let repo = Arc::clone(&state.repo);
        let app = build_router(state);

        let resp = app
            .clone()
            .oneshot(ingest_request(TOKEN, r#"{"events":[{"path":"","duration_ms":5}]}"#))
            .await
            .unwrap();
        assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
        assert_eq!(body_json(resp).await["code"], "NO_VALID_EVENTS");

        let resp = app
            .clone()
            .oneshot(ingest_request(TOKEN, r#"{"events":[]}"#))
            .await
            .unwrap();
        assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
        assert_eq!(body_json(resp).await["code"], "NO_EVENTS");

        let resp = app
            .oneshot(ingest_request(TOKEN, r#"{"events":[{"path":"/a""#))
            .await
            .unwrap();
        assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
        assert_eq!(body_json(resp).await["code"], "JSON_PARSE_ERROR");

        assert!(repo.load_window(i64::MIN, i64::MAX).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_ingest_rejects_oversized_batch() {
        let state = state().await;
        let repo = Arc::clone(&state.repo);
        let app = build_router(state);

        let events = vec![r#"{"path":"/a"}"#; MAX_EVENTS_PER_BATCH + 1].join(",");
        let resp = app
            .oneshot(ingest_request(TOKEN, &format!(r#"{{"events":[{}]}}"#, events)))
            .await
            .unwrap();
        assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
        assert_eq!(body_json(resp).await["code"], "VALIDATION_ERROR");
        assert!(repo.load_window(i64::MIN, i64::MAX).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_ingest_requires_bearer_key() {
        let app = build_router(state().await);
        let resp = app
            .oneshot(
                Request::builder()
                    .method("POST")
                    .uri("/v1/events")
                    .header(header::CONTENT_TYPE, "application/json")
                    .body(Body::from(r#"{"events":[{"path":"/a"}]}"#))
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(resp.status(), StatusCode::UNAUTHORIZED);
        assert_eq!(body_json(resp).await["error"], "unauthorized");
    }

    #[tokio::test]
    async fn test_metrics_filtered_to_key_project() {
        let app = build_router(state().await);
        app.clone()
            .oneshot(ingest_request(TOKEN, r#"{"events":[{"path":"/pay","method":"POST","status":201,"duration_ms":40}]}"#))
            .await
            .unwrap();
        app.clone()
            .oneshot(ingest_request(OTHER_TOKEN, r#"{"events":[{"path":"/find","method":"GET","status":200,"duration_ms":10}]}"#))
            .await
            .unwrap();

        let resp = app
            .oneshot(
                Request::builder()
                    .uri(format!("/v1/metrics?api-key={}", TOKEN))
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(resp.status(), StatusCode::OK);
        assert_eq!(resp.headers()[header::CACHE_CONTROL], "no-store");

        let text = body_string(resp).await;
        assert!(text.contains(
            r#"apiinsight_requests_total{method="POST",project="payments",route="/pay",status="201"} 1"#
        ));
        assert!(!text.contains("search"));
        assert!(!text.contains("/find"));
    }

    #[tokio::test]
    async fn test_metrics_rejects_missing_or_unknown_key() {
        let app = build_router(state().await);
        let resp = app
            .clone()
            .oneshot(Request::builder().uri("/v1/metrics").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(resp.status(), StatusCode::UNAUTHORIZED);

        let resp = app
            .oneshot(
                Request::builder()
                    .uri("/v1/metrics?api-key=ak-nope")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(resp.status(), StatusCode::UNAUTHORIZED);
    }

    #[tokio::test]
    async fn test_buckets_read_out() {
        let state = state().await;
        let repo = Arc::clone(&state.repo);
        let app = build_router(state);

        let hour = previous_hour_start(Utc::now());
        let ts = (hour + Duration::minutes(1)).to_rfc3339();
        let body = format!(
            r#"{{"events":[
                {{"timestamp":"{ts}","path":"/a","status":200,"duration_ms":10}},
                {{"timestamp":"{ts}","path":"/a","status":500,"duration_ms":20}},
                {{"timestamp":"{ts}","path":"/a","status":200,"duration_ms":30}},
                {{"timestamp":"{ts}","path":"/a","status":200,"duration_ms":40}}
            ]}}"#
        );
        let resp = app.clone().oneshot(ingest_request(TOKEN, &body)).await.unwrap();
        assert_eq!(resp.status(), StatusCode::ACCEPTED);

        aggregate_window(repo.as_ref(), hour).await.unwrap();

        let resp = app
            .clone()
            .oneshot(
                Request::builder()
                    .uri("/v1/buckets?hours=2")
                    .header(header::AUTHORIZATION, format!("Bearer {}", TOKEN))
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(resp.status(), StatusCode::OK);
        let body = body_json(resp).await;
        let buckets = body["buckets"].as_array().unwrap();
        assert_eq!(buckets.len(), 1);
        assert_eq!(buckets[0]["total_count"], 4);
        assert_eq!(buckets[0]["error_count"], 1);
        assert_eq!(buckets[0]["error_rate"], 0.25);
        assert_eq!(buckets[0]["p50_ms"], 30);

        // Other project under the same tenant sees nothing
        let resp = app
            .clone()
            .oneshot(
                Request::builder()
                    .uri("/v1/buckets")
                    .header(header::AUTHORIZATION, format!("Bearer {}", OTHER_TOKEN))
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert!(body_json(resp).await["buckets"].as_array().unwrap().is_empty());

        let resp = app
            .oneshot(
                Request::builder()
                    .uri("/v1/buckets?hours=721")
                    .header(header::AUTHORIZATION, format!("Bearer {}", TOKEN))
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn test_unknown_route_is_404() {
        let resp = build_router(state().await)
            .oneshot(Request::builder().uri("/nope").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(resp.status(), StatusCode::NOT_FOUND);
    }
}
