//! API key authentication and validation
//!
//! Keys are presented as `Authorization: Bearer <key>` and looked up by their
//! HMAC hash. A valid key scopes the request to its tenant and project.

use std::fmt;
use std::sync::Arc;

use axum::Json;
use axum::extract::{FromRequestParts, Request, State};
use axum::http::request::Parts;
use axum::http::{StatusCode, header};
use axum::middleware::Next;
use axum::response::{IntoResponse, Response};
use serde_json::json;

use crate::data::{DataError, EventRepository};
use crate::utils::api_key::{BearerError, extract_bearer_token, hash_api_key};

/// API key authentication error
#[derive(Debug)]
pub enum ApiKeyAuthError {
    /// No auth header provided
    Missing,
    /// Header is not `Bearer <key>`
    InvalidFormat,
    /// Bearer token is blank
    EmptyToken,
    /// Key doesn't exist or is inactive
    InvalidKey,
    /// Key lookup failed
    Lookup(DataError),
}

impl fmt::Display for ApiKeyAuthError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Missing => write!(f, "Authorization header required"),
            Self::InvalidFormat => write!(f, "Invalid authorization header format"),
            Self::EmptyToken => write!(f, "Empty API key"),
            Self::InvalidKey => write!(f, "Invalid or inactive API key"),
            Self::Lookup(_) => write!(f, "API key lookup failed"),
        }
    }
}

impl From<BearerError> for ApiKeyAuthError {
    fn from(e: BearerError) -> Self {
        match e {
            BearerError::InvalidFormat => Self::InvalidFormat,
            BearerError::EmptyToken => Self::EmptyToken,
        }
    }
}

impl IntoResponse for ApiKeyAuthError {
    fn into_response(self) -> Response {
        match self {
            ApiKeyAuthError::Lookup(e) => {
                tracing::error!(error = %e, "Database error during API key lookup");
                let body = json!({
                    "error": "internal_error",
                    "code": "INTERNAL",
                    "message": "Database operation failed",
                });
                (StatusCode::INTERNAL_SERVER_ERROR, Json(body)).into_response()
            }
            other => {
                let code = match &other {
                    ApiKeyAuthError::Missing => "AUTH_REQUIRED",
                    _ => "API_KEY_INVALID",
                };
                let body = json!({
                    "error": "unauthorized",
                    "code": code,
                    "message": other.to_string(),
                });
                (StatusCode::UNAUTHORIZED, Json(body)).into_response()
            }
        }
    }
}

/// Tenant and project an authenticated request is scoped to
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ApiKeyContext {
    pub key_id: String,
    pub tenant: String,
    pub project: String,
    /// Key override (0 = use global)
    pub retention_days: i64,
}

/// Look up an active key by its raw token
pub async fn validate_api_key(
    repo: &dyn EventRepository,
    api_key_secret: &[u8],
    token: &str,
) -> Result<ApiKeyContext, ApiKeyAuthError> {
    let key_hash = hash_api_key(token, api_key_secret);
    let validation = repo
        .get_api_key_by_hash(&key_hash)
        .await
        .map_err(ApiKeyAuthError::Lookup)?
        .ok_or(ApiKeyAuthError::InvalidKey)?;

    Ok(ApiKeyContext {
        key_id: validation.key_id,
        tenant: validation.tenant,
        project: validation.project,
        retention_days: validation.retention_days,
    })
}

/// State for the API key middleware
#[derive(Clone)]
pub struct ApiKeyAuthState {
    pub repo: Arc<dyn EventRepository>,
    pub api_key_secret: Arc<[u8]>,
}

/// Require a valid bearer API key; the resolved [`ApiKeyContext`] is added
/// to the request extensions
pub async fn require_api_key(
    State(state): State<ApiKeyAuthState>,
    mut request: Request,
    next: Next,
) -> Result<Response, ApiKeyAuthError> {
    let auth_header = request
        .headers()
        .get(header::AUTHORIZATION)
        .and_then(|h| h.to_str().ok())
        .ok_or(ApiKeyAuthError::Missing)?;

    let token = extract_bearer_token(auth_header)?;
    let context = validate_api_key(state.repo.as_ref(), &state.api_key_secret, token).await?;

    tracing::trace!(tenant = %context.tenant, project = %context.project, "API key authenticated");
    request.extensions_mut().insert(context);
    Ok(next.run(request).await)
}

impl<S> FromRequestParts<S> for ApiKeyContext
where
    S: Send + Sync,
{
    type Rejection = ApiKeyAuthError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        parts
            .extensions
            .get::<ApiKeyContext>()
            .cloned()
            .ok_or(ApiKeyAuthError::Missing)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::sqlite::SqliteService;
    use crate::data::{NewApiKey, TransactionalService};
    use crate::utils::api_key::key_prefix;
    use axum::Router;
    use axum::body::{Body, to_bytes};
    use axum::http::Request as HttpRequest;
    use axum::routing::get;
    use tower::ServiceExt;

    const SECRET: &[u8] = b"auth-test-secret";
    const TOKEN: &str = "ak-testtesttesttesttesttesttesttesttesttest";

    async fn state() -> ApiKeyAuthState {
        let service = SqliteService::in_memory().await.unwrap();
        let repo = TransactionalService::Sqlite(Arc::new(service)).repository();
        repo.create_api_key(&NewApiKey {
            tenant: "42".to_string(),
            name: "payments".to_string(),
            environment: "prod".to_string(),
            key_hash: hash_api_key(TOKEN, SECRET),
            key_prefix: key_prefix(TOKEN),
            retention_days: 7,
        })
        .await
        .unwrap();
        ApiKeyAuthState {
            repo,
            api_key_secret: Arc::from(SECRET),
        }
    }

    fn app(state: ApiKeyAuthState) -> Router {
        Router::new()
            .route(
                "/whoami",
                get(|ctx: ApiKeyContext| async move {
                    format!("{}/{}/{}", ctx.tenant, ctx.project, ctx.retention_days)
                }),
            )
            .layer(axum::middleware::from_fn_with_state(state, require_api_key))
    }

    async fn call(state: ApiKeyAuthState, auth: Option<&str>) -> (StatusCode, String) {
        let mut builder = HttpRequest::builder().uri("/whoami");
        if let Some(auth) = auth {
            builder = builder.header(header::AUTHORIZATION, auth);
        }
        let resp = app(state)
            .oneshot(builder.body(Body::empty()).unwrap())
            .await
            .unwrap();
        let status = resp.status();
        let bytes = to_bytes(resp.into_body(), usize::MAX).await.unwrap();
        (status, String::from_utf8(bytes.to_vec()).unwrap())
    }

    #[test]
    fn test_api_key_auth_error_display() {
        assert_eq!(
            ApiKeyAuthError::Missing.to_string(),
            "Authorization header required"
        );
        assert_eq!(
            ApiKeyAuthError::InvalidFormat.to_string(),
            "Invalid authorization header format"
        );
        assert_eq!(ApiKeyAuthError::EmptyToken.to_string(), "Empty API key");
        assert_eq!(
            ApiKeyAuthError::InvalidKey.to_string(),
            "Invalid or inactive API key"
        );
    }

    #[tokio::test]
    async fn test_valid_key_scopes_request() {
        let (status, body) = call(state().await, Some(&format!("Bearer {}", TOKEN))).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body, "42/payments/7");
    }

    #[tokio::test]
    async fn test_missing_header() {
        let (status, body) = call(state().await, None).await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);
        assert!(body.contains("AUTH_REQUIRED"));
        assert!(body.contains("Authorization header required"));
    }

    #[tokio::test]
    async fn test_non_bearer_header() {
        let (status, body) = call(state().await, Some("Basic Zm9vOmJhcg==")).await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);
        assert!(body.contains("Invalid authorization header format"));
    }

    #[tokio::test]
    async fn test_empty_token() {
        let (status, body) = call(state().await, Some("Bearer   ")).await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);
        assert!(body.contains("Empty API key"));
    }

    #[tokio::test]
    async fn test_unknown_and_inactive_keys() {
        let state = state().await;
        let (status, _) = call(state.clone(), Some("Bearer ak-unknown")).await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);

        state
            .repo
            .deactivate_api_keys(&key_prefix(TOKEN))
            .await
            .unwrap();
        let (status, body) = call(state, Some(&format!("Bearer {}", TOKEN))).await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);
        assert!(body.contains("Invalid or inactive API key"));
    }
}
