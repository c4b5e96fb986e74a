//! API key authentication

pub mod api_key;

pub use api_key::{ApiKeyAuthError, ApiKeyAuthState, ApiKeyContext, require_api_key};
