//! API key rows

use serde::Serialize;

/// Key to insert; only the hash of the token is stored
#[derive(Debug, Clone)]
pub struct NewApiKey {
    pub tenant: String,
    pub name: String,
    pub environment: String,
    pub key_hash: String,
    pub key_prefix: String,
    pub retention_days: u32,
}

/// API key row from database (never includes the hash)
#[derive(Debug, Clone, Serialize)]
pub struct ApiKeyRow {
    pub id: String,
    pub tenant: String,
    pub name: String,
    pub environment: String,
    pub key_prefix: String,
    pub retention_days: i64,
    pub active: bool,
    pub created_at: i64,
}

/// What authentication needs to know about an active key
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ApiKeyValidation {
    pub key_id: String,
    pub tenant: String,
    /// Project events are recorded under (the key's name)
    pub project: String,
    pub environment: String,
    pub retention_days: i64,
}
