//! API key generation and hashing utilities
//!
//! Keys are stored only as HMAC-SHA256 digests keyed with a server secret.

use hmac::{Hmac, Mac};
use rand::Rng;
use rand::rngs::OsRng;
use sha2::Sha256;

use crate::core::constants::{API_KEY_PREFIX, API_KEY_PREFIX_DISPLAY_LEN, API_KEY_RANDOM_LENGTH};

type HmacSha256 = Hmac<Sha256>;

const CHARSET: &[u8] = b"abcdefghijklmnopqrstuvwxyz0123456789";

/// Generate opaque API key: ak-{random_40chars}
pub fn generate_api_key() -> String {
    let random: String = (0..API_KEY_RANDOM_LENGTH)
        .map(|_| CHARSET[OsRng.gen_range(0..CHARSET.len())] as char)
        .collect();
    format!("{}{}", API_KEY_PREFIX, random)
}

/// HMAC-SHA256 hash of key with server secret (hex encoded)
pub fn hash_api_key(key: &str, server_secret: &[u8]) -> String {
    let mut mac = HmacSha256::new_from_slice(server_secret).expect("HMAC accepts any key length");
    mac.update(key.as_bytes());
    hex::encode(mac.finalize().into_bytes())
}

/// Extract prefix for display (e.g. "ak-a1b2c3d")
pub fn key_prefix(key: &str) -> String {
    key.chars().take(API_KEY_PREFIX_DISPLAY_LEN).collect()
}

/// Why a bearer credential could not be read from a header
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BearerError {
    InvalidFormat,
    EmptyToken,
}

/// Extract the token from an `Authorization: Bearer <token>` header value
pub fn extract_bearer_token(header: &str) -> Result<&str, BearerError> {
    let token = header
        .strip_prefix("Bearer ")
        .ok_or(BearerError::InvalidFormat)?
        .trim();
    if token.is_empty() {
        return Err(BearerError::EmptyToken);
    }
    Ok(token)
}
