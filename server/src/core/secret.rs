//! HMAC secret used to hash API keys
//!
//! Resolved from configuration when set, otherwise read from (or generated
//! into) a file inside the data directory so hashes survive restarts.

use anyhow::{Context, Result};

use super::constants::{API_KEY_SECRET_BYTES, API_KEY_SECRET_FILENAME, ENV_API_KEY_SECRET};
use super::storage::AppStorage;
use crate::utils::crypto;
use crate::utils::file::write_private;

/// Resolve the API key HMAC secret
pub async fn load_api_key_secret(configured: Option<&str>, storage: &AppStorage) -> Result<Vec<u8>> {
    if let Some(hex_secret) = configured {
        let secret = hex::decode(hex_secret.trim())
            .with_context(|| format!("{} must be a hex string", ENV_API_KEY_SECRET))?;
        if secret.is_empty() {
            anyhow::bail!("{} must not be empty", ENV_API_KEY_SECRET);
        }
        tracing::debug!("Using configured API key secret");
        return Ok(secret);
    }

    let path = storage.data_path(API_KEY_SECRET_FILENAME);
    match tokio::fs::read_to_string(&path).await {
        Ok(contents) => match hex::decode(contents.trim()) {
            Ok(secret) if secret.len() == API_KEY_SECRET_BYTES => {
                tracing::debug!(path = %path.display(), "Loaded API key secret");
                return Ok(secret);
            }
            // Regenerating would orphan every stored key hash
            _ => anyhow::bail!(
                "API key secret file is corrupt: {} (remove it only if no keys exist)",
                path.display()
            ),
        },
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
        Err(e) => {
            return Err(e).with_context(|| {
                format!("Failed to read API key secret: {}", path.display())
            });
        }
    }

    let secret = crypto::generate_key(API_KEY_SECRET_BYTES);
    write_private(&path, hex::encode(&secret).as_bytes())
        .await
        .with_context(|| format!("Failed to write API key secret: {}", path.display()))?;
    tracing::info!(path = %path.display(), "Generated new API key secret");
    Ok(secret)
}
