//! Provisioning of the internal API key used for self-reporting

use crate::core::constants::{INTERNAL_ENVIRONMENT, INTERNAL_PROJECT_NAME};
use crate::data::{DataError, EventRepository, NewApiKey};
use crate::utils::api_key::{hash_api_key, key_prefix};

/// Ensure an active key row exists for the configured internal key
///
/// An existing row with the same hash is re-activated and moved to `tenant`.
pub async fn ensure_internal_key(
    repo: &dyn EventRepository,
    api_key: &str,
    tenant: &str,
    secret: &[u8],
) -> Result<(), DataError> {
    let key = NewApiKey {
        tenant: tenant.to_string(),
        name: INTERNAL_PROJECT_NAME.to_string(),
        environment: INTERNAL_ENVIRONMENT.to_string(),
        key_hash: hash_api_key(api_key, secret),
        key_prefix: key_prefix(api_key),
        retention_days: 0,
    };
    repo.ensure_api_key(&key).await?;
    tracing::debug!(tenant, prefix = %key.key_prefix, "Internal API key provisioned");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::TransactionalService;
    use crate::data::sqlite::SqliteService;
    use std::sync::Arc;

    const SECRET: &[u8] = b"bootstrap-test-secret";

    #[tokio::test]
    async fn test_internal_key_is_usable() {
        let service = SqliteService::in_memory().await.unwrap();
        let repo = TransactionalService::Sqlite(Arc::new(service)).repository();

        ensure_internal_key(repo.as_ref(), "internal-token", "admin", SECRET)
            .await
            .unwrap();

        let found = repo
            .get_api_key_by_hash(&hash_api_key("internal-token", SECRET))
            .await
            .unwrap()
            .unwrap();
        assert_eq!(found.tenant, "admin");
        assert_eq!(found.project, INTERNAL_PROJECT_NAME);
        assert_eq!(found.environment, INTERNAL_ENVIRONMENT);
        assert_eq!(found.retention_days, 0);
    }

    #[tokio::test]
    async fn test_internal_key_reactivated_and_reowned() {
        let service = SqliteService::in_memory().await.unwrap();
        let repo = TransactionalService::Sqlite(Arc::new(service)).repository();

        ensure_internal_key(repo.as_ref(), "internal-token", "admin", SECRET)
            .await
            .unwrap();
        assert_eq!(
            repo.deactivate_api_keys(&key_prefix("internal-token"))
                .await
                .unwrap(),
            1
        );
        ensure_internal_key(repo.as_ref(), "internal-token", "ops", SECRET)
            .await
            .unwrap();

        let found = repo
            .get_api_key_by_hash(&hash_api_key("internal-token", SECRET))
            .await
            .unwrap()
            .unwrap();
        assert_eq!(found.tenant, "ops");
        assert_eq!(repo.list_api_keys(None).await.unwrap().len(), 1);
    }
}
