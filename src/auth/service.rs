use std::sync::Arc;

use tracing::{info, warn};

use super::error::AuthError;
use super::types::NewCredential;
use super::usage::{UsageEvent, UsageRecorder};
use crate::storage::credential::expiration_from_now;
use crate::storage::{CredentialStore, StoreError};
use crate::utils::time::{self, format_timestamp, parse_timestamp};

/// Issues, revokes, renews and validates API keys on top of a credential
/// store.
pub struct KeyManager {
    store: Arc<dyn CredentialStore>,
    usage: UsageRecorder,
}

impl KeyManager {
    pub fn new(store: Arc<dyn CredentialStore>, usage: UsageRecorder) -> Self {
        Self { store, usage }
    }

    pub async fn issue(
        &self,
        username: String,
        email: String,
        password_hash: String,
        never_expire: bool,
    ) -> Result<String, AuthError> {
        let candidate = NewCredential {
            username,
            email,
            password_hash,
            never_expire,
        };

        let key_id = self.store.insert(&candidate).await?;
        info!("Issued API key {} for user {}", key_id, candidate.username);
        Ok(key_id)
    }

    /// Deactivates a key. Revoking twice, or revoking an unknown key, is not
    /// an error.
    pub async fn revoke(&self, key_id: &str) -> Result<(), AuthError> {
        self.store.set_active(key_id, false).await?;
        info!("Revoked API key {}", key_id);
        Ok(())
    }

    /// Moves the expiration of a key and reactivates it. Without an explicit
    /// date the default horizon from now is used; a date that does not parse
    /// as ISO-8601 is rejected before anything is written.
    pub async fn renew(&self, key_id: &str, new_expiration: Option<&str>) -> Result<String, AuthError> {
        let credential = self.store.find_by_id(key_id).await?;

        let expiration = match new_expiration.map(str::trim).filter(|value| !value.is_empty()) {
            None => expiration_from_now(self.store.default_horizon())?,
            Some(value) => parse_timestamp(value).ok_or_else(|| {
                AuthError::UnprocessableInput(
                    "The expiration date could not be parsed. Please use ISO 8601.".to_string(),
                )
            })?,
        };

        self.store.set_expiration(key_id, expiration, true).await?;

        let mut lines = Vec::new();
        if !credential.is_active {
            lines.push("This API key was revoked and has been reactivated.".to_string());
        }
        lines.push(format!(
            "The new expiration date for the API key is {}",
            format_timestamp(&expiration)
        ));

        info!("Renewed API key {} until {}", key_id, format_timestamp(&expiration));
        Ok(lines.join(" "))
    }

    /// True when the key exists, is active and has not expired. A successful
    /// check queues a usage update and returns without waiting for it.
    pub async fn validate(&self, key_id: &str) -> Result<bool, AuthError> {
        let credential = match self.store.find_by_id(key_id).await {
            Ok(credential) => credential,
            Err(StoreError::NotFound) => return Ok(false),
            Err(e @ StoreError::Malformed { .. }) => {
                warn!("Rejecting API key {} with unreadable row: {}", key_id, e);
                return Ok(false);
            }
            Err(e) => return Err(e.into()),
        };

        let now = time::now();
        if !credential.is_usable(now) {
            return Ok(false);
        }

        self.usage.record(UsageEvent {
            key_id: credential.key_id,
            new_count: credential.total_queries.saturating_add(1),
            at: now,
        });

        Ok(true)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::credential::tests::{setup_storage, unreachable_postgres_storage};
    use crate::storage::credential::SqliteCredentialStore;
    use chrono::{Duration, TimeZone, Utc};
    use tempfile::TempDir;
    use tokio::time::sleep;

    async fn setup_test_manager(horizon_days: i64) -> (KeyManager, Arc<dyn CredentialStore>, TempDir) {
        let (store, temp_dir) = setup_storage(horizon_days).await;
        let (usage, _handle) = UsageRecorder::spawn(store.clone(), 64);
        (KeyManager::new(store.clone(), usage), store, temp_dir)
    }

    async fn issue(manager: &KeyManager, name: &str) -> String {
        manager
            .issue(name.to_string(), format!("{}@x.com", name), "H".to_string(), false)
            .await
            .unwrap()
    }

    async fn wait_for_count(store: &Arc<dyn CredentialStore>, key_id: &str, expected: u64) -> u64 {
        for _ in 0..100 {
            let count = store.find_by_id(key_id).await.unwrap().total_queries;
            if count >= expected {
                return count;
            }
            sleep(std::time::Duration::from_millis(20)).await;
        }
        store.find_by_id(key_id).await.unwrap().total_queries
    }

    #[tokio::test]
    async fn test_api_key_basic_lifecycle() {
        let (manager, store, _temp_dir) = setup_test_manager(15).await;

        // 1. issue
        let key = manager
            .issue("a".to_string(), "a@x.com".to_string(), "H".to_string(), false)
            .await
            .unwrap();

        // 2. validate, usage lands in the background
        assert!(manager.validate(&key).await.unwrap());
        assert_eq!(wait_for_count(&store, &key, 1).await, 1);
        assert!(store.find_by_id(&key).await.unwrap().latest_query_date.is_some());

        // 3. revoke
        manager.revoke(&key).await.unwrap();
        assert!(!manager.validate(&key).await.unwrap());

        // 4. renew without a date reactivates with the default horizon
        let message = manager.renew(&key, None).await.unwrap();
        assert!(message.contains("reactivated"), "{message}");
        let expiration = store.find_by_id(&key).await.unwrap().expiration_date;
        let expected = Utc::now() + Duration::days(15);
        assert!((expiration - expected).num_seconds().abs() <= 5);
        assert!(message.contains(&format_timestamp(&expiration)));

        assert!(manager.validate(&key).await.unwrap());
    }

    #[tokio::test]
    async fn test_issue_conflicts() {
        let (manager, _store, _temp_dir) = setup_test_manager(15).await;
        let first = issue(&manager, "a").await;

        let same_username = manager
            .issue("a".to_string(), "other@x.com".to_string(), "H".to_string(), false)
            .await;
        assert!(matches!(same_username, Err(AuthError::Conflict(_))));

        let same_email = manager
            .issue("b".to_string(), "a@x.com".to_string(), "H".to_string(), false)
            .await;
        assert!(matches!(same_email, Err(AuthError::Conflict(_))));

        let second = issue(&manager, "c").await;
        assert_ne!(first, second);
    }

    #[tokio::test]
    async fn test_validate_unknown_key() {
        let (manager, _store, _temp_dir) = setup_test_manager(15).await;
        assert!(!manager.validate("unknown").await.unwrap());
        assert!(!manager.validate("").await.unwrap());
    }

    #[tokio::test]
    async fn test_validate_surfaces_store_outage() {
        let store = unreachable_postgres_storage();
        let (usage, _handle) = UsageRecorder::spawn(store.clone(), 8);
        let manager = KeyManager::new(store, usage);

        let result = manager.validate("some-key").await;
        assert!(matches!(result, Err(AuthError::StoreUnavailable(_))));
    }

    #[tokio::test]
    async fn test_revoke_is_idempotent() {
        let (manager, _store, _temp_dir) = setup_test_manager(15).await;
        let key = issue(&manager, "a").await;

        manager.revoke(&key).await.unwrap();
        manager.revoke(&key).await.unwrap();
        manager.revoke("unknown").await.unwrap();
        assert!(!manager.validate(&key).await.unwrap());
    }

    #[tokio::test]
    async fn test_renew_unknown_key() {
        let (manager, _store, _temp_dir) = setup_test_manager(15).await;
        let result = manager.renew("unknown", None).await;
        assert!(matches!(result, Err(AuthError::NotFound(_))));
    }

    #[tokio::test]
    async fn test_renew_rejects_malformed_date_without_writing() {
        let (manager, store, _temp_dir) = setup_test_manager(15).await;
        let key = issue(&manager, "a").await;
        manager.revoke(&key).await.unwrap();
        let before = store.find_by_id(&key).await.unwrap();

        let result = manager.renew(&key, Some("not-a-date")).await;
        assert!(matches!(result, Err(AuthError::UnprocessableInput(_))));

        let after = store.find_by_id(&key).await.unwrap();
        assert_eq!(after.expiration_date, before.expiration_date);
        assert!(!after.is_active);
    }

    #[tokio::test]
    async fn test_renew_with_explicit_date_roundtrip() {
        let (manager, store, _temp_dir) = setup_test_manager(15).await;
        let key = issue(&manager, "a").await;

        let message = manager.renew(&key, Some("2030-01-02T03:04:05.678")).await.unwrap();
        assert!(!message.contains("reactivated"));
        assert!(message.contains("2030-01-02T03:04:05"));

        let credential = store.find_by_id(&key).await.unwrap();
        assert_eq!(credential.expiration_date, Utc.with_ymd_and_hms(2030, 1, 2, 3, 4, 5).unwrap());
        assert!(credential.is_active);
    }

    #[tokio::test]
    async fn test_zero_horizon_key_expires() {
        let (manager, _store, _temp_dir) = setup_test_manager(0).await;
        let key = issue(&manager, "a").await;

        sleep(std::time::Duration::from_millis(1100)).await;
        assert!(!manager.validate(&key).await.unwrap());
    }

    #[tokio::test]
    async fn test_renew_with_unrepresentable_horizon_fails_without_writing() {
        let (store, temp_dir) = setup_storage(15).await;
        let key = store.insert(&crate::storage::credential::tests::candidate("a")).await.unwrap();
        drop(store);

        let url = format!("sqlite://{}", temp_dir.path().join("keys.db").display());
        let far = SqliteCredentialStore::new(&url, Duration::days(100_000_000)).await.unwrap();
        let far: Arc<dyn CredentialStore> = Arc::new(far);
        let (usage, _handle) = UsageRecorder::spawn(far.clone(), 8);
        let manager = KeyManager::new(far.clone(), usage);

        let before = far.find_by_id(&key).await.unwrap();
        let result = manager.renew(&key, None).await;
        assert!(matches!(result, Err(AuthError::Internal(_))));
        assert_eq!(far.find_by_id(&key).await.unwrap().expiration_date, before.expiration_date);

        let issued = manager
            .issue("b".to_string(), "b@x.com".to_string(), "H".to_string(), false)
            .await;
        assert!(matches!(issued, Err(AuthError::Internal(_))));
    }

    #[tokio::test]
    async fn test_never_expire_ignores_past_expiration() {
        let (manager, store, _temp_dir) = setup_test_manager(15).await;
        let key = manager
            .issue("a".to_string(), "a@x.com".to_string(), "H".to_string(), true)
            .await
            .unwrap();

        let past = Utc.with_ymd_and_hms(2000, 1, 1, 0, 0, 0).unwrap();
        store.set_expiration(&key, past, true).await.unwrap();
        assert!(manager.validate(&key).await.unwrap());
    }

    #[tokio::test]
    async fn test_renewed_expired_key_validates_again() {
        let (manager, _store, _temp_dir) = setup_test_manager(15).await;
        let key = issue(&manager, "a").await;

        manager.renew(&key, Some("2000-01-01")).await.unwrap();
        assert!(!manager.validate(&key).await.unwrap());

        manager.renew(&key, None).await.unwrap();
        assert!(manager.validate(&key).await.unwrap());
    }

    #[tokio::test]
    async fn test_total_queries_never_decreases() {
        let (manager, store, _temp_dir) = setup_test_manager(15).await;
        let key = issue(&manager, "a").await;

        let mut last = 0;
        for _ in 0..5 {
            assert!(manager.validate(&key).await.unwrap());
            let count = wait_for_count(&store, &key, last + 1).await;
            assert!(count >= last);
            last = count;
        }
        assert_eq!(last, 5);
    }
}
