use std::sync::Arc;

use serde::{Deserialize, Serialize};

use super::error::AuthError;
use super::types::Credential;
use crate::storage::CredentialStore;
use crate::utils::time::format_timestamp;

/// Usage of one key as reported to administrators.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct UsageLog {
    pub key_id: String,
    pub username: String,
    pub is_active: bool,
    pub never_expire: bool,
    pub expiration_date: String,
    pub latest_query_date: Option<String>,
    pub total_queries: u64,
    pub email: String,
}

impl From<Credential> for UsageLog {
    fn from(credential: Credential) -> Self {
        Self {
            key_id: credential.key_id,
            username: credential.username,
            is_active: credential.is_active,
            never_expire: credential.never_expire,
            expiration_date: format_timestamp(&credential.expiration_date),
            latest_query_date: credential.latest_query_date.as_ref().map(format_timestamp),
            total_queries: credential.total_queries,
            email: credential.email,
        }
    }
}

#[derive(Debug, Serialize, Deserialize, Default)]
pub struct UsageLogs {
    pub logs: Vec<UsageLog>,
}

/// Read-only view over every key, most recently used first.
pub struct UsageReporter {
    store: Arc<dyn CredentialStore>,
}

impl UsageReporter {
    pub fn new(store: Arc<dyn CredentialStore>) -> Self {
        Self { store }
    }

    // TODO: filter out long-unused or revoked keys once the listing grows too large to scan.
    pub async fn report(&self) -> Result<UsageLogs, AuthError> {
        let logs = self
            .store
            .list_all()
            .await?
            .into_iter()
            .map(UsageLog::from)
            .collect();

        Ok(UsageLogs { logs })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::credential::tests::{candidate, setup_storage};
    use chrono::{TimeZone, Utc};

    #[tokio::test]
    async fn test_report_projects_and_orders() {
        let (store, _temp_dir) = setup_storage(15).await;
        let unused = store.insert(&candidate("alice")).await.unwrap();
        let used = store.insert(&candidate("bob")).await.unwrap();
        let at = Utc.with_ymd_and_hms(2030, 3, 4, 5, 6, 7).unwrap();
        store.update_usage(&used, 9, at).await.unwrap();
        store.set_active(&unused, false).await.unwrap();

        let report = UsageReporter::new(store).report().await.unwrap();

        assert_eq!(report.logs.len(), 2);
        assert_eq!(report.logs[0].key_id, used);
        assert_eq!(report.logs[0].username, "bob");
        assert_eq!(report.logs[0].email, "bob@x.com");
        assert_eq!(report.logs[0].total_queries, 9);
        assert_eq!(report.logs[0].latest_query_date.as_deref(), Some("2030-03-04T05:06:07"));
        assert_eq!(report.logs[1].key_id, unused);
        assert!(!report.logs[1].is_active);
        assert!(report.logs[1].latest_query_date.is_none());
    }

    #[tokio::test]
    async fn test_report_on_empty_store() {
        let (store, _temp_dir) = setup_storage(15).await;
        let report = UsageReporter::new(store).report().await.unwrap();
        assert!(report.logs.is_empty());
    }
}
