use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use tracing::info;
use uuid::Uuid;

use crate::auth::types::{Credential, NewCredential};
use crate::config::DatabaseConfig;
use crate::utils::time;

pub mod entity;
pub mod error;
pub mod mapping;
pub mod postgres;
pub mod schema;
pub mod sqlite;

pub use error::StoreError;
pub use postgres::PostgresCredentialStore;
pub use sqlite::SqliteCredentialStore;

pub(crate) const COLUMNS: &str = "key_id, username, email, password_hash, is_active, never_expire, \
     expiration_date, latest_query_date, total_queries";

/// Persistence contract for credentials. Both backends must behave
/// identically; which one runs is a deployment decision.
#[async_trait]
pub trait CredentialStore: Send + Sync + 'static {
    /// Creates the table if needed and applies additive column migrations.
    /// Safe to call on every start.
    async fn initialize(&self) -> Result<(), StoreError>;

    /// Persists a new active credential expiring after the default horizon.
    /// Fails with `Conflict` when the username or the email is taken, revoked
    /// rows included.
    async fn insert(&self, candidate: &NewCredential) -> Result<String, StoreError>;

    async fn find_by_id(&self, key_id: &str) -> Result<Credential, StoreError>;

    /// Writes the usage columns. The count is computed by the caller from a
    /// previous read, so concurrent writers can lose increments, but the
    /// stored count never goes below its current value.
    async fn update_usage(&self, key_id: &str, new_count: u64, at: DateTime<Utc>) -> Result<(), StoreError>;

    async fn set_active(&self, key_id: &str, active: bool) -> Result<(), StoreError>;

    async fn set_expiration(&self, key_id: &str, at: DateTime<Utc>, active: bool) -> Result<(), StoreError>;

    /// Every credential, most recently used first, never-used last.
    async fn list_all(&self) -> Result<Vec<Credential>, StoreError>;

    fn default_horizon(&self) -> Duration;
}

/// Opens the backend selected by configuration and makes sure its schema
/// exists.
pub async fn connect(config: &DatabaseConfig, default_horizon: Duration) -> Result<Arc<dyn CredentialStore>, StoreError> {
    let store: Arc<dyn CredentialStore> = match config {
        DatabaseConfig::Sqlite { url } => Arc::new(SqliteCredentialStore::new(url, default_horizon).await?),
        DatabaseConfig::Postgres { uri, ssl_mode } => {
            Arc::new(PostgresCredentialStore::new(uri, *ssl_mode, default_horizon)?)
        }
    };

    store.initialize().await?;
    info!("Credential store ready");
    Ok(store)
}

/// `now + horizon`, or `HorizonOutOfRange` when that date is not representable.
pub(crate) fn expiration_from_now(horizon: Duration) -> Result<DateTime<Utc>, StoreError> {
    time::now()
        .checked_add_signed(horizon)
        .ok_or(StoreError::HorizonOutOfRange(horizon))
}

/// Builds the row for a fresh credential: random key id, zero usage,
/// expiring `default_horizon` from now.
pub(crate) fn fresh_credential(candidate: &NewCredential, default_horizon: Duration) -> Result<Credential, StoreError> {
    Ok(Credential {
        key_id: Uuid::new_v4().to_string(),
        username: candidate.username.clone(),
        email: candidate.email.clone(),
        password_hash: candidate.password_hash.clone(),
        is_active: true,
        never_expire: candidate.never_expire,
        expiration_date: expiration_from_now(default_horizon)?,
        latest_query_date: None,
        total_queries: 0,
    })
}
