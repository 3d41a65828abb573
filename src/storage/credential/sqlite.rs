use std::str::FromStr;

use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use sea_orm::DbBackend;
use sqlx::sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePoolOptions, SqliteRow};
use sqlx::{Row, SqlitePool};
use tracing::{debug, info};

use super::entity::Model as CredentialModel;
use super::error::is_duplicate_column;
use super::schema::{additive_migrations, create_table_sql};
use super::{fresh_credential, CredentialStore, StoreError, COLUMNS};
use crate::auth::types::{Credential, NewCredential};
use crate::utils::time::format_timestamp;

/// Embedded single-file backend.
pub struct SqliteCredentialStore {
    pool: SqlitePool,
    default_horizon: Duration,
}

impl SqliteCredentialStore {
    pub async fn new(database_url: &str, default_horizon: Duration) -> Result<Self, StoreError> {
        info!("Opening SQLite credential store at {}", database_url);
        let options = SqliteConnectOptions::from_str(database_url)?
            .create_if_missing(true)
            .journal_mode(SqliteJournalMode::Wal);
        let pool = SqlitePoolOptions::new().connect_with(options).await?;

        Ok(Self { pool, default_horizon })
    }

    fn row_to_model(row: &SqliteRow) -> Result<CredentialModel, sqlx::Error> {
        Ok(CredentialModel {
            key_id: row.try_get("key_id")?,
            username: row.try_get::<Option<String>, _>("username")?.unwrap_or_default(),
            email: row.try_get::<Option<String>, _>("email")?.unwrap_or_default(),
            password_hash: row.try_get::<Option<String>, _>("password_hash")?.unwrap_or_default(),
            is_active: row.try_get("is_active")?,
            never_expire: row.try_get("never_expire")?,
            expiration_date: row.try_get("expiration_date")?,
            latest_query_date: row.try_get("latest_query_date")?,
            total_queries: row.try_get("total_queries")?,
        })
    }

    fn row_to_credential(row: &SqliteRow) -> Result<Credential, StoreError> {
        Credential::try_from(Self::row_to_model(row)?)
    }
}

#[async_trait]
impl CredentialStore for SqliteCredentialStore {
    async fn initialize(&self) -> Result<(), StoreError> {
        sqlx::query(&create_table_sql(DbBackend::Sqlite))
            .execute(&self.pool)
            .await?;

        for migration in additive_migrations(DbBackend::Sqlite) {
            match sqlx::query(&migration).execute(&self.pool).await {
                Ok(_) => info!("Applied migration: {}", migration),
                Err(e) if is_duplicate_column(&e) => debug!("Migration already applied: {}", migration),
                Err(e) => return Err(e.into()),
            }
        }

        Ok(())
    }

    async fn insert(&self, candidate: &NewCredential) -> Result<String, StoreError> {
        let existing = sqlx::query("SELECT key_id FROM api_keys WHERE username = ? OR email = ? LIMIT 1")
            .bind(&candidate.username)
            .bind(&candidate.email)
            .fetch_optional(&self.pool)
            .await?;
        if existing.is_some() {
            return Err(StoreError::Conflict);
        }

        let model = CredentialModel::from(fresh_credential(candidate, self.default_horizon)?);
        sqlx::query(&format!(
            "INSERT INTO api_keys ({COLUMNS}) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?)"
        ))
        .bind(&model.key_id)
        .bind(&model.username)
        .bind(&model.email)
        .bind(&model.password_hash)
        .bind(model.is_active)
        .bind(model.never_expire)
        .bind(&model.expiration_date)
        .bind(&model.latest_query_date)
        .bind(model.total_queries)
        .execute(&self.pool)
        .await?;

        Ok(model.key_id)
    }

    async fn find_by_id(&self, key_id: &str) -> Result<Credential, StoreError> {
        let row = sqlx::query(&format!("SELECT {COLUMNS} FROM api_keys WHERE key_id = ?"))
            .bind(key_id)
            .fetch_optional(&self.pool)
            .await?
            .ok_or(StoreError::NotFound)?;

        Self::row_to_credential(&row)
    }

    async fn update_usage(&self, key_id: &str, new_count: u64, at: DateTime<Utc>) -> Result<(), StoreError> {
        sqlx::query("UPDATE api_keys SET total_queries = MAX(COALESCE(total_queries, 0), ?), latest_query_date = ? WHERE key_id = ?")
            .bind(i64::try_from(new_count).unwrap_or(i64::MAX))
            .bind(format_timestamp(&at))
            .bind(key_id)
            .execute(&self.pool)
            .await?;

        Ok(())
    }

    async fn set_active(&self, key_id: &str, active: bool) -> Result<(), StoreError> {
        sqlx::query("UPDATE api_keys SET is_active = ? WHERE key_id = ?")
            .bind(active)
            .bind(key_id)
            .execute(&self.pool)
            .await?;

        Ok(())
    }

    async fn set_expiration(&self, key_id: &str, at: DateTime<Utc>, active: bool) -> Result<(), StoreError> {
        sqlx::query("UPDATE api_keys SET expiration_date = ?, is_active = ? WHERE key_id = ?")
            .bind(format_timestamp(&at))
            .bind(active)
            .bind(key_id)
            .execute(&self.pool)
            .await?;

        Ok(())
    }

    async fn list_all(&self) -> Result<Vec<Credential>, StoreError> {
        let rows = sqlx::query(&format!(
            "SELECT {COLUMNS} FROM api_keys ORDER BY latest_query_date DESC NULLS LAST"
        ))
        .fetch_all(&self.pool)
        .await?;

        rows.iter().map(Self::row_to_credential).collect()
    }

    fn default_horizon(&self) -> Duration {
        self.default_horizon
    }
}
