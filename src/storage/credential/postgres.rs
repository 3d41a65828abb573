use std::str::FromStr;
use std::time::Duration as StdDuration;

use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use sea_orm::DbBackend;
use sqlx::postgres::{PgConnectOptions, PgPoolOptions, PgRow, PgSslMode};
use sqlx::{Connection, PgPool, Row};
use tracing::{debug, info};

use super::entity::Model as CredentialModel;
use super::error::is_duplicate_column;
use super::schema::{additive_migrations, create_table_sql};
use super::{fresh_credential, CredentialStore, StoreError, COLUMNS};
use crate::auth::types::{Credential, NewCredential};
use crate::utils::time::format_timestamp;

/// Advisory lock key taken while migrating, so concurrent startups apply the
/// DDL one at a time.
const MIGRATION_LOCK_ID: i64 = 0x6b65_7967_6174_65;

/// Networked backend. The pool connects lazily and replaces broken
/// connections on the next call, so nothing assumes a long-lived session.
pub struct PostgresCredentialStore {
    pool: PgPool,
    default_horizon: Duration,
}

impl PostgresCredentialStore {
    pub fn new(uri: &str, ssl_mode: PgSslMode, default_horizon: Duration) -> Result<Self, StoreError> {
        info!("Configuring Postgres credential store (ssl mode {:?})", ssl_mode);
        let options = PgConnectOptions::from_str(uri)?.ssl_mode(ssl_mode);
        let pool = PgPoolOptions::new()
            .max_connections(10)
            .min_connections(0)
            .acquire_timeout(StdDuration::from_secs(10))
            .idle_timeout(StdDuration::from_secs(60))
            .test_before_acquire(true)
            .connect_lazy_with(options);

        Ok(Self::from_pool(pool, default_horizon))
    }

    pub fn from_pool(pool: PgPool, default_horizon: Duration) -> Self {
        Self { pool, default_horizon }
    }

    fn row_to_model(row: &PgRow) -> Result<CredentialModel, sqlx::Error> {
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

    fn row_to_credential(row: &PgRow) -> Result<Credential, StoreError> {
        Credential::try_from(Self::row_to_model(row)?)
    }
}

#[async_trait]
impl CredentialStore for PostgresCredentialStore {
    async fn initialize(&self) -> Result<(), StoreError> {
        let mut tx = self.pool.begin().await?;

        // Released automatically at commit or rollback.
        sqlx::query("SELECT pg_advisory_xact_lock($1)")
            .bind(MIGRATION_LOCK_ID)
            .execute(&mut *tx)
            .await?;

        sqlx::query(&create_table_sql(DbBackend::Postgres))
            .execute(&mut *tx)
            .await?;

        for migration in additive_migrations(DbBackend::Postgres) {
            // A failed statement aborts the whole transaction in Postgres, so
            // each migration runs under its own savepoint.
            let mut savepoint = tx.begin().await?;
            match sqlx::query(&migration).execute(&mut *savepoint).await {
                Ok(_) => {
                    savepoint.commit().await?;
                    debug!("Migration applied or already present: {}", migration);
                }
                Err(e) if is_duplicate_column(&e) => {
                    savepoint.rollback().await?;
                    debug!("Migration already applied: {}", migration);
                }
                Err(e) => return Err(e.into()),
            }
        }

        tx.commit().await?;
        Ok(())
    }

    async fn insert(&self, candidate: &NewCredential) -> Result<String, StoreError> {
        let existing = sqlx::query("SELECT key_id FROM api_keys WHERE username = $1 OR email = $2 LIMIT 1")
            .bind(&candidate.username)
            .bind(&candidate.email)
            .fetch_optional(&self.pool)
            .await?;
        if existing.is_some() {
            return Err(StoreError::Conflict);
        }

        let model = CredentialModel::from(fresh_credential(candidate, self.default_horizon)?);
        sqlx::query(&format!(
            "INSERT INTO api_keys ({COLUMNS}) VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)"
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
        let row = sqlx::query(&format!("SELECT {COLUMNS} FROM api_keys WHERE key_id = $1"))
            .bind(key_id)
            .fetch_optional(&self.pool)
            .await?
            .ok_or(StoreError::NotFound)?;

        Self::row_to_credential(&row)
    }

    async fn update_usage(&self, key_id: &str, new_count: u64, at: DateTime<Utc>) -> Result<(), StoreError> {
        sqlx::query("UPDATE api_keys SET total_queries = GREATEST(total_queries, $1), latest_query_date = $2 WHERE key_id = $3")
            .bind(i64::try_from(new_count).unwrap_or(i64::MAX))
            .bind(format_timestamp(&at))
            .bind(key_id)
            .execute(&self.pool)
            .await?;

        Ok(())
    }

    async fn set_active(&self, key_id: &str, active: bool) -> Result<(), StoreError> {
        sqlx::query("UPDATE api_keys SET is_active = $1 WHERE key_id = $2")
            .bind(active)
            .bind(key_id)
            .execute(&self.pool)
            .await?;

        Ok(())
    }

    async fn set_expiration(&self, key_id: &str, at: DateTime<Utc>, active: bool) -> Result<(), StoreError> {
        sqlx::query("UPDATE api_keys SET expiration_date = $1, is_active = $2 WHERE key_id = $3")
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
