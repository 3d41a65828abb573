use thiserror::Error;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("a credential with this username or email already exists")]
    Conflict,

    #[error("credential not found")]
    NotFound,

    #[error("malformed value in column `{column}`: {value:?}")]
    Malformed { column: &'static str, value: String },

    #[error("expiration horizon of {0} runs past the supported date range")]
    HorizonOutOfRange(chrono::Duration),

    #[error("credential store unavailable: {0}")]
    Unavailable(#[source] sqlx::Error),
}

impl From<sqlx::Error> for StoreError {
    fn from(error: sqlx::Error) -> Self {
        match &error {
            sqlx::Error::RowNotFound => StoreError::NotFound,
            sqlx::Error::Database(db) if db.is_unique_violation() => StoreError::Conflict,
            _ => StoreError::Unavailable(error),
        }
    }
}

/// True when a migration failed only because its column is already there.
/// SQLite reports it in the message, Postgres with SQLSTATE 42701.
pub(crate) fn is_duplicate_column(error: &sqlx::Error) -> bool {
    match error {
        sqlx::Error::Database(db) => {
            db.code().as_deref() == Some("42701")
                || db.message().to_ascii_lowercase().contains("duplicate column")
        }
        _ => false,
    }
}
