use std::env;
use std::net::SocketAddr;

use anyhow::{bail, Context, Result};
use chrono::{Duration, Utc};
use sqlx::postgres::PgSslMode;

const DEFAULT_SQLITE_PATH: &str = "sqlite://./keygate_data/keys.db";
const DEFAULT_BIND_ADDR: &str = "127.0.0.1:7200";
const DEFAULT_LOG_DIR: &str = "./logs";
const DEFAULT_EXPIRATION_DAYS: i64 = 15;
const DEFAULT_MAX_IMAGE_BYTES: usize = 10 * 1024 * 1024;
const DEFAULT_USAGE_QUEUE_CAPACITY: usize = 1024;

#[derive(Debug, Clone)]
pub enum DatabaseConfig {
    Sqlite { url: String },
    Postgres { uri: String, ssl_mode: PgSslMode },
}

/// Process configuration, read once at startup.
#[derive(Debug, Clone)]
pub struct Settings {
    pub database: DatabaseConfig,
    pub expiration_days: i64,
    pub admin_secret: Option<String>,
    pub hide_admin_docs: bool,
    pub bind_addr: SocketAddr,
    pub log_dir: String,
    pub cartoonifier_url: Option<String>,
    pub max_image_bytes: usize,
    pub usage_queue_capacity: usize,
}

/// Process environment first, then `.env`.
fn var(name: &str) -> Option<String> {
    let value = match env::var(name) {
        Ok(value) => Some(value),
        Err(_) => dotenv::var(name).ok(),
    };
    value.filter(|value| !value.trim().is_empty())
}

fn parse_var<T>(name: &str, default: T) -> Result<T>
where
    T: std::str::FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
{
    match var(name) {
        Some(value) => value.trim().parse().with_context(|| format!("Invalid value for {}: {:?}", name, value)),
        None => Ok(default),
    }
}

fn parse_flag(name: &str) -> bool {
    var(name)
        .map(|value| matches!(value.trim().to_ascii_lowercase().as_str(), "1" | "true" | "yes" | "on"))
        .unwrap_or(false)
}

pub fn parse_ssl_mode(value: &str) -> Result<PgSslMode> {
    Ok(match value.trim().to_ascii_lowercase().as_str() {
        "disable" => PgSslMode::Disable,
        "allow" => PgSslMode::Allow,
        "prefer" => PgSslMode::Prefer,
        "require" => PgSslMode::Require,
        "verify-ca" => PgSslMode::VerifyCa,
        "verify-full" => PgSslMode::VerifyFull,
        other => bail!("Unknown POSTGRES_SSL mode: {:?}", other),
    })
}

/// Key lifetime in days. Must be non-negative and leave `now + horizon`
/// representable, so later expiration arithmetic cannot overflow.
pub fn horizon_from_days(days: i64) -> Result<Duration> {
    if days < 0 {
        bail!("API_KEY_EXPIRATION_DAYS must not be negative");
    }
    let horizon = Duration::try_days(days)
        .with_context(|| format!("API_KEY_EXPIRATION_DAYS is out of range: {}", days))?;
    if Utc::now().checked_add_signed(horizon).is_none() {
        bail!("API_KEY_EXPIRATION_DAYS is out of range: {}", days);
    }
    Ok(horizon)
}

impl Settings {
    pub fn from_env() -> Result<Self> {
        let database = match var("DATABASE_MODE").map(|mode| mode.trim().to_ascii_lowercase()).as_deref() {
            None | Some("sqlite") => DatabaseConfig::Sqlite {
                url: var("SQLITE_PATH").unwrap_or_else(|| DEFAULT_SQLITE_PATH.to_string()),
            },
            Some("postgres") => DatabaseConfig::Postgres {
                uri: var("POSTGRES_URI").context("POSTGRES_URI must be set when DATABASE_MODE=postgres")?,
                ssl_mode: parse_ssl_mode(&var("POSTGRES_SSL").unwrap_or_else(|| "prefer".to_string()))?,
            },
            Some(other) => bail!("Unknown DATABASE_MODE: {:?}", other),
        };

        let expiration_days = parse_var("API_KEY_EXPIRATION_DAYS", DEFAULT_EXPIRATION_DAYS)?;
        horizon_from_days(expiration_days)?;

        Ok(Self {
            database,
            expiration_days,
            admin_secret: var("ADMIN_SECRET"),
            hide_admin_docs: parse_flag("HIDE_ADMIN_DOCS"),
            bind_addr: parse_var("BIND_ADDR", DEFAULT_BIND_ADDR.parse()?)?,
            log_dir: var("LOG_DIR").unwrap_or_else(|| DEFAULT_LOG_DIR.to_string()),
            cartoonifier_url: var("CARTOONIFIER_URL"),
            max_image_bytes: parse_var("MAX_IMAGE_BYTES", DEFAULT_MAX_IMAGE_BYTES)?,
            usage_queue_capacity: parse_var("USAGE_QUEUE_CAPACITY", DEFAULT_USAGE_QUEUE_CAPACITY)?,
        })
    }

    pub fn default_horizon(&self) -> Result<Duration> {
        horizon_from_days(self.expiration_days)
    }

    /// Creates the parent directory of a SQLite database file.
    pub fn ensure_data_dir(&self) -> Result<()> {
        if let DatabaseConfig::Sqlite { url } = &self.database {
            let path = url.trim_start_matches("sqlite://").trim_start_matches("sqlite:");
            let path = path.split('?').next().unwrap_or(path);
            if let Some(dir) = std::path::Path::new(path).parent().filter(|dir| !dir.as_os_str().is_empty()) {
                std::fs::create_dir_all(dir).with_context(|| format!("Failed to create {}", dir.display()))?;
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_ssl_mode() {
        assert!(matches!(parse_ssl_mode("require").unwrap(), PgSslMode::Require));
        assert!(matches!(parse_ssl_mode(" Disable ").unwrap(), PgSslMode::Disable));
        assert!(matches!(parse_ssl_mode("verify-full").unwrap(), PgSslMode::VerifyFull));
        assert!(parse_ssl_mode("sometimes").is_err());
    }

    #[test]
    fn test_default_horizon() {
        let settings = Settings {
            database: DatabaseConfig::Sqlite { url: DEFAULT_SQLITE_PATH.to_string() },
            expiration_days: 15,
            admin_secret: None,
            hide_admin_docs: false,
            bind_addr: DEFAULT_BIND_ADDR.parse().unwrap(),
            log_dir: DEFAULT_LOG_DIR.to_string(),
            cartoonifier_url: None,
            max_image_bytes: DEFAULT_MAX_IMAGE_BYTES,
            usage_queue_capacity: DEFAULT_USAGE_QUEUE_CAPACITY,
        };
        assert_eq!(settings.default_horizon().unwrap(), Duration::days(15));
    }

    #[test]
    fn test_horizon_bounds() {
        assert_eq!(horizon_from_days(0).unwrap(), Duration::zero());
        assert_eq!(horizon_from_days(365).unwrap(), Duration::days(365));
        assert!(horizon_from_days(-1).is_err());
        // representable as a duration, but now + horizon is past the last date
        assert!(horizon_from_days(100_000_000).is_err());
        assert!(horizon_from_days(200_000_000_000_000).is_err());
        assert!(horizon_from_days(i64::MAX).is_err());
    }
}
