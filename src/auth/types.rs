use std::fmt;

use chrono::{DateTime, Utc};

/// A stored API key and its owner.
#[derive(Clone, PartialEq)]
pub struct Credential {
    pub key_id: String,
    pub username: String,
    pub email: String,
    pub password_hash: String,
    pub is_active: bool,
    pub never_expire: bool,
    pub expiration_date: DateTime<Utc>,
    pub latest_query_date: Option<DateTime<Utc>>,
    pub total_queries: u64,
}

impl Credential {
    pub fn status(&self, now: DateTime<Utc>) -> KeyStatus {
        if !self.is_active {
            KeyStatus::Revoked
        } else if !self.never_expire && self.expiration_date < now {
            KeyStatus::Expired
        } else if self.total_queries == 0 {
            KeyStatus::Pending
        } else {
            KeyStatus::Active
        }
    }

    pub fn is_usable(&self, now: DateTime<Utc>) -> bool {
        matches!(self.status(now), KeyStatus::Pending | KeyStatus::Active)
    }
}

// password_hash stays out of logs
impl fmt::Debug for Credential {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credential")
            .field("key_id", &self.key_id)
            .field("username", &self.username)
            .field("email", &self.email)
            .field("password_hash", &"[REDACTED]")
            .field("is_active", &self.is_active)
            .field("never_expire", &self.never_expire)
            .field("expiration_date", &self.expiration_date)
            .field("latest_query_date", &self.latest_query_date)
            .field("total_queries", &self.total_queries)
            .finish()
    }
}

/// Identity of a key about to be issued; the hash is computed upstream.
#[derive(Clone)]
pub struct NewCredential {
    pub username: String,
    pub email: String,
    pub password_hash: String,
    pub never_expire: bool,
}

/// Lifecycle state. Expiry is derived from the clock, never stored.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum KeyStatus {
    Pending,
    Active,
    Revoked,
    Expired,
}
