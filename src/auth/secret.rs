use std::fmt;

use subtle::ConstantTimeEq;
use tracing::warn;
use uuid::Uuid;

/// Shared administrator secret gating issue, revoke, renew and usage
/// reporting. Unrelated to the per-user keys in the credential store.
#[derive(Clone)]
pub struct AdminSecret(String);

impl AdminSecret {
    pub fn new(secret: String) -> Self {
        Self(secret)
    }

    /// Uses the configured secret, or generates one and announces it once so
    /// the operator can reach the admin endpoints.
    pub fn from_config(secret: Option<String>) -> Self {
        match secret.filter(|s| !s.is_empty()) {
            Some(secret) => Self(secret),
            None => {
                let generated = Uuid::new_v4().simple().to_string();
                warn!(
                    "ADMIN_SECRET is not set, generated administrative secret for this run: {}",
                    generated
                );
                Self(generated)
            }
        }
    }

    /// Constant-time comparison; unequal lengths compare false without an
    /// early exit.
    pub fn verify(&self, provided: &str) -> bool {
        self.0.as_bytes().ct_eq(provided.as_bytes()).into()
    }
}

impl fmt::Debug for AdminSecret {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "AdminSecret([REDACTED])")
    }
}
