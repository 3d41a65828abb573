pub mod credentials;
pub mod error;
pub mod middleware;
pub mod secret;
pub mod service;
pub mod stats;
pub mod types;
pub mod usage;

pub use error::AuthError;
pub use middleware::{require_admin_secret, require_api_key};
pub use secret::AdminSecret;
pub use service::KeyManager;
pub use stats::{UsageLog, UsageLogs, UsageReporter};
pub use types::{Credential, KeyStatus, NewCredential};
pub use usage::{UsageEvent, UsageRecorder};
