pub mod auth;
pub mod cartoon;
pub mod config;
pub mod storage;
pub mod utils;
pub mod web;

use std::sync::Arc;
use auth::{AdminSecret, KeyManager, UsageReporter};
use cartoon::ImageTransformer;

pub struct AppContext {
    pub keys: Arc<KeyManager>,
    pub reporter: Arc<UsageReporter>,
    pub admin_secret: AdminSecret,
    /// `None` leaves `/cartoonify` unmounted.
    pub transformer: Option<Arc<dyn ImageTransformer>>,
    pub hide_admin_docs: bool,
    pub max_image_bytes: usize,
}

/// Loads `.env` into the process environment when present.
pub fn init_env() {
    dotenv::dotenv().ok();
}
