use std::sync::Arc;
use std::time::Instant;

use super::store::ProgressStore;

/// Shared application state for the HTTP server.
pub struct AppState {
    /// Storage backend selected at startup.
    pub store: Arc<dyn ProgressStore>,
    /// Secret required by `DELETE /logs`.
    pub delete_secret: String,
    /// Active log filter directive, reported by the healthcheck.
    pub log_filter: String,
    pub started_at: Instant,
}

impl AppState {
    pub fn new(store: Arc<dyn ProgressStore>, delete_secret: String, log_filter: String) -> Self {
        Self {
            store,
            delete_secret,
            log_filter,
            started_at: Instant::now(),
        }
    }
}
