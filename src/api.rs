//! HTTP API for the order assistant

mod handlers;
mod types;

pub use handlers::create_router;

use crate::manager::DialogManager;
use std::sync::Arc;
use std::time::Duration;

/// Application state shared across handlers
#[derive(Clone)]
pub struct AppState {
    pub manager: Arc<DialogManager>,
    /// Lifetime of the session cookie set on retained sessions
    pub cookie_max_age: Duration,
}

impl AppState {
    pub fn new(manager: Arc<DialogManager>, cookie_max_age: Duration) -> Self {
        Self {
            manager,
            cookie_max_age,
        }
    }
}
