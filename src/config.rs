//! Runtime configuration from environment variables

use crate::backend::BackendAuth;
use std::time::Duration;

/// Classifier endpoint settings
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NluConfig {
    pub url: Option<String>,
    pub api_key: String,
    pub timeout: Duration,
}

/// Commerce backend endpoint settings
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BackendConfig {
    pub url: Option<String>,
    pub auth: BackendAuth,
    pub timeout: Duration,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AppConfig {
    pub port: u16,
    pub nlu: NluConfig,
    pub backend: BackendConfig,
    /// Idle time after which the reaper drops a session
    pub session_ttl: Duration,
    pub reaper_interval: Duration,
    pub cookie_max_age: Duration,
}

impl AppConfig {
    pub fn from_env() -> Self {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Build from any variable source; unset, empty or unparsable values take
    /// their defaults
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let var = |name: &str| lookup(name).filter(|v| !v.trim().is_empty());
        let secs = |name: &str, default: u64| {
            Duration::from_secs(var(name).and_then(|v| v.trim().parse().ok()).unwrap_or(default))
        };

        let client_id = var("CPI_CLIENT_ID").unwrap_or_default();
        let client_secret = var("CPI_CLIENT_SECRET").unwrap_or_default();
        let auth = match var("CPI_TOKEN_URL") {
            Some(token_url) => BackendAuth::ClientCredentials {
                token_url,
                client_id,
                client_secret,
            },
            None => BackendAuth::Basic {
                client_id,
                client_secret,
            },
        };

        Self {
            port: var("PORT").and_then(|p| p.trim().parse().ok()).unwrap_or(3000),
            nlu: NluConfig {
                url: var("GEMINI_API_URL"),
                api_key: var("GEMINI_API_KEY").unwrap_or_default(),
                timeout: secs("NLU_TIMEOUT_SECS", 15),
            },
            backend: BackendConfig {
                url: var("CPI_API_URL"),
                auth,
                timeout: secs("BACKEND_TIMEOUT_SECS", 30),
            },
            session_ttl: secs("SESSION_TTL_SECS", 3600),
            reaper_interval: secs("REAPER_INTERVAL_SECS", 1800),
            cookie_max_age: secs("SESSION_COOKIE_MAX_AGE_SECS", 3600),
        }
    }
}
