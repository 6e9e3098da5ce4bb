//! HTTP transport to the commerce backend

use super::CommerceBackend;
use crate::dialog::ConversationState;
use crate::error::CollaboratorError;
use async_trait::async_trait;
use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use reqwest::Client;
use serde::Deserialize;
use serde_json::Value;
use std::time::{Duration, Instant};
use tokio::sync::Mutex;

/// Refresh tokens this long before the server says they expire
const TOKEN_EXPIRY_MARGIN: Duration = Duration::from_secs(30);
const DEFAULT_TOKEN_LIFETIME: Duration = Duration::from_secs(300);

/// How requests to the backend are authenticated
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BackendAuth {
    /// HTTP Basic with the client credentials on every request
    Basic {
        client_id: String,
        client_secret: String,
    },
    /// OAuth2 client-credentials grant; the bearer token is cached
    ClientCredentials {
        token_url: String,
        client_id: String,
        client_secret: String,
    },
}

impl BackendAuth {
    fn basic_header(client_id: &str, client_secret: &str) -> String {
        format!("Basic {}", STANDARD.encode(format!("{client_id}:{client_secret}")))
    }
}

struct CachedToken {
    access_token: String,
    expires_at: Instant,
}

#[derive(Debug, Deserialize)]
struct TokenResponse {
    access_token: String,
    #[serde(default)]
    expires_in: Option<u64>,
}

/// Posts the full conversation as JSON to a single endpoint
pub struct HttpCommerceBackend {
    client: Client,
    url: String,
    auth: BackendAuth,
    token: Mutex<Option<CachedToken>>,
}

impl HttpCommerceBackend {
    pub fn new(client: Client, url: impl Into<String>, auth: BackendAuth) -> Self {
        Self {
            client,
            url: url.into(),
            auth,
            token: Mutex::new(None),
        }
    }

    async fn authorization(&self) -> Result<String, CollaboratorError> {
        match &self.auth {
            BackendAuth::Basic {
                client_id,
                client_secret,
            } => Ok(BackendAuth::basic_header(client_id, client_secret)),
            BackendAuth::ClientCredentials {
                token_url,
                client_id,
                client_secret,
            } => {
                let mut cached = self.token.lock().await;
                if let Some(token) = cached.as_ref().filter(|t| t.expires_at > Instant::now()) {
                    return Ok(format!("Bearer {}", token.access_token));
                }

                let token = self.fetch_token(token_url, client_id, client_secret).await?;
                let header = format!("Bearer {}", token.access_token);
                *cached = Some(token);
                Ok(header)
            }
        }
    }

    async fn fetch_token(
        &self,
        token_url: &str,
        client_id: &str,
        client_secret: &str,
    ) -> Result<CachedToken, CollaboratorError> {
        let response = self
            .client
            .post(token_url)
            .header("Authorization", BackendAuth::basic_header(client_id, client_secret))
            .header("Content-Type", "application/x-www-form-urlencoded")
            .body("grant_type=client_credentials")
            .send()
            .await
            .map_err(|e| CollaboratorError::from_reqwest(&e))?;

        let status = response.status();
        if !status.is_success() {
            return Err(CollaboratorError::auth(format!(
                "Token request failed with HTTP {status}"
            )));
        }

        let token: TokenResponse = response
            .json()
            .await
            .map_err(|e| CollaboratorError::auth(format!("Invalid token response: {e}")))?;

        let lifetime = token
            .expires_in
            .map_or(DEFAULT_TOKEN_LIFETIME, Duration::from_secs)
            .saturating_sub(TOKEN_EXPIRY_MARGIN);
        tracing::debug!(lifetime_secs = lifetime.as_secs(), "Fetched backend access token");

        Ok(CachedToken {
            access_token: token.access_token,
            expires_at: Instant::now() + lifetime,
        })
    }
}

#[async_trait]
impl CommerceBackend for HttpCommerceBackend {
    async fn submit(&self, conversation: &ConversationState) -> Result<Value, CollaboratorError> {
        let authorization = self.authorization().await?;

        let response = self
            .client
            .post(&self.url)
            .header("Authorization", authorization)
            .json(conversation)
            .send()
            .await
            .map_err(|e| CollaboratorError::from_reqwest(&e))?;

        let status = response.status();
        if !status.is_success() {
            let code = status.as_u16();
            let message = format!("Request failed with status code {code}");
            return Err(match code {
                401 | 403 => CollaboratorError::auth(message),
                _ => CollaboratorError::http(code, message),
            });
        }

        response.json().await.map_err(|e| {
            CollaboratorError::invalid_response(format!("Failed to parse response: {e}"))
        })
    }
}
