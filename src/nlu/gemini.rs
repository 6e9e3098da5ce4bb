//! Google Gemini classifier

use super::IntentClassifier;
use crate::error::CollaboratorError;
use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};

/// Calls a Gemini `generateContent` endpoint with the prompt as a single user turn
pub struct GeminiClassifier {
    client: Client,
    url: String,
    api_key: String,
}

impl GeminiClassifier {
    pub fn new(client: Client, url: impl Into<String>, api_key: impl Into<String>) -> Self {
        Self {
            client,
            url: url.into(),
            api_key: api_key.into(),
        }
    }

    fn build_request(prompt: &str) -> GeminiRequest {
        GeminiRequest {
            contents: vec![GeminiContent {
                role: Some("user".to_string()),
                parts: vec![GeminiPart {
                    text: prompt.to_string(),
                }],
            }],
        }
    }

    /// First text part of the first candidate
    fn extract_text(resp: GeminiResponse) -> Result<String, CollaboratorError> {
        resp.candidates
            .into_iter()
            .next()
            .and_then(|c| c.content.parts.into_iter().next())
            .map(|p| p.text)
            .ok_or_else(|| CollaboratorError::invalid_response("No candidates in response"))
    }
}

#[async_trait]
impl IntentClassifier for GeminiClassifier {
    async fn classify(&self, prompt: &str) -> Result<String, CollaboratorError> {
        let response = self
            .client
            .post(&self.url)
            .header("x-goog-api-key", &self.api_key)
            .json(&Self::build_request(prompt))
            .send()
            .await
            .map_err(|e| CollaboratorError::from_reqwest(&e))?;

        let status = response.status();
        let body = response
            .text()
            .await
            .map_err(|e| CollaboratorError::network(format!("Failed to read response: {e}")))?;

        if !status.is_success() {
            let message = serde_json::from_str::<GeminiErrorResponse>(&body)
                .map_or(body, |r| r.error.message);
            return Err(match status.as_u16() {
                401 | 403 => CollaboratorError::auth(format!("Authentication failed: {message}")),
                code => CollaboratorError::http(code, format!("HTTP {status}: {message}")),
            });
        }

        let parsed: GeminiResponse = serde_json::from_str(&body).map_err(|e| {
            CollaboratorError::invalid_response(format!("Failed to parse response: {e}"))
        })?;

        Self::extract_text(parsed)
    }

    fn name(&self) -> &str {
        "gemini"
    }
}

// Gemini API types

#[derive(Debug, Serialize)]
struct GeminiRequest {
    contents: Vec<GeminiContent>,
}

#[derive(Debug, Serialize, Deserialize)]
struct GeminiContent {
    #[serde(skip_serializing_if = "Option::is_none", default)]
    role: Option<String>,
    #[serde(default)]
    parts: Vec<GeminiPart>,
}

#[derive(Debug, Serialize, Deserialize)]
struct GeminiPart {
    #[serde(default)]
    text: String,
}

#[derive(Debug, Deserialize)]
struct GeminiResponse {
    #[serde(default)]
    candidates: Vec<GeminiCandidate>,
}

#[derive(Debug, Deserialize)]
struct GeminiCandidate {
    content: GeminiContent,
}

#[derive(Debug, Deserialize)]
struct GeminiErrorResponse {
    error: GeminiError,
}

#[derive(Debug, Deserialize)]
struct GeminiError {
    message: String,
}
