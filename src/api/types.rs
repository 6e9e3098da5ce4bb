//! API request and response types

use crate::dialog::{CollectedData, TaskIntent};
use crate::manager::TurnOutcome;
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Request to send a chat message
#[derive(Debug, Default, Deserialize)]
pub struct ChatRequest {
    #[serde(default)]
    pub message: Option<String>,
    /// Lowest-precedence session hint, after cookie and header
    #[serde(default)]
    pub session_id: Option<String>,
}

/// Reply to one chat turn
#[derive(Debug, Serialize)]
pub struct ChatResponse {
    pub response: String,
    pub intent: Option<TaskIntent>,
    pub collected_data: CollectedData,
    pub awaiting_confirmation: bool,
    pub backend_result: Option<Value>,
}

impl From<TurnOutcome> for ChatResponse {
    fn from(outcome: TurnOutcome) -> Self {
        Self {
            response: outcome.response,
            intent: outcome.intent,
            collected_data: outcome.collected_data,
            awaiting_confirmation: outcome.awaiting_confirmation,
            backend_result: outcome.backend_result,
        }
    }
}

#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
    pub active_conversations: usize,
}

/// Error response
#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub error: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<String>,
}

impl ErrorResponse {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            error: message.into(),
            details: None,
        }
    }

    pub fn with_details(mut self, details: impl Into<String>) -> Self {
        self.details = Some(details.into());
        self
    }
}
