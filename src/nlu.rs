//! Intent resolution
//!
//! Wraps an external classifier and turns whatever it returns into a typed
//! [`Resolution`]. Transport failures, timeouts and unparsable output all
//! degrade to [`Resolution::fallback`]; nothing here returns an error.

mod gemini;
mod prompt;

pub use gemini::GeminiClassifier;
pub use prompt::build_prompt;

use crate::dialog::{ConversationState, RawResolution, Resolution, TaskIntent};
use crate::error::CollaboratorError;
use async_trait::async_trait;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::time::timeout;

/// External service that turns a prompt into raw model text
#[async_trait]
pub trait IntentClassifier: Send + Sync {
    async fn classify(&self, prompt: &str) -> Result<String, CollaboratorError>;

    /// Name used in logs
    fn name(&self) -> &str;
}

#[async_trait]
impl<T: IntentClassifier + ?Sized> IntentClassifier for Arc<T> {
    async fn classify(&self, prompt: &str) -> Result<String, CollaboratorError> {
        (**self).classify(prompt).await
    }

    fn name(&self) -> &str {
        (**self).name()
    }
}

/// Classifier used when no endpoint is configured: every call fails
pub struct UnconfiguredClassifier;

#[async_trait]
impl IntentClassifier for UnconfiguredClassifier {
    async fn classify(&self, _prompt: &str) -> Result<String, CollaboratorError> {
        Err(CollaboratorError::network("No classifier endpoint configured"))
    }

    fn name(&self) -> &str {
        "unconfigured"
    }
}

/// What the classifier is told about the conversation so far, so short
/// replies like "yes" or "two" can be disambiguated
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ResolverContext {
    pub intent: Option<TaskIntent>,
    pub product_name: Option<String>,
    pub quantity: Option<u32>,
    pub order_id: Option<String>,
    pub awaiting_confirmation: bool,
}

impl From<&ConversationState> for ResolverContext {
    fn from(state: &ConversationState) -> Self {
        Self {
            intent: state.intent,
            product_name: state.product_name.clone(),
            quantity: state.quantity,
            order_id: state.order_id.clone(),
            awaiting_confirmation: state.awaiting_confirmation,
        }
    }
}

/// Degrading wrapper around an [`IntentClassifier`]
pub struct IntentResolver {
    classifier: Arc<dyn IntentClassifier>,
    timeout: Duration,
}

impl IntentResolver {
    pub fn new(classifier: Arc<dyn IntentClassifier>, timeout: Duration) -> Self {
        Self {
            classifier,
            timeout,
        }
    }

    pub async fn resolve(&self, message: &str, context: &ResolverContext) -> Resolution {
        let prompt = build_prompt(message, context);
        let start = Instant::now();
        let result = timeout(self.timeout, self.classifier.classify(&prompt)).await;
        let duration_ms = start.elapsed().as_millis();

        let text = match result {
            Ok(Ok(text)) => text,
            Ok(Err(e)) => {
                tracing::warn!(
                    classifier = %self.classifier.name(),
                    kind = e.kind.as_str(),
                    error = %e.message,
                    duration_ms = %duration_ms,
                    "Classifier call failed, using fallback"
                );
                return Resolution::fallback();
            }
            Err(_) => {
                tracing::warn!(
                    classifier = %self.classifier.name(),
                    timeout_ms = %self.timeout.as_millis(),
                    "Classifier call timed out, using fallback"
                );
                return Resolution::fallback();
            }
        };

        match parse_resolution(&text) {
            Ok(resolution) => {
                tracing::info!(
                    classifier = %self.classifier.name(),
                    duration_ms = %duration_ms,
                    intent = ?resolution.intent,
                    confidence = ?resolution.confidence,
                    "Message classified"
                );
                resolution
            }
            Err(e) => {
                tracing::warn!(
                    classifier = %self.classifier.name(),
                    error = %e,
                    "Unparsable classifier output, using fallback"
                );
                Resolution::fallback()
            }
        }
    }
}

/// Parse classifier text, tolerating a markdown code fence around the JSON
pub fn parse_resolution(text: &str) -> Result<Resolution, serde_json::Error> {
    let raw: RawResolution = serde_json::from_str(strip_code_fence(text))?;
    Ok(Resolution::from_raw(&raw))
}

fn strip_code_fence(text: &str) -> &str {
    let trimmed = text.trim();
    let Some(rest) = trimmed.strip_prefix("```") else {
        return trimmed;
    };
    let rest = rest.strip_prefix("json").unwrap_or(rest);
    let rest = rest.strip_suffix("```").unwrap_or(rest);
    rest.trim()
}
