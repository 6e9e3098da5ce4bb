//! Commerce backend dispatch
//!
//! One call per session. The raw per-intent payloads are normalised into a
//! [`BackendResult`]; every failure becomes [`BackendResult::Failed`] so
//! callers never see an error from this module.

mod http;

pub use http::{BackendAuth, HttpCommerceBackend};

use crate::dialog::{ConversationState, TaskIntent};
use crate::error::CollaboratorError;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::time::timeout;

const TRANSPORT_FAILURE: &str = "Failed to process request";

static NULL: Value = Value::Null;

/// Transport to the commerce backend
#[async_trait]
pub trait CommerceBackend: Send + Sync {
    /// Submit the full conversation; returns the decoded response body
    async fn submit(&self, conversation: &ConversationState) -> Result<Value, CollaboratorError>;
}

#[async_trait]
impl<T: CommerceBackend + ?Sized> CommerceBackend for Arc<T> {
    async fn submit(&self, conversation: &ConversationState) -> Result<Value, CollaboratorError> {
        (**self).submit(conversation).await
    }
}

/// Backend used when no endpoint is configured: every call fails
pub struct UnconfiguredBackend;

#[async_trait]
impl CommerceBackend for UnconfiguredBackend {
    async fn submit(&self, _conversation: &ConversationState) -> Result<Value, CollaboratorError> {
        Err(CollaboratorError::network("No backend endpoint configured"))
    }
}

/// A product row from a search
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Product {
    pub name: String,
    #[serde(default)]
    pub stock: Value,
}

impl Product {
    pub fn stock_label(&self) -> String {
        match &self.stock {
            Value::String(s) => s.clone(),
            Value::Null => "0".to_string(),
            other => other.to_string(),
        }
    }
}

/// Structured backend failure
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BackendError {
    pub error: String,
    #[serde(default)]
    pub details: Option<String>,
}

/// Normalised outcome of a dispatch
#[derive(Debug, Clone, PartialEq)]
pub enum BackendResult {
    Products {
        products: Vec<Product>,
    },
    OrderPlaced {
        order_id: Option<String>,
    },
    OrderStatus {
        status: Option<String>,
        delivery_date: Option<String>,
    },
    Failed(BackendError),
    /// No task to send; nothing was called
    Processed,
}

impl BackendResult {
    pub fn is_error(&self) -> bool {
        matches!(self, BackendResult::Failed(_))
    }

    /// The `backend_result` object returned to clients
    pub fn to_json(&self) -> Option<Value> {
        match self {
            BackendResult::Products { products } => Some(json!({ "products": products })),
            BackendResult::OrderPlaced { order_id } => Some(json!({ "order_id": order_id })),
            BackendResult::OrderStatus {
                status,
                delivery_date,
            } => Some(json!({ "status": status, "delivery_date": delivery_date })),
            BackendResult::Failed(err) => serde_json::to_value(err).ok(),
            BackendResult::Processed => None,
        }
    }

    /// Interpret a raw response body for the given task
    pub fn from_payload(intent: TaskIntent, payload: &Value) -> Self {
        if let Some(err) = payload_error(payload) {
            return BackendResult::Failed(err);
        }

        match intent {
            TaskIntent::SearchProducts => BackendResult::Products {
                products: payload
                    .get("products")
                    .and_then(|p| serde_json::from_value(p.clone()).ok())
                    .unwrap_or_default(),
            },
            TaskIntent::PlaceOrder => BackendResult::OrderPlaced {
                order_id: scalar_text(payload.get("order_id")),
            },
            TaskIntent::CheckStatus => {
                let inner = payload.get("backend_result").unwrap_or(&NULL);
                if let Some(err) = payload_error(inner) {
                    return BackendResult::Failed(err);
                }
                BackendResult::OrderStatus {
                    status: scalar_text(inner.get("status")),
                    delivery_date: scalar_text(inner.get("delivery_date")),
                }
            }
        }
    }
}

fn payload_error(payload: &Value) -> Option<BackendError> {
    let error = payload.get("error").filter(|e| !e.is_null())?;
    Some(BackendError {
        error: scalar_text(Some(error)).unwrap_or_else(|| error.to_string()),
        details: scalar_text(payload.get("details")),
    })
}

fn scalar_text(value: Option<&Value>) -> Option<String> {
    match value? {
        Value::String(s) if !s.is_empty() => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

/// Never-failing wrapper around a [`CommerceBackend`]
pub struct BackendDispatcher {
    backend: Arc<dyn CommerceBackend>,
    timeout: Duration,
}

impl BackendDispatcher {
    pub fn new(backend: Arc<dyn CommerceBackend>, timeout: Duration) -> Self {
        Self { backend, timeout }
    }

    pub async fn dispatch(&self, conversation: &ConversationState) -> BackendResult {
        let Some(intent) = conversation.intent else {
            tracing::info!(
                session_id = %conversation.session_id,
                "No task on conversation, skipping backend call"
            );
            return BackendResult::Processed;
        };

        let start = Instant::now();
        let outcome = timeout(self.timeout, self.backend.submit(conversation)).await;
        let duration_ms = start.elapsed().as_millis();

        let result = match outcome {
            Ok(Ok(payload)) => BackendResult::from_payload(intent, &payload),
            Ok(Err(e)) => {
                tracing::error!(
                    session_id = %conversation.session_id,
                    intent = intent.as_str(),
                    kind = e.kind.as_str(),
                    error = %e.message,
                    "Backend API error"
                );
                transport_failure(e.message)
            }
            Err(_) => {
                tracing::error!(
                    session_id = %conversation.session_id,
                    intent = intent.as_str(),
                    timeout_ms = %self.timeout.as_millis(),
                    "Backend API timed out"
                );
                transport_failure(format!(
                    "Backend did not respond within {}s",
                    self.timeout.as_secs()
                ))
            }
        };

        tracing::info!(
            session_id = %conversation.session_id,
            intent = intent.as_str(),
            duration_ms = %duration_ms,
            error = result.is_error(),
            "Backend dispatch finished"
        );
        result
    }
}

fn transport_failure(details: String) -> BackendResult {
    BackendResult::Failed(BackendError {
        error: TRANSPORT_FAILURE.to_string(),
        details: Some(details),
    })
}
