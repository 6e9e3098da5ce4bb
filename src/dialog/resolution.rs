//! Typed classifier output and the coercion applied at the merge boundary

use super::state::Intent;
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// How sure the classifier claims to be
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Confidence {
    High,
    Medium,
    Low,
}

impl Confidence {
    fn from_label(label: &str) -> Self {
        match label.trim() {
            "high" => Confidence::High,
            "medium" => Confidence::Medium,
            _ => Confidence::Low,
        }
    }
}

/// Classifier output after normalisation
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Resolution {
    pub intent: Intent,
    pub product_name: Option<String>,
    pub quantity: Option<u32>,
    pub order_id: Option<String>,
    pub confidence: Confidence,
}

/// Untyped shape the classifier is asked to produce
#[derive(Debug, Default, Deserialize)]
pub struct RawResolution {
    #[serde(default)]
    pub intent: Value,
    #[serde(default)]
    pub product_name: Value,
    #[serde(default)]
    pub quantity: Value,
    #[serde(default)]
    pub order_id: Value,
    #[serde(default)]
    pub confidence: Value,
}

impl Resolution {
    /// Recoverable degradation used whenever the classifier cannot be trusted
    pub fn fallback() -> Self {
        Self {
            intent: Intent::Unknown,
            product_name: None,
            quantity: None,
            order_id: None,
            confidence: Confidence::Low,
        }
    }

    #[cfg(test)]
    pub fn with_intent(intent: Intent) -> Self {
        Self {
            intent,
            confidence: Confidence::High,
            ..Self::fallback()
        }
    }

    /// Validate and coerce loosely typed fields into the slot schema
    pub fn from_raw(raw: &RawResolution) -> Self {
        Self {
            intent: raw
                .intent
                .as_str()
                .map_or(Intent::Unknown, Intent::from_label),
            product_name: coerce_text(&raw.product_name),
            quantity: coerce_quantity(&raw.quantity),
            order_id: coerce_identifier(&raw.order_id),
            confidence: raw
                .confidence
                .as_str()
                .map_or(Confidence::Low, Confidence::from_label),
        }
    }
}

fn coerce_text(value: &Value) -> Option<String> {
    match value {
        Value::String(s) if !s.trim().is_empty() => Some(s.trim().to_string()),
        _ => None,
    }
}

/// Positive integers only; accepts `2`, `2.0` and `"2"`
#[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)] // range checked above the cast
fn coerce_quantity(value: &Value) -> Option<u32> {
    let parsed = match value {
        Value::Number(n) => n.as_u64().or_else(|| {
            n.as_f64()
                .filter(|f| f.fract().abs() < f64::EPSILON && *f >= 0.0 && *f <= f64::from(u32::MAX))
                .map(|f| f as u64)
        }),
        Value::String(s) => s.trim().parse::<u64>().ok(),
        _ => None,
    }?;
    u32::try_from(parsed).ok().filter(|q| *q > 0)
}

fn coerce_identifier(value: &Value) -> Option<String> {
    match value {
        Value::Number(n) => Some(n.to_string()),
        other => coerce_text(other),
    }
}
