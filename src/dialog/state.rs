//! Conversation state types

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A task the user wants performed. Only these are stored on a conversation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TaskIntent {
    SearchProducts,
    PlaceOrder,
    CheckStatus,
}

impl TaskIntent {
    pub fn as_str(self) -> &'static str {
        match self {
            TaskIntent::SearchProducts => "search_products",
            TaskIntent::PlaceOrder => "place_order",
            TaskIntent::CheckStatus => "check_status",
        }
    }

    /// Whether a dispatch for this task needs an explicit yes first
    pub fn requires_confirmation(self) -> bool {
        !matches!(self, TaskIntent::SearchProducts)
    }
}

/// Classified purpose of a single user message
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Intent {
    SearchProducts,
    PlaceOrder,
    CheckStatus,
    Confirm,
    Cancel,
    ProvideInfo,
    Unknown,
}

impl Intent {
    /// Parse a classifier label; anything unrecognised is `Unknown`
    pub fn from_label(label: &str) -> Self {
        match label.trim() {
            "search_products" => Intent::SearchProducts,
            "place_order" => Intent::PlaceOrder,
            "check_status" => Intent::CheckStatus,
            "confirm" => Intent::Confirm,
            "cancel" => Intent::Cancel,
            "provide_info" => Intent::ProvideInfo,
            _ => Intent::Unknown,
        }
    }

    /// The task this intent starts, if it starts one
    pub fn as_task(self) -> Option<TaskIntent> {
        match self {
            Intent::SearchProducts => Some(TaskIntent::SearchProducts),
            Intent::PlaceOrder => Some(TaskIntent::PlaceOrder),
            Intent::CheckStatus => Some(TaskIntent::CheckStatus),
            Intent::Confirm | Intent::Cancel | Intent::ProvideInfo | Intent::Unknown => None,
        }
    }
}

/// A named piece of information a task needs
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Slot {
    ProductName,
    Quantity,
    OrderId,
}

impl Slot {
    pub fn as_str(self) -> &'static str {
        match self {
            Slot::ProductName => "product_name",
            Slot::Quantity => "quantity",
            Slot::OrderId => "order_id",
        }
    }
}

/// Who authored a turn
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    User,
    Assistant,
}

/// One entry in the conversation history
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Turn {
    pub role: Role,
    pub message: String,
    pub timestamp: DateTime<Utc>,
}

/// Everything the dialog knows about one session
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConversationState {
    pub session_id: String,
    pub intent: Option<TaskIntent>,
    pub product_name: Option<String>,
    pub quantity: Option<u32>,
    pub order_id: Option<String>,
    pub confirmed: bool,
    pub awaiting_confirmation: bool,
    pub history: Vec<Turn>,
    pub created_at: DateTime<Utc>,
}

impl ConversationState {
    pub fn new(session_id: impl Into<String>) -> Self {
        Self::new_at(session_id, Utc::now())
    }

    pub fn new_at(session_id: impl Into<String>, created_at: DateTime<Utc>) -> Self {
        Self {
            session_id: session_id.into(),
            intent: None,
            product_name: None,
            quantity: None,
            order_id: None,
            confirmed: false,
            awaiting_confirmation: false,
            history: Vec::new(),
            created_at,
        }
    }

    pub fn push_turn(&mut self, role: Role, message: impl Into<String>) {
        self.history.push(Turn {
            role,
            message: message.into(),
            timestamp: Utc::now(),
        });
    }

    /// Timestamp of the most recent turn, or creation time for an empty history
    pub fn last_activity(&self) -> DateTime<Utc> {
        self.history
            .last()
            .map_or(self.created_at, |turn| turn.timestamp)
    }

    /// Whether the given slot currently holds a value
    pub fn has_slot(&self, slot: Slot) -> bool {
        match slot {
            Slot::ProductName => self.product_name.is_some(),
            Slot::Quantity => self.quantity.is_some(),
            Slot::OrderId => self.order_id.is_some(),
        }
    }

    pub fn collected_data(&self) -> CollectedData {
        CollectedData {
            product_name: self.product_name.clone(),
            quantity: self.quantity,
            order_id: self.order_id.clone(),
        }
    }
}

/// Slot values as exposed to clients
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CollectedData {
    pub product_name: Option<String>,
    pub quantity: Option<u32>,
    pub order_id: Option<String>,
}
