//! User-facing text for every dialog branch

use super::state::{ConversationState, Slot, TaskIntent};
use super::transition::DispatchTrigger;
use crate::backend::{BackendResult, Product};
use std::fmt::Write;

pub const CANCELLED: &str = "No problem! I've cancelled that. How else can I help you?";

/// Question asking for a missing slot
pub fn follow_up_question(state: &ConversationState, slot: Slot) -> String {
    match slot {
        Slot::ProductName => "What product would you like to order?".to_string(),
        Slot::Quantity => format!(
            "How many {} would you like?",
            state.product_name.as_deref().unwrap_or("items")
        ),
        Slot::OrderId => "What's your order ID? (e.g., #12345)".to_string(),
    }
}

/// Confirmation prompt for a complete task
pub fn confirmation_prompt(state: &ConversationState) -> String {
    match state.intent {
        Some(TaskIntent::PlaceOrder) => format!(
            "Just to confirm: You want to order {} {}(s). Is that correct?",
            state.quantity.unwrap_or_default(),
            state.product_name.as_deref().unwrap_or("items")
        ),
        Some(TaskIntent::CheckStatus) => format!(
            "I'll check the status of order {}. Shall I proceed?",
            state.order_id.as_deref().unwrap_or("N/A")
        ),
        Some(TaskIntent::SearchProducts) | None => "Is this information correct?".to_string(),
    }
}

/// Acknowledgment sent right before the backend call
pub fn dispatch_acknowledgment(trigger: DispatchTrigger) -> &'static str {
    match trigger {
        DispatchTrigger::Confirmed => "Great! Processing your request...",
        DispatchTrigger::Fallback => "Let me check that for you...",
    }
}

/// Render the backend outcome
pub fn backend_message(result: &BackendResult) -> String {
    match result {
        BackendResult::Failed(err) => format!("Sorry, I encountered an error: {}", err.error),
        BackendResult::Products { products } if products.is_empty() => {
            "No products available at the moment.".to_string()
        }
        BackendResult::Products { products } => product_list(products),
        BackendResult::OrderPlaced { order_id } => format!(
            "Order placed successfully! Your order ID is: {}",
            order_id.as_deref().unwrap_or("N/A")
        ),
        BackendResult::OrderStatus {
            status,
            delivery_date,
        } => format!(
            "Order Status: {}\nExpected delivery: {}",
            status.as_deref().unwrap_or("Unknown"),
            delivery_date.as_deref().unwrap_or("N/A")
        ),
        BackendResult::Processed => "Request processed successfully!".to_string(),
    }
}

fn product_list(products: &[Product]) -> String {
    let mut out = String::from("Here are our available products:");
    for product in products {
        let _ = write!(out, "\n- {} ({} in stock)", product.name, product.stock_label());
    }
    out
}
