//! Applying a resolution onto conversation state

use super::resolution::Resolution;
use super::state::{ConversationState, Intent};

/// Merge a resolved turn into the conversation.
///
/// Only task intents replace the stored intent; `provide_info`, `confirm`,
/// `cancel` and `unknown` describe how the user is answering, not a new task.
/// Slots are only ever overwritten with values, never with `None`.
pub fn merge(state: &mut ConversationState, resolved: &Resolution) {
    if let Some(task) = resolved.intent.as_task() {
        state.intent = Some(task);
    }

    if let Some(product_name) = &resolved.product_name {
        state.product_name = Some(product_name.clone());
    }
    if let Some(quantity) = resolved.quantity {
        state.quantity = Some(quantity);
    }
    if let Some(order_id) = &resolved.order_id {
        state.order_id = Some(order_id.clone());
    }

    // A yes only counts as confirmation when a prompt is outstanding
    if resolved.intent == Intent::Confirm && state.awaiting_confirmation {
        state.confirmed = true;
    }
}

/// Clear the task, slots and handshake flags. History is kept.
pub fn reset(state: &mut ConversationState) {
    state.intent = None;
    state.product_name = None;
    state.quantity = None;
    state.order_id = None;
    state.confirmed = false;
    state.awaiting_confirmation = false;
}
