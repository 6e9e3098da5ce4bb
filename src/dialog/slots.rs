//! Required slots per task

use super::state::{ConversationState, Slot, TaskIntent};

/// Required slots for a task, in the order they are asked for
pub fn required_slots(intent: TaskIntent) -> &'static [Slot] {
    match intent {
        TaskIntent::PlaceOrder => &[Slot::ProductName, Slot::Quantity],
        TaskIntent::CheckStatus => &[Slot::OrderId],
        TaskIntent::SearchProducts => &[],
    }
}

/// Required slots that are still empty, in declaration order.
///
/// Only the first entry is surfaced to the user per turn, so this order is
/// the question order.
pub fn missing(state: &ConversationState) -> Vec<Slot> {
    state
        .intent
        .map(required_slots)
        .unwrap_or_default()
        .iter()
        .copied()
        .filter(|slot| !state.has_slot(*slot))
        .collect()
}
