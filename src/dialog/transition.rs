//! Pure dialog transition function
//!
//! Given the merged conversation, the intent the user expressed this turn and
//! the still-missing slots, decide the next phase and the action to take. No
//! I/O happens here; the manager executes the returned action.

use super::state::{ConversationState, Intent, Slot, TaskIntent};
use serde::Serialize;

/// Where the dialog is after a turn
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum DialogPhase {
    /// At least one required slot is empty
    Collecting,
    /// Slots complete, waiting for an explicit yes
    Confirming,
    /// Cancelled this turn; folds back into collecting
    Reset,
    /// Sent to the backend; the session is gone
    Dispatched,
}

/// What caused a dispatch
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum DispatchTrigger {
    /// Explicit confirm while a confirmation prompt was outstanding
    Confirmed,
    /// Reached the end of the rule chain without an explicit confirm
    /// (e.g. a complete `search_products` turn)
    Fallback,
}

/// Action the manager must carry out
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Action {
    AskFor(Slot),
    RequestConfirmation,
    Dispatch(DispatchTrigger),
    Cancel,
}

/// Result of a transition
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Transition {
    pub phase: DialogPhase,
    pub action: Action,
}

impl Transition {
    fn new(phase: DialogPhase, action: Action) -> Self {
        Self { phase, action }
    }
}

/// Decide the next step. Rules are evaluated in a fixed order:
///
/// 0. an explicit cancel resets the dialog, whatever else is pending
/// 1. a missing slot is asked for (first missing only)
/// 2. a task needing confirmation that has none asks for it
/// 3. a confirm answering an outstanding prompt dispatches
/// 4. anything else dispatches as a fallback
pub fn transition(state: &ConversationState, resolved: Intent, missing: &[Slot]) -> Transition {
    if resolved == Intent::Cancel {
        return Transition::new(DialogPhase::Reset, Action::Cancel);
    }

    if let Some(slot) = missing.first() {
        return Transition::new(DialogPhase::Collecting, Action::AskFor(*slot));
    }

    // A missing task still needs a yes before anything is sent
    let needs_confirmation = state
        .intent
        .map_or(true, TaskIntent::requires_confirmation);
    if !state.confirmed && needs_confirmation {
        return Transition::new(DialogPhase::Confirming, Action::RequestConfirmation);
    }

    if resolved == Intent::Confirm && state.awaiting_confirmation {
        return Transition::new(
            DialogPhase::Dispatched,
            Action::Dispatch(DispatchTrigger::Confirmed),
        );
    }

    Transition::new(
        DialogPhase::Dispatched,
        Action::Dispatch(DispatchTrigger::Fallback),
    )
}
