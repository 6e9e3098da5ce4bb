//! Dialog core: conversation state, merging, slot requirements, the pure
//! transition function and response text.

pub mod compose;
pub mod merge;
pub mod resolution;
pub mod slots;
pub mod state;
pub mod transition;


pub use merge::{merge, reset};
pub use slots::missing;
pub use transition::{transition, Action, DialogPhase, Transition};

#[allow(unused_imports)] // Public API re-exports
pub use resolution::{Confidence, RawResolution, Resolution};
#[allow(unused_imports)] // Public API re-exports
pub use state::{CollectedData, ConversationState, Intent, Role, Slot, TaskIntent, Turn};
#[allow(unused_imports)] // Public API re-exports
pub use transition::DispatchTrigger;
