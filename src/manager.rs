//! Per-turn orchestration
//!
//! Runs one user turn end to end: load or create the session, classify the
//! message, merge, decide, optionally dispatch, and commit or delete.

#[cfg(test)]
pub mod testing;

use crate::backend::BackendDispatcher;
use crate::dialog::compose::{
    backend_message, confirmation_prompt, dispatch_acknowledgment, follow_up_question, CANCELLED,
};
use crate::dialog::{
    merge, missing, reset, transition, Action, CollectedData, ConversationState, DialogPhase,
    Role, TaskIntent, Transition,
};
use crate::error::DialogError;
use crate::nlu::{IntentResolver, ResolverContext};
use crate::session::SessionStore;
use serde_json::Value;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::Mutex;

/// Everything a caller needs to answer one turn
#[derive(Debug, Clone, PartialEq)]
pub struct TurnOutcome {
    pub session_id: String,
    pub response: String,
    pub intent: Option<TaskIntent>,
    pub collected_data: CollectedData,
    pub awaiting_confirmation: bool,
    pub backend_result: Option<Value>,
    pub phase: DialogPhase,
    /// The session was dispatched and no longer exists
    pub session_closed: bool,
}

impl TurnOutcome {
    fn new(state: &ConversationState, response: String, phase: DialogPhase) -> Self {
        Self {
            session_id: state.session_id.clone(),
            response,
            intent: state.intent,
            collected_data: state.collected_data(),
            awaiting_confirmation: state.awaiting_confirmation,
            backend_result: None,
            phase,
            session_closed: false,
        }
    }
}

/// Drives the dialog for every session
pub struct DialogManager {
    store: Arc<dyn SessionStore>,
    resolver: IntentResolver,
    dispatcher: BackendDispatcher,
    turn_locks: Mutex<HashMap<String, Arc<Mutex<()>>>>,
}

impl DialogManager {
    pub fn new(
        store: Arc<dyn SessionStore>,
        resolver: IntentResolver,
        dispatcher: BackendDispatcher,
    ) -> Self {
        Self {
            store,
            resolver,
            dispatcher,
            turn_locks: Mutex::new(HashMap::new()),
        }
    }

    /// Handle one user message for `session_id`.
    ///
    /// Classifier and backend failures are absorbed into the reply; only a
    /// missing message or an unexpected store failure is returned as an error.
    /// The turn runs on its own task, so dropping the returned future does not
    /// stop it halfway.
    pub async fn handle_turn(
        self: &Arc<Self>,
        session_id: &str,
        message: &str,
    ) -> Result<TurnOutcome, DialogError> {
        if message.trim().is_empty() {
            return Err(DialogError::Input("Message is required".to_string()));
        }

        let manager = Arc::clone(self);
        let id = session_id.to_string();
        let text = message.to_string();
        let result = tokio::spawn(async move {
            let lock = manager.turn_lock(&id).await;
            let result = {
                let _turn = lock.lock().await;
                manager.run_turn(&id, &text).await
            };
            drop(lock);
            manager.release_turn_lock(&id).await;
            result
        })
        .await
        .unwrap_or_else(|e| Err(DialogError::Internal(format!("Turn task failed: {e}"))));

        if let Err(e) = &result {
            tracing::error!(session_id = %session_id, error = %e, "Turn failed");
        }
        result
    }

    pub async fn active_sessions(&self) -> usize {
        self.store.len().await
    }

    pub async fn shutdown(&self) {
        self.store.shutdown().await;
    }

    async fn run_turn(&self, session_id: &str, message: &str) -> Result<TurnOutcome, DialogError> {
        let entry = self.store.get_or_create(session_id).await;
        let mut version = entry.version;
        let mut fresh = entry.state.history.is_empty();
        let mut state = entry.state;
        state.push_turn(Role::User, message);

        let resolved = self
            .resolver
            .resolve(message, &ResolverContext::from(&state))
            .await;

        // The reaper may have run while the classifier was in flight
        match self.store.get(session_id).await {
            Some(current) if current.version == version => {}
            current => {
                let evicted = current.is_none();
                let current = match current {
                    Some(current) => current,
                    None => self.store.get_or_create(session_id).await,
                };
                tracing::warn!(
                    session_id = %session_id,
                    evicted,
                    "Session changed while classifying, continuing from stored state"
                );
                version = current.version;
                fresh = current.state.history.is_empty();
                state = current.state;
                state.push_turn(Role::User, message);
            }
        }

        merge(&mut state, &resolved);
        let gaps = missing(&state);
        let Transition { phase, action } = transition(&state, resolved.intent, &gaps);

        let reply = match action {
            Action::AskFor(slot) => {
                tracing::debug!(session_id = %session_id, slot = slot.as_str(), "Asking for slot");
                follow_up_question(&state, slot)
            }
            Action::RequestConfirmation => {
                state.awaiting_confirmation = true;
                confirmation_prompt(&state)
            }
            Action::Cancel => {
                reset(&mut state);
                CANCELLED.to_string()
            }
            Action::Dispatch(trigger) => dispatch_acknowledgment(trigger).to_string(),
        };
        state.push_turn(Role::Assistant, reply.clone());

        tracing::info!(
            session_id = %session_id,
            resolved = ?resolved.intent,
            intent = ?state.intent,
            phase = ?phase,
            "Turn decided"
        );

        if let Action::Dispatch(_) = action {
            // Dispatch is one-shot: the session goes away before the backend
            // sees it, whatever the outcome
            self.store.delete(session_id).await;

            let result = self.dispatcher.dispatch(&state).await;
            let result_message = backend_message(&result);
            state.push_turn(Role::Assistant, result_message.clone());
            tracing::info!(
                session_id = %session_id,
                failed = result.is_error(),
                turns = state.history.len(),
                "Session dispatched and closed"
            );

            let mut outcome =
                TurnOutcome::new(&state, format!("{reply}\n\n{result_message}"), phase);
            outcome.backend_result = result.to_json();
            outcome.session_closed = true;
            return Ok(outcome);
        }

        let outcome = TurnOutcome::new(&state, reply, phase);
        if let Err(e) = self.store.save(state, version).await {
            // Nothing was ever committed to a session created by this turn
            if fresh {
                self.store.delete_if_version(session_id, version).await;
            }
            return Err(e.into());
        }
        Ok(outcome)
    }

    async fn turn_lock(&self, session_id: &str) -> Arc<Mutex<()>> {
        self.turn_locks
            .lock()
            .await
            .entry(session_id.to_string())
            .or_default()
            .clone()
    }

    /// Drop the lock entry once no other turn for the session holds it
    async fn release_turn_lock(&self, session_id: &str) {
        let mut locks = self.turn_locks.lock().await;
        if locks
            .get(session_id)
            .is_some_and(|lock| Arc::strong_count(lock) == 1)
        {
            locks.remove(session_id);
        }
    }
}
