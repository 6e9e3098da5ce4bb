//! Mock collaborators for exercising the dialog manager without I/O

use super::DialogManager;
use crate::backend::{BackendDispatcher, CommerceBackend};
use crate::dialog::ConversationState;
use crate::error::{CollaboratorError, StoreError};
use crate::nlu::{IntentClassifier, IntentResolver};
use crate::session::{InMemorySessionStore, SessionEntry, SessionStore};
use async_trait::async_trait;
use serde_json::Value;
use std::collections::VecDeque;
use std::sync::{Arc, Mutex};
use std::time::Duration;

// ============================================================================
// Mock classifier
// ============================================================================

/// Classifier that returns queued replies in order
#[derive(Default)]
pub struct MockClassifier {
    replies: Mutex<VecDeque<Result<String, CollaboratorError>>>,
    /// Every prompt received, in call order
    pub prompts: Mutex<Vec<String>>,
    delay: Duration,
}

impl MockClassifier {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_delay(delay: Duration) -> Self {
        Self {
            delay,
            ..Self::default()
        }
    }

    /// Queue a classification serialised from JSON
    pub fn queue(&self, reply: Value) -> &Self {
        self.replies
            .lock()
            .unwrap()
            .push_back(Ok(reply.to_string()));
        self
    }

    pub fn queue_error(&self, error: CollaboratorError) -> &Self {
        self.replies.lock().unwrap().push_back(Err(error));
        self
    }

    pub fn recorded_prompts(&self) -> Vec<String> {
        self.prompts.lock().unwrap().clone()
    }
}

#[async_trait]
impl IntentClassifier for MockClassifier {
    async fn classify(&self, prompt: &str) -> Result<String, CollaboratorError> {
        self.prompts.lock().unwrap().push(prompt.to_string());
        let reply = self
            .replies
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(|| Err(CollaboratorError::network("No mock reply queued")));
        if !self.delay.is_zero() {
            tokio::time::sleep(self.delay).await;
        }
        reply
    }

    fn name(&self) -> &str {
        "mock"
    }
}

/// Classifier that deletes the session while "thinking", like the reaper would
pub struct EvictingClassifier {
    store: Arc<InMemorySessionStore>,
    session_id: String,
    reply: Value,
}

impl EvictingClassifier {
    pub fn new(store: Arc<InMemorySessionStore>, session_id: &str, reply: Value) -> Self {
        Self {
            store,
            session_id: session_id.to_string(),
            reply,
        }
    }
}

#[async_trait]
impl IntentClassifier for EvictingClassifier {
    async fn classify(&self, _prompt: &str) -> Result<String, CollaboratorError> {
        self.store.delete(&self.session_id).await;
        Ok(self.reply.to_string())
    }

    fn name(&self) -> &str {
        "evicting"
    }
}

/// Classifier that commits a different product to the session mid-turn
pub struct EditingClassifier {
    store: Arc<InMemorySessionStore>,
    session_id: String,
    product_name: String,
    reply: Value,
}

impl EditingClassifier {
    pub fn new(
        store: Arc<InMemorySessionStore>,
        session_id: &str,
        product_name: &str,
        reply: Value,
    ) -> Self {
        Self {
            store,
            session_id: session_id.to_string(),
            product_name: product_name.to_string(),
            reply,
        }
    }
}

#[async_trait]
impl IntentClassifier for EditingClassifier {
    async fn classify(&self, _prompt: &str) -> Result<String, CollaboratorError> {
        if let Some(entry) = self.store.get(&self.session_id).await {
            let mut state = entry.state;
            state.product_name = Some(self.product_name.clone());
            self.store
                .save(state, entry.version)
                .await
                .map_err(|e| CollaboratorError::network(e.to_string()))?;
        }
        Ok(self.reply.to_string())
    }

    fn name(&self) -> &str {
        "editing"
    }
}

// ============================================================================
// Mock backend
// ============================================================================

/// Backend that records submissions and returns queued replies
#[derive(Default)]
pub struct MockBackend {
    replies: Mutex<VecDeque<Result<Value, CollaboratorError>>>,
    /// Every conversation submitted, in call order
    pub submissions: Mutex<Vec<ConversationState>>,
    delay: Duration,
}

impl MockBackend {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_delay(delay: Duration) -> Self {
        Self {
            delay,
            ..Self::default()
        }
    }

    pub fn queue(&self, reply: Value) -> &Self {
        self.replies.lock().unwrap().push_back(Ok(reply));
        self
    }

    pub fn queue_error(&self, error: CollaboratorError) -> &Self {
        self.replies.lock().unwrap().push_back(Err(error));
        self
    }

    pub fn recorded_submissions(&self) -> Vec<ConversationState> {
        self.submissions.lock().unwrap().clone()
    }
}

#[async_trait]
impl CommerceBackend for MockBackend {
    async fn submit(&self, conversation: &ConversationState) -> Result<Value, CollaboratorError> {
        self.submissions.lock().unwrap().push(conversation.clone());
        let reply = self
            .replies
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(|| Err(CollaboratorError::network("No mock reply queued")));
        if !self.delay.is_zero() {
            tokio::time::sleep(self.delay).await;
        }
        reply
    }
}

// ============================================================================
// Failing store
// ============================================================================

/// Store whose commits always fail
#[derive(Default)]
pub struct FrozenStore {
    inner: InMemorySessionStore,
}

#[async_trait]
impl SessionStore for FrozenStore {
    async fn get_or_create(&self, id: &str) -> SessionEntry {
        self.inner.get_or_create(id).await
    }

    async fn get(&self, id: &str) -> Option<SessionEntry> {
        self.inner.get(id).await
    }

    async fn save(
        &self,
        state: ConversationState,
        _expected_version: u64,
    ) -> Result<u64, StoreError> {
        Err(StoreError::Evicted(state.session_id))
    }

    async fn delete(&self, id: &str) -> bool {
        self.inner.delete(id).await
    }

    async fn delete_if_version(&self, id: &str, version: u64) -> bool {
        self.inner.delete_if_version(id, version).await
    }

    async fn each(&self) -> Vec<SessionEntry> {
        self.inner.each().await
    }

    async fn len(&self) -> usize {
        self.inner.len().await
    }
}

/// Wire a manager around the given collaborators with short timeouts
pub fn manager_with(
    store: Arc<dyn SessionStore>,
    classifier: Arc<dyn IntentClassifier>,
    backend: Arc<dyn CommerceBackend>,
) -> Arc<DialogManager> {
    Arc::new(DialogManager::new(
        store,
        IntentResolver::new(classifier, Duration::from_secs(2)),
        BackendDispatcher::new(backend, Duration::from_secs(2)),
    ))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dialog::{DialogPhase, Role, TaskIntent};
    use crate::error::DialogError;
    use serde_json::json;

    struct Harness {
        store: Arc<InMemorySessionStore>,
        classifier: Arc<MockClassifier>,
        backend: Arc<MockBackend>,
        manager: Arc<DialogManager>,
    }

    fn harness() -> Harness {
        harness_with(MockClassifier::new(), MockBackend::new())
    }

    fn harness_with(classifier: MockClassifier, backend: MockBackend) -> Harness {
        let store = Arc::new(InMemorySessionStore::new());
        let classifier = Arc::new(classifier);
        let backend = Arc::new(backend);
        let manager = manager_with(store.clone(), classifier.clone(), backend.clone());
        Harness {
            store,
            classifier,
            backend,
            manager,
        }
    }

    #[tokio::test]
    async fn test_search_dispatches_on_first_turn() {
        let h = harness();
        h.classifier
            .queue(json!({ "intent": "search_products", "confidence": "high" }));
        h.backend
            .queue(json!({ "products": [{ "name": "Laptop", "stock": 5 }, { "name": "Mouse", "stock": 0 }] }));

        let outcome = h.manager.handle_turn("s1", "what do you sell?").await.unwrap();

        assert_eq!(
            outcome.response,
            "Let me check that for you...\n\n\
             Here are our available products:\n- Laptop (5 in stock)\n- Mouse (0 in stock)"
        );
        assert_eq!(outcome.phase, DialogPhase::Dispatched);
        assert!(outcome.session_closed);
        assert_eq!(outcome.intent, Some(TaskIntent::SearchProducts));
        assert_eq!(
            outcome.backend_result,
            Some(json!({ "products": [{ "name": "Laptop", "stock": 5 }, { "name": "Mouse", "stock": 0 }] }))
        );
        assert_eq!(h.manager.active_sessions().await, 0);
        assert_eq!(h.backend.recorded_submissions().len(), 1);
    }

    #[tokio::test]
    async fn test_place_order_collects_confirms_and_dispatches() {
        let h = harness();
        h.classifier
            .queue(json!({ "intent": "place_order", "product_name": "laptop", "quantity": null }))
            .queue(json!({ "intent": "provide_info", "quantity": 2 }))
            .queue(json!({ "intent": "confirm" }));
        h.backend.queue(json!({ "order_id": "ORD-42" }));

        let first = h.manager.handle_turn("s1", "I want a laptop").await.unwrap();
        assert_eq!(first.response, "How many laptop would you like?");
        assert_eq!(first.phase, DialogPhase::Collecting);
        assert_eq!(first.intent, Some(TaskIntent::PlaceOrder));
        assert_eq!(first.collected_data.product_name.as_deref(), Some("laptop"));
        assert!(!first.awaiting_confirmation);

        let second = h.manager.handle_turn("s1", "two").await.unwrap();
        assert_eq!(
            second.response,
            "Just to confirm: You want to order 2 laptop(s). Is that correct?"
        );
        assert_eq!(second.phase, DialogPhase::Confirming);
        assert_eq!(second.collected_data.quantity, Some(2));
        assert!(second.awaiting_confirmation);
        assert!(h.backend.recorded_submissions().is_empty());

        let third = h.manager.handle_turn("s1", "yes").await.unwrap();
        assert_eq!(
            third.response,
            "Great! Processing your request...\n\nOrder placed successfully! Your order ID is: ORD-42"
        );
        assert_eq!(third.phase, DialogPhase::Dispatched);
        assert_eq!(third.backend_result, Some(json!({ "order_id": "ORD-42" })));
        assert!(third.session_closed);
        assert!(h.store.get("s1").await.is_none());

        let submitted = h.backend.recorded_submissions();
        assert_eq!(submitted.len(), 1);
        assert!(submitted[0].confirmed);
        assert_eq!(submitted[0].quantity, Some(2));
        assert_eq!(submitted[0].history.len(), 6);
        assert_eq!(submitted[0].history[4].role, Role::User);
        assert_eq!(submitted[0].history[4].message, "yes");

        // Later turns carry what was collected so far
        let prompts = h.classifier.recorded_prompts();
        assert!(!prompts[0].contains("CONVERSATION CONTEXT"));
        assert!(prompts[2].contains("- Product name: laptop"));
        assert!(prompts[2].contains("- Awaiting confirmation: true"));
    }

    #[tokio::test]
    async fn test_check_status_reads_nested_result() {
        let h = harness();
        h.classifier
            .queue(json!({ "intent": "check_status", "order_id": "#12345" }))
            .queue(json!({ "intent": "confirm" }));
        h.backend.queue(json!({
            "backend_result": { "status": "Shipped", "delivery_date": "2024-06-01" }
        }));

        let first = h.manager.handle_turn("s1", "where is order #12345").await.unwrap();
        assert_eq!(
            first.response,
            "I'll check the status of order #12345. Shall I proceed?"
        );

        let second = h.manager.handle_turn("s1", "go ahead").await.unwrap();
        assert_eq!(
            second.response,
            "Great! Processing your request...\n\nOrder Status: Shipped\nExpected delivery: 2024-06-01"
        );
    }

    #[tokio::test]
    async fn test_cancel_resets_but_keeps_session() {
        let h = harness();
        h.classifier
            .queue(json!({ "intent": "place_order", "product_name": "laptop" }))
            .queue(json!({ "intent": "cancel" }));

        h.manager.handle_turn("s1", "I want a laptop").await.unwrap();
        let outcome = h.manager.handle_turn("s1", "never mind").await.unwrap();

        assert_eq!(
            outcome.response,
            "No problem! I've cancelled that. How else can I help you?"
        );
        assert_eq!(outcome.phase, DialogPhase::Reset);
        assert_eq!(outcome.intent, None);
        assert_eq!(outcome.collected_data.product_name, None);

        let stored = h.store.get("s1").await.unwrap().state;
        assert_eq!(stored.intent, None);
        assert_eq!(stored.history.len(), 4);
        assert!(h.backend.recorded_submissions().is_empty());
    }

    #[tokio::test]
    async fn test_classifier_failure_keeps_collected_slots() {
        let h = harness();
        h.classifier
            .queue(json!({ "intent": "place_order", "product_name": "laptop" }))
            .queue_error(CollaboratorError::http(503, "unavailable"));

        h.manager.handle_turn("s1", "I want a laptop").await.unwrap();
        let outcome = h.manager.handle_turn("s1", "uh").await.unwrap();

        assert_eq!(outcome.response, "How many laptop would you like?");
        assert_eq!(outcome.intent, Some(TaskIntent::PlaceOrder));
        assert_eq!(outcome.collected_data.product_name.as_deref(), Some("laptop"));
    }

    #[tokio::test]
    async fn test_unparsable_classifier_output_degrades() {
        let h = harness();
        h.classifier
            .queue(json!({ "intent": "place_order", "product_name": "laptop", "quantity": 1 }));
        h.classifier.replies.lock().unwrap().push_back(Ok("not json".to_string()));

        let first = h.manager.handle_turn("s1", "one laptop").await.unwrap();
        assert_eq!(first.phase, DialogPhase::Confirming);

        // Unknown with everything filled but unconfirmed asks again
        let second = h.manager.handle_turn("s1", "hmm").await.unwrap();
        assert_eq!(second.phase, DialogPhase::Confirming);
        assert_eq!(
            second.response,
            "Just to confirm: You want to order 1 laptop(s). Is that correct?"
        );
        assert!(h.backend.recorded_submissions().is_empty());
    }

    #[tokio::test]
    async fn test_backend_failure_still_closes_session() {
        let h = harness();
        h.classifier
            .queue(json!({ "intent": "place_order", "product_name": "laptop", "quantity": 2 }))
            .queue(json!({ "intent": "confirm" }));
        h.backend
            .queue_error(CollaboratorError::http(500, "Request failed with status code 500"));

        h.manager.handle_turn("s1", "two laptops").await.unwrap();
        let outcome = h.manager.handle_turn("s1", "yes").await.unwrap();

        assert_eq!(
            outcome.response,
            "Great! Processing your request...\n\nSorry, I encountered an error: Failed to process request"
        );
        assert_eq!(
            outcome.backend_result,
            Some(json!({
                "error": "Failed to process request",
                "details": "Request failed with status code 500"
            }))
        );
        assert!(outcome.session_closed);
        assert_eq!(h.manager.active_sessions().await, 0);
    }

    #[tokio::test]
    async fn test_blank_message_is_rejected_without_state() {
        let h = harness();
        let err = h.manager.handle_turn("s1", "   ").await.unwrap_err();
        assert!(matches!(err, DialogError::Input(msg) if msg == "Message is required"));
        assert_eq!(h.manager.active_sessions().await, 0);
        assert!(h.classifier.recorded_prompts().is_empty());
    }

    #[tokio::test]
    async fn test_first_turn_without_task_asks_generic_confirmation() {
        let h = harness();
        h.classifier.queue(json!({ "intent": "unknown" }));

        let outcome = h.manager.handle_turn("s1", "hello").await.unwrap();
        assert_eq!(outcome.response, "Is this information correct?");
        assert!(outcome.awaiting_confirmation);
        assert_eq!(h.manager.active_sessions().await, 1);
    }

    #[tokio::test]
    async fn test_eviction_during_classification_starts_fresh() {
        let store = Arc::new(InMemorySessionStore::new());
        let entry = store.get_or_create("s1").await;
        let mut state = entry.state;
        state.intent = Some(TaskIntent::PlaceOrder);
        state.product_name = Some("laptop".to_string());
        store.save(state, entry.version).await.unwrap();

        let classifier = Arc::new(EvictingClassifier::new(
            store.clone(),
            "s1",
            json!({ "intent": "provide_info", "quantity": 3 }),
        ));
        let manager = manager_with(store.clone(), classifier, Arc::new(MockBackend::new()));

        let outcome = manager.handle_turn("s1", "three").await.unwrap();

        // The evicted laptop order is not resurrected
        assert_eq!(outcome.intent, None);
        assert_eq!(outcome.collected_data.product_name, None);
        assert_eq!(outcome.collected_data.quantity, Some(3));

        let stored = store.get("s1").await.unwrap().state;
        assert_eq!(stored.product_name, None);
        assert_eq!(stored.history.len(), 2);
        assert_eq!(stored.history[0].message, "three");
    }

    #[tokio::test]
    async fn test_concurrent_turns_on_one_session_are_serialized() {
        let h = harness_with(
            MockClassifier::with_delay(Duration::from_millis(20)),
            MockBackend::new(),
        );
        h.classifier
            .queue(json!({ "intent": "place_order", "product_name": "laptop" }))
            .queue(json!({ "intent": "provide_info", "quantity": 2 }));

        let (a, b) = tokio::join!(
            h.manager.handle_turn("s1", "I want a laptop"),
            h.manager.handle_turn("s1", "two"),
        );
        a.unwrap();
        b.unwrap();

        let stored = h.store.get("s1").await.unwrap().state;
        assert_eq!(stored.history.len(), 4);
        assert_eq!(stored.product_name.as_deref(), Some("laptop"));
        assert_eq!(stored.quantity, Some(2));
        assert!(stored.awaiting_confirmation);
    }

    #[tokio::test]
    async fn test_store_failure_leaves_no_new_session() {
        let store = Arc::new(FrozenStore::default());
        let classifier = Arc::new(MockClassifier::new());
        classifier.queue(json!({ "intent": "place_order", "product_name": "laptop" }));
        let manager = manager_with(store.clone(), classifier, Arc::new(MockBackend::new()));

        let err = manager.handle_turn("s1", "I want a laptop").await.unwrap_err();
        assert!(matches!(err, DialogError::Internal(_)));

        assert!(store.get("s1").await.is_none());
        assert_eq!(manager.active_sessions().await, 0);
    }

    #[tokio::test]
    async fn test_store_failure_keeps_existing_session() {
        let store = Arc::new(FrozenStore::default());
        let entry = store.inner.get_or_create("s1").await;
        let mut state = entry.state;
        state.push_turn(Role::User, "hello");
        store.inner.save(state, entry.version).await.unwrap();

        let classifier = Arc::new(MockClassifier::new());
        classifier.queue(json!({ "intent": "place_order", "product_name": "laptop" }));
        let manager = manager_with(store.clone(), classifier, Arc::new(MockBackend::new()));

        let err = manager.handle_turn("s1", "I want a laptop").await.unwrap_err();
        assert!(matches!(err, DialogError::Internal(_)));

        let stored = store.get("s1").await.unwrap().state;
        assert_eq!(stored.history.len(), 1);
        assert_eq!(stored.intent, None);
    }

    #[tokio::test]
    async fn test_session_edited_during_classification_rebases() {
        let store = Arc::new(InMemorySessionStore::new());
        let entry = store.get_or_create("s1").await;
        let mut state = entry.state;
        state.intent = Some(TaskIntent::PlaceOrder);
        state.product_name = Some("laptop".to_string());
        store.save(state, entry.version).await.unwrap();

        let classifier = Arc::new(EditingClassifier::new(
            store.clone(),
            "s1",
            "mouse",
            json!({ "intent": "provide_info", "quantity": 3 }),
        ));
        let manager = manager_with(store.clone(), classifier, Arc::new(MockBackend::new()));

        let outcome = manager.handle_turn("s1", "three").await.unwrap();

        // The concurrent edit wins over the snapshot taken before classifying
        assert_eq!(
            outcome.response,
            "Just to confirm: You want to order 3 mouse(s). Is that correct?"
        );
        assert_eq!(outcome.phase, DialogPhase::Confirming);

        let stored = store.get("s1").await.unwrap().state;
        assert_eq!(stored.product_name.as_deref(), Some("mouse"));
        assert_eq!(stored.quantity, Some(3));
        assert_eq!(stored.history.len(), 2);
        assert_eq!(stored.history[0].message, "three");
    }

    #[tokio::test]
    async fn test_abandoned_dispatch_runs_once() {
        let h = harness_with(
            MockClassifier::new(),
            MockBackend::with_delay(Duration::from_millis(200)),
        );
        h.classifier
            .queue(json!({ "intent": "place_order", "product_name": "laptop", "quantity": 2 }))
            .queue(json!({ "intent": "confirm" }))
            .queue(json!({ "intent": "confirm" }));
        h.backend.queue(json!({ "order_id": "ORD-42" }));

        h.manager.handle_turn("s1", "two laptops").await.unwrap();

        // The caller gives up while the backend is still working
        let abandoned =
            tokio::time::timeout(Duration::from_millis(50), h.manager.handle_turn("s1", "yes"))
                .await;
        assert!(abandoned.is_err());
        assert!(h.store.get("s1").await.is_none());

        // A retried confirmation waits for the first turn, then finds no order
        let retry = h.manager.handle_turn("s1", "yes").await.unwrap();
        assert_eq!(retry.response, "Is this information correct?");
        assert_eq!(retry.phase, DialogPhase::Confirming);
        assert_eq!(retry.collected_data.product_name, None);

        assert_eq!(h.backend.recorded_submissions().len(), 1);
        assert!(h.manager.turn_locks.lock().await.is_empty());
    }

    #[tokio::test]
    async fn test_sessions_are_independent() {
        let h = harness();
        h.classifier
            .queue(json!({ "intent": "place_order", "product_name": "laptop" }))
            .queue(json!({ "intent": "check_status" }));

        h.manager.handle_turn("a", "I want a laptop").await.unwrap();
        let b = h.manager.handle_turn("b", "where is my order").await.unwrap();

        assert_eq!(b.response, "What's your order ID? (e.g., #12345)");
        assert_eq!(
            h.store.get("a").await.unwrap().state.intent,
            Some(TaskIntent::PlaceOrder)
        );
        assert_eq!(h.manager.active_sessions().await, 2);
    }
}
