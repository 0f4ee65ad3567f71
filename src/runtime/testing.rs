//! Mock implementations for testing
//!
//! These mocks enable integration testing without real I/O.

use super::traits::*;
use super::RuntimeError;
use crate::action::DeliveryId;
use crate::cookie::ConversationState;
use crate::flow::UserContext;
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::Mutex;

// ============================================================================
// Mock Transport
// ============================================================================

/// Transport that records every delivery and returns sequential ids
#[derive(Default)]
pub struct RecordingTransport {
    /// Record of (recipient, body) pairs
    pub deliveries: Mutex<Vec<(String, String)>>,
    fail_with: Option<String>,
}

impl RecordingTransport {
    pub fn new() -> Self {
        Self::default()
    }

    /// Transport whose every delivery fails
    pub fn failing(message: impl Into<String>) -> Self {
        Self {
            deliveries: Mutex::new(Vec::new()),
            fail_with: Some(message.into()),
        }
    }

    pub fn recorded(&self) -> Vec<(String, String)> {
        self.deliveries.lock().unwrap().clone()
    }

    pub fn bodies(&self) -> Vec<String> {
        self.recorded().into_iter().map(|(_, body)| body).collect()
    }
}

#[async_trait]
impl Transport for RecordingTransport {
    async fn deliver(&self, recipient: &str, body: &str) -> Result<DeliveryId, String> {
        if let Some(message) = &self.fail_with {
            return Err(message.clone());
        }
        let mut deliveries = self.deliveries.lock().unwrap();
        deliveries.push((recipient.to_string(), body.to_string()));
        Ok(DeliveryId::Single(format!("SM{}", deliveries.len())))
    }
}

// ============================================================================
// Mock User Context
// ============================================================================

/// Fixed user contexts per sender
#[derive(Default)]
pub struct StaticUserContext {
    users: HashMap<String, UserContext>,
}

impl StaticUserContext {
    pub fn with_user(mut self, from: impl Into<String>, context: UserContext) -> Self {
        self.users.insert(from.into(), context);
        self
    }
}

#[async_trait]
impl UserContextProvider for StaticUserContext {
    async fn user_context(&self, from: &str) -> Result<UserContext, String> {
        self.users
            .get(from)
            .cloned()
            .ok_or_else(|| format!("Unknown user: {from}"))
    }
}

// ============================================================================
// Mock Hooks
// ============================================================================

/// Hooks that record what they were called with
#[derive(Default)]
pub struct RecordingHooks {
    pub ended: Mutex<Vec<ConversationState>>,
    pub errors: Mutex<Vec<String>>,
}

#[async_trait]
impl InteractionHooks for RecordingHooks {
    async fn on_interaction_end(&self, state: &ConversationState, _user_context: &UserContext) {
        self.ended.lock().unwrap().push(state.clone());
    }

    async fn on_error(&self, _from: &str, error: &RuntimeError) {
        self.errors.lock().unwrap().push(error.to_string());
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::action::{
        Action, ActionContext, ActionType, Answer, Question, QuestionOptions, QuestionType,
    };
    use crate::config::FlowConfig;
    use crate::controller::FlowController;
    use crate::flow::{async_resolver, resolver, Flow, FlowContext};
    use crate::runtime::{ConversationRuntime, MemoryStateStore, StateStore};
    use crate::schema::FlowSchema;
    use serde_json::json;
    use std::sync::Arc;

    const FROM: &str = "+15555550100";

    fn onboarding_flow() -> Flow {
        Flow::new()
            .with_action("welcome", resolver(|_, _| Action::reply("Welcome!").ok()))
            .unwrap()
            .with_action(
                "ask_name",
                resolver(|_, _| Question::text("What's your name?").ok().map(Action::from)),
            )
            .unwrap()
            .with_action(
                "thanks",
                resolver(|flow_context, _| {
                    let Some(ActionContext::Question {
                        answer: Some(Answer::Text(name)),
                        ..
                    }) = flow_context.get("ask_name")
                    else {
                        return None;
                    };
                    Action::reply(format!("Thanks, {name}!")).ok()
                }),
            )
            .unwrap()
    }

    fn runtime_for(
        controller: FlowController,
    ) -> (
        ConversationRuntime<Arc<MemoryStateStore>, Arc<RecordingTransport>>,
        Arc<MemoryStateStore>,
        Arc<RecordingTransport>,
        Arc<RecordingHooks>,
    ) {
        let store = Arc::new(MemoryStateStore::new());
        let transport = Arc::new(RecordingTransport::new());
        let hooks = Arc::new(RecordingHooks::default());
        let runtime = ConversationRuntime::new(
            Arc::new(controller),
            Arc::clone(&store),
            Arc::clone(&transport),
        )
        .with_hooks(Arc::clone(&hooks));
        (runtime, store, transport, hooks)
    }

    #[tokio::test]
    async fn test_recording_transport() {
        let transport = RecordingTransport::new();
        let id = transport.deliver(FROM, "hello").await.unwrap();
        assert_eq!(id, DeliveryId::Single("SM1".to_string()));
        assert_eq!(transport.recorded(), vec![(FROM.to_string(), "hello".to_string())]);

        let failing = RecordingTransport::failing("carrier down");
        assert_eq!(failing.deliver(FROM, "hello").await.unwrap_err(), "carrier down");
    }

    #[tokio::test]
    async fn test_conversation_over_two_turns() {
        let controller = FlowController::new(onboarding_flow(), None).unwrap();
        let (runtime, store, transport, hooks) = runtime_for(controller);

        let first = runtime.handle_message(FROM, "hi").await.unwrap();
        assert_eq!(transport.bodies(), vec!["Welcome!", "What's your name?"]);
        assert_eq!(first.actions.len(), 2);
        assert!(first.actions.iter().all(|a| a.delivery_id().is_some()));
        assert!(!first.is_complete());

        let saved = store.get(FROM).await.unwrap();
        assert_eq!(saved.flow_key, 1);
        assert!(saved.question.is_answering);

        let second = runtime.handle_message(FROM, "Sam").await.unwrap();
        assert!(second.is_complete());
        assert_eq!(
            transport.bodies(),
            vec!["Welcome!", "What's your name?", "Thanks, Sam!"]
        );
        assert_eq!(
            second
                .actions
                .iter()
                .map(Action::action_type)
                .collect::<Vec<_>>(),
            vec![ActionType::Question, ActionType::Reply]
        );

        assert!(store.is_empty().await);
        let ended = hooks.ended.lock().unwrap();
        assert_eq!(ended.len(), 1);
        assert_eq!(ended[0].interaction_id, saved.interaction_id);
    }

    #[tokio::test]
    async fn test_invalid_answer_sends_notice() {
        let root = Flow::new()
            .with_action(
                "pick",
                resolver(|_, _| {
                    let options = QuestionOptions::new()
                        .with_type(QuestionType::MultipleChoice)
                        .with_choice(|answer: &str| answer == "1")
                        .with_choice(|answer: &str| answer == "2")
                        .with_invalid_answer_text("Reply 1 or 2.")
                        .with_max_retries(2);
                    Question::new("Pick 1 or 2", options).ok().map(Action::from)
                }),
            )
            .unwrap();
        let controller = FlowController::new(root, None).unwrap();
        let (runtime, store, transport, _hooks) = runtime_for(controller);

        runtime.handle_message(FROM, "hi").await.unwrap();
        runtime.handle_message(FROM, "3").await.unwrap();
        assert_eq!(transport.bodies()[1], "Reply 1 or 2.\nPick 1 or 2");
        assert_eq!(store.get(FROM).await.unwrap().question.attempts, vec!["3"]);

        let last = runtime.handle_message(FROM, "2").await.unwrap();
        assert!(last.is_complete());
        assert_eq!(
            last.state.action_context(crate::schema::ROOT_FLOW_KEY, "pick"),
            Some(&ActionContext::Question {
                body: "Pick 1 or 2".to_string(),
                question_type: QuestionType::MultipleChoice,
                answer: Some(Answer::Choice(1)),
                was_answered: true,
                was_failed: false,
            })
        );
    }

    #[tokio::test]
    async fn test_exit_keyword_ends_conversation() {
        let config = FlowConfig {
            exit_text: Some("You have been unsubscribed.".to_string()),
            ..FlowConfig::default()
        };
        let controller =
            config.configure_controller(FlowController::new(onboarding_flow(), None).unwrap());
        let (runtime, store, transport, hooks) = runtime_for(controller);

        runtime.handle_message(FROM, "hi").await.unwrap();
        let outcome = runtime.handle_message(FROM, "Stop").await.unwrap();

        assert!(outcome.is_complete());
        assert_eq!(outcome.actions[0].action_type(), ActionType::Exit);
        assert_eq!(
            transport.bodies().last().map(String::as_str),
            Some("You have been unsubscribed.")
        );
        assert!(store.is_empty().await);
        assert_eq!(hooks.ended.lock().unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_from_config_installs_exit_and_cap() {
        let config = FlowConfig {
            exit_keywords: vec!["optout".to_string()],
            exit_text: Some("Bye.".to_string()),
            max_actions_per_turn: 1,
            ..FlowConfig::default()
        };
        let transport = Arc::new(RecordingTransport::new());
        let runtime = ConversationRuntime::from_config(
            FlowController::new(onboarding_flow(), None).unwrap(),
            MemoryStateStore::new(),
            Arc::clone(&transport),
            &config,
        );

        let first = runtime.handle_message(FROM, "hi").await.unwrap();
        assert_eq!(first.actions.len(), 1);

        let second = runtime.handle_message(FROM, "OptOut").await.unwrap();
        assert!(second.is_complete());
        assert_eq!(transport.bodies(), vec!["Welcome!", "Bye."]);
    }

    #[tokio::test]
    async fn test_turn_locks_released_after_completion() {
        let root = Flow::new()
            .with_action("greet", resolver(|_, _| Action::reply("Hello").ok()))
            .unwrap();
        let controller = FlowController::new(root, None).unwrap();
        let (runtime, store, _transport, _hooks) = runtime_for(controller);

        for n in 0..100 {
            let outcome = runtime
                .handle_message(&format!("+1555555{n:04}"), "hi")
                .await
                .unwrap();
            assert!(outcome.is_complete());
        }

        assert!(store.is_empty().await);
        assert_eq!(runtime.turn_lock_count().await, 0);
    }

    #[tokio::test]
    async fn test_turn_lock_kept_while_conversation_open() {
        let controller = FlowController::new(onboarding_flow(), None).unwrap();
        let (runtime, _store, _transport, _hooks) = runtime_for(controller);

        runtime.handle_message(FROM, "hi").await.unwrap();
        assert_eq!(runtime.turn_lock_count().await, 1);

        runtime.handle_message(FROM, "Sam").await.unwrap();
        assert_eq!(runtime.turn_lock_count().await, 0);
    }

    #[tokio::test]
    async fn test_trigger_chains_into_target_flow() {
        let root = Flow::new()
            .with_action("route", resolver(|_, _| Action::trigger("support.contact").ok()))
            .unwrap();
        let support = FlowSchema::new()
            .with(
                "contact",
                Flow::new()
                    .with_action(
                        "notify",
                        resolver(|_, _| Action::message("+15555550999", "New support request").ok()),
                    )
                    .unwrap()
                    .with_action("ack", resolver(|_, _| Action::reply("An agent will text you.").ok()))
                    .unwrap(),
            )
            .unwrap();
        let schema = FlowSchema::new().with("support", support).unwrap();
        let controller = FlowController::new(root, Some(&schema)).unwrap();
        let (runtime, _store, transport, _hooks) = runtime_for(controller);

        let outcome = runtime.handle_message(FROM, "help").await.unwrap();

        assert!(outcome.is_complete());
        assert_eq!(
            transport.recorded(),
            vec![
                ("+15555550999".to_string(), "New support request".to_string()),
                (FROM.to_string(), "An agent will text you.".to_string()),
            ]
        );
        assert_eq!(outcome.state.flow.as_deref(), Some("support.contact"));
    }

    #[tokio::test]
    async fn test_action_limit_saves_progress() {
        let mut root = Flow::new();
        for index in 0..5 {
            root.add_action(
                format!("step_{index}"),
                resolver(move |_, _| Action::reply(format!("step {index}")).ok()),
            )
            .unwrap();
        }
        let controller = FlowController::new(root, None).unwrap();
        let (runtime, store, transport, _hooks) = runtime_for(controller);
        let runtime = runtime.with_max_actions_per_turn(2);

        let outcome = runtime.handle_message(FROM, "go").await.unwrap();

        assert_eq!(outcome.actions.len(), 2);
        assert_eq!(transport.bodies(), vec!["step 0", "step 1"]);
        assert_eq!(store.get(FROM).await.unwrap().flow_key, 2);
    }

    #[tokio::test]
    async fn test_transport_failure_reports_and_keeps_state() {
        let controller = FlowController::new(onboarding_flow(), None).unwrap();
        let store = Arc::new(MemoryStateStore::new());
        let hooks = Arc::new(RecordingHooks::default());
        let runtime = ConversationRuntime::new(
            Arc::new(controller),
            Arc::clone(&store),
            RecordingTransport::failing("carrier down"),
        )
        .with_hooks(Arc::clone(&hooks));

        let err = runtime.handle_message(FROM, "hi").await.unwrap_err();

        assert!(matches!(err, RuntimeError::Transport(ref message) if message == "carrier down"));
        assert_eq!(
            hooks.errors.lock().unwrap().as_slice(),
            ["Transport error: carrier down".to_string()]
        );
        assert!(store.is_empty().await);
    }

    #[tokio::test]
    async fn test_resolution_error_surfaces() {
        let controller = FlowController::new(onboarding_flow(), None).unwrap();
        let (runtime, store, _transport, hooks) = runtime_for(controller);
        let mut state = ConversationState::new(FROM);
        state.flow = Some("missing".to_string());
        store.save_state(&state).await.unwrap();

        let err = runtime.handle_message(FROM, "hi").await.unwrap_err();

        assert!(matches!(err, RuntimeError::Resolution(_)));
        assert_eq!(hooks.errors.lock().unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_user_context_reaches_resolvers() {
        let root = Flow::new()
            .with_action(
                "greet",
                async_resolver(|_: FlowContext, user: UserContext| async move {
                    let name = user.get("name")?.as_str()?.to_string();
                    Action::reply(format!("Hello {name}")).ok()
                }),
            )
            .unwrap();
        let controller = FlowController::new(root, None).unwrap();
        let (runtime, _store, transport, _hooks) = runtime_for(controller);
        let runtime = runtime
            .with_user_contexts(StaticUserContext::default().with_user(FROM, json!({ "name": "Ana" })));

        runtime.handle_message(FROM, "hi").await.unwrap();
        assert_eq!(transport.bodies(), vec!["Hello Ana"]);

        let err = runtime.handle_message("+15555550000", "hi").await.unwrap_err();
        assert!(matches!(err, RuntimeError::UserContext(_)));
    }

    #[tokio::test]
    async fn test_completed_state_starts_new_interaction() {
        let root = Flow::new()
            .with_action("greet", resolver(|_, _| Action::reply("Hello").ok()))
            .unwrap();
        let controller = FlowController::new(root, None).unwrap();
        let (runtime, store, transport, _hooks) = runtime_for(controller);
        let mut stale = ConversationState::new(FROM);
        stale.is_complete = true;
        store.save_state(&stale).await.unwrap();

        let outcome = runtime.handle_message(FROM, "hi").await.unwrap();

        assert_ne!(outcome.state.interaction_id, stale.interaction_id);
        assert_eq!(transport.bodies(), vec!["Hello"]);
    }

    #[tokio::test]
    async fn test_turns_for_one_sender_are_serialized() {
        let mut root = Flow::new();
        for index in 0..3 {
            root.add_action(
                format!("step_{index}"),
                async_resolver(move |_: FlowContext, _: UserContext| async move {
                    tokio::task::yield_now().await;
                    Action::reply(format!("step {index}")).ok()
                }),
            )
            .unwrap();
        }
        let controller = FlowController::new(root, None).unwrap();
        let (runtime, store, transport, _hooks) = runtime_for(controller);
        let runtime = runtime.with_max_actions_per_turn(1);

        let (a, b) = tokio::join!(
            runtime.handle_message(FROM, "one"),
            runtime.handle_message(FROM, "two")
        );
        a.unwrap();
        b.unwrap();

        assert_eq!(transport.bodies(), vec!["step 0", "step 1"]);
        assert_eq!(store.get(FROM).await.unwrap().flow_key, 2);
    }
}
