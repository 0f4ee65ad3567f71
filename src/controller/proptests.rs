//! Property-based tests for the flow controller
//!
//! These tests verify key invariants hold across generated flows and inputs.

use super::*;
use crate::action::{Question, QuestionOptions, MAX_RETRIES};
use crate::flow::{resolver, ActionResolver, FlowContext};
use crate::schema::FlowSchema;
use proptest::prelude::*;
use serde_json::Value;

// ============================================================================
// Test Helpers
// ============================================================================

#[derive(Debug, Clone, Copy)]
enum Step {
    Reply,
    Message,
    Question { max_retries: u32 },
    Trigger,
}

fn step_resolver(step: Step) -> Box<dyn Fn(&FlowContext, &UserContext) -> Option<Action> + Send + Sync> {
    match step {
        Step::Reply => Box::new(|_: &FlowContext, _: &UserContext| Action::reply("ok").ok()),
        Step::Message => Box::new(|_: &FlowContext, _: &UserContext| {
            Action::message("+15555550199", "fyi").ok()
        }),
        Step::Question { max_retries } => Box::new(move |_: &FlowContext, _: &UserContext| {
            Question::new(
                "Say yes",
                QuestionOptions::new()
                    .with_validator(|answer: &str| answer == "yes")
                    .with_max_retries(max_retries),
            )
            .ok()
            .map(Action::from)
        }),
        Step::Trigger => Box::new(|_: &FlowContext, _: &UserContext| Action::trigger("side").ok()),
    }
}

fn build_flow(steps: &[Step]) -> Flow {
    let mut flow = Flow::new();
    for (index, step) in steps.iter().enumerate() {
        flow.add_action(format!("step_{index}"), step_resolver(*step))
            .expect("unique names");
    }
    flow
}

fn controller_for(steps: &[Step]) -> FlowController {
    let side = Flow::new()
        .with_action("side_reply", resolver(|_, _| Action::reply("side").ok()))
        .expect("valid flow");
    let schema = FlowSchema::new().with("side", side).expect("valid schema");
    FlowController::new(build_flow(steps), Some(&schema)).expect("valid controller")
}

fn runtime() -> tokio::runtime::Runtime {
    tokio::runtime::Builder::new_current_thread()
        .build()
        .expect("runtime")
}

fn wrong_answer_controller(max_retries: u32) -> FlowController {
    let root = Flow::new()
        .with_action(
            "ask",
            resolver(move |_, _| {
                Question::new(
                    "Say yes",
                    QuestionOptions::new()
                        .with_validator(|answer: &str| answer == "yes")
                        .with_max_retries(max_retries),
                )
                .ok()
                .map(Action::from)
            }),
        )
        .expect("valid flow")
        .with_action("after", resolver(|_, _| Action::reply("after").ok()))
        .expect("valid flow");
    FlowController::new(root, None).expect("valid controller")
}

// ============================================================================
// Arbitrary Generators
// ============================================================================

fn arb_step() -> impl Strategy<Value = Step> {
    prop_oneof![
        Just(Step::Reply),
        Just(Step::Message),
        (0u32..3).prop_map(|max_retries| Step::Question { max_retries }),
        Just(Step::Trigger),
    ]
}

fn arb_message() -> impl Strategy<Value = String> {
    prop_oneof![Just("yes".to_string()), "[a-z]{1,8}"]
}

// ============================================================================
// Property Tests
// ============================================================================

proptest! {
    #![proptest_config(ProptestConfig::with_cases(256))]

    // Selection past the end of a flow is always None
    #[test]
    fn prop_out_of_range_selection_is_none(len in 1usize..6, extra in 0usize..50) {
        let flow = build_flow(&vec![Step::Reply; len]);
        let index = len + extra;
        prop_assert!(flow.select_action_resolver(index).is_none());
        prop_assert!(flow.select_action_name(index).is_none());
        prop_assert!(flow.select_action_name(len - 1).is_some());
    }

    // flow_key never decreases except through a trigger, which resets it to 0
    #[test]
    fn prop_flow_key_monotonic(
        steps in proptest::collection::vec(arb_step(), 1..6),
        messages in proptest::collection::vec(arb_message(), 1..20),
    ) {
        let controller = controller_for(&steps);
        let rt = runtime();
        let mut state = ConversationState::new("+15555550100");

        for message in messages {
            let action = rt
                .block_on(controller.resolve_action_from_state(&message, &state, &Value::Null))
                .expect("resolution succeeds");
            let next = controller
                .resolve_next_state_from_action(&message, &state, action.as_ref())
                .expect("next state succeeds");

            match action.as_ref().map(Action::action_type) {
                Some(crate::action::ActionType::Trigger) => {
                    prop_assert_eq!(next.flow_key, 0);
                    prop_assert_eq!(next.flow.as_deref(), Some("side"));
                }
                _ => prop_assert!(next.flow_key >= state.flow_key),
            }

            if next.is_complete {
                break;
            }
            state = next;
        }
    }

    // With max_retries = N the (N+1)th wrong answer fails the question
    #[test]
    fn prop_retry_boundary(max_retries in 0u32..=MAX_RETRIES) {
        let controller = wrong_answer_controller(max_retries);
        let rt = runtime();

        let mut state = ConversationState::new("+15555550100");
        let prompt = rt
            .block_on(controller.resolve_action_from_state("hello", &state, &Value::Null))
            .expect("resolves");
        state = controller
            .resolve_next_state_from_action("hello", &state, prompt.as_ref())
            .expect("next state");

        let mut wrong_answers = 0u32;
        loop {
            let action = rt
                .block_on(controller.resolve_action_from_state("no", &state, &Value::Null))
                .expect("resolves")
                .expect("question is still active");
            wrong_answers += 1;
            let question = action.as_question().expect("question");
            if question.was_failed() {
                break;
            }
            prop_assert!(wrong_answers <= max_retries);
            state = controller
                .resolve_next_state_from_action("no", &state, Some(&action))
                .expect("next state");
        }

        prop_assert_eq!(wrong_answers, max_retries + 1);
    }

    // Resolving the same state twice gives the same context
    #[test]
    fn prop_resolution_idempotent(
        steps in proptest::collection::vec(arb_step(), 1..6),
        flow_key in 0usize..6,
        is_answering in any::<bool>(),
        message in arb_message(),
    ) {
        let controller = controller_for(&steps);
        let rt = runtime();
        let mut state = ConversationState::new("+15555550100");
        state.flow_key = flow_key;
        state.question.is_answering = is_answering;

        let first = rt
            .block_on(controller.resolve_action_from_state(&message, &state, &Value::Null))
            .expect("resolves");
        let second = rt
            .block_on(controller.resolve_action_from_state(&message, &state, &Value::Null))
            .expect("resolves");

        prop_assert_eq!(first.as_ref().map(Action::context), second.as_ref().map(Action::context));
        prop_assert_eq!(
            first.as_ref().and_then(|a| a.name().map(String::from)),
            second.as_ref().and_then(|a| a.name().map(String::from))
        );
    }

    // An empty flow is rejected at any depth
    #[test]
    fn prop_empty_flow_rejected_at_any_depth(depth in 0usize..6) {
        let mut node = FlowSchema::new().with("leaf", Flow::new()).expect("schema");
        for level in 0..depth {
            node = FlowSchema::new().with(format!("level{level}"), node).expect("schema");
        }
        let result = FlowController::new(build_flow(&[Step::Reply]), Some(&node));
        prop_assert!(matches!(result, Err(ConfigError::EmptyFlow { .. })), "{:?}", result.err());
    }
}

#[test]
fn resolver_boxes_are_resolvers() {
    fn assert_resolver<R: ActionResolver>(_: &R) {}
    assert_resolver(&step_resolver(Step::Reply));
}
