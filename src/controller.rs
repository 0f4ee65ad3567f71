//! Flow controller
//!
//! Walks the evaluated schema one action at a time through two functions:
//! [`FlowController::resolve_action_from_state`] decides what runs next and
//! [`FlowController::resolve_next_state_from_action`] computes the state that
//! results once it ran. Neither mutates the state it is given.

#[cfg(test)]
mod proptests;

use crate::action::{Action, ActionKind, Exit};
use crate::cookie::{ConversationState, QuestionState};
use crate::error::{ConfigError, ResolutionError};
use crate::flow::{Flow, UserContext};
use crate::schema::{evaluate_schema, EvaluatedSchema, FlowSchema};
use async_trait::async_trait;
use std::collections::HashSet;
use std::future::Future;
use std::sync::Arc;

/// Name given to exits synthesized from an exit keyword
pub const EXIT_ACTION_NAME: &str = "__exit__";

pub const DEFAULT_EXIT_KEYWORDS: &[&str] = &["stop", "cancel", "end", "quit", "unsubscribe"];

/// Decides whether an inbound message ends the conversation
#[async_trait]
pub trait ExitTest: Send + Sync {
    async fn is_exit(&self, message_body: &str) -> bool;
}

#[async_trait]
impl<F> ExitTest for F
where
    F: Fn(&str) -> bool + Send + Sync,
{
    async fn is_exit(&self, message_body: &str) -> bool {
        self(message_body)
    }
}

/// Adapter for exit predicates that need to await something
pub struct AsyncExitTest<F>(F);

/// Wrap an async closure as an [`ExitTest`]
pub fn async_exit_test<F, Fut>(f: F) -> AsyncExitTest<F>
where
    F: Fn(String) -> Fut + Send + Sync,
    Fut: Future<Output = bool> + Send + 'static,
{
    AsyncExitTest(f)
}

#[async_trait]
impl<F, Fut> ExitTest for AsyncExitTest<F>
where
    F: Fn(String) -> Fut + Send + Sync,
    Fut: Future<Output = bool> + Send + 'static,
{
    async fn is_exit(&self, message_body: &str) -> bool {
        (self.0)(message_body.to_string()).await
    }
}

/// Case-insensitive match of the whole (trimmed) message against a keyword set
#[derive(Debug, Clone)]
pub struct ExitKeywords {
    keywords: HashSet<String>,
}

impl ExitKeywords {
    pub fn new<S: AsRef<str>>(keywords: impl IntoIterator<Item = S>) -> Self {
        Self {
            keywords: keywords
                .into_iter()
                .map(|keyword| keyword.as_ref().trim().to_lowercase())
                .filter(|keyword| !keyword.is_empty())
                .collect(),
        }
    }

    pub fn matches(&self, message_body: &str) -> bool {
        self.keywords.contains(&message_body.trim().to_lowercase())
    }
}

impl Default for ExitKeywords {
    fn default() -> Self {
        Self::new(DEFAULT_EXIT_KEYWORDS)
    }
}

#[async_trait]
impl ExitTest for ExitKeywords {
    async fn is_exit(&self, message_body: &str) -> bool {
        self.matches(message_body)
    }
}

/// Resolves actions and next states over a root flow and optional schema
pub struct FlowController {
    root: Arc<Flow>,
    flows: EvaluatedSchema,
    has_schema: bool,
    exit_test: Option<Arc<dyn ExitTest>>,
    exit_text: Option<String>,
}

impl FlowController {
    /// Validate `root` and evaluate `schema` up front
    ///
    /// # Errors
    ///
    /// [`ConfigError::EmptyFlow`] for an empty root or schema flow, and the
    /// schema errors raised by [`evaluate_schema`].
    pub fn new(root: impl Into<Arc<Flow>>, schema: Option<&FlowSchema>) -> Result<Self, ConfigError> {
        let root = root.into();
        let flows = match schema {
            Some(schema) => evaluate_schema(Arc::clone(&root), schema)?,
            None => EvaluatedSchema::root_only(Arc::clone(&root))?,
        };
        Ok(Self {
            root,
            flows,
            has_schema: schema.is_some(),
            exit_test: None,
            exit_text: None,
        })
    }

    /// Check every inbound message with `test` before normal resolution
    #[must_use]
    pub fn with_exit_test(mut self, test: impl ExitTest + 'static) -> Self {
        self.exit_test = Some(Arc::new(test));
        self
    }

    /// Reply sent when an exit test matches
    #[must_use]
    pub fn with_exit_text(mut self, text: impl Into<String>) -> Self {
        self.exit_text = Some(text.into());
        self
    }

    pub fn flows(&self) -> &EvaluatedSchema {
        &self.flows
    }

    /// Decide which action runs for `message_body`.
    ///
    /// `Ok(None)` means there is nothing to do: the conversation is complete,
    /// the active flow is exhausted, or the resolver produced no action.
    pub async fn resolve_action_from_state(
        &self,
        message_body: &str,
        state: &ConversationState,
        user_context: &UserContext,
    ) -> Result<Option<Action>, ResolutionError> {
        if state.is_complete {
            tracing::debug!(interaction_id = %state.interaction_id, "Conversation already complete");
            return Ok(None);
        }

        if let Some(exit_test) = &self.exit_test {
            if exit_test.is_exit(message_body).await {
                tracing::debug!(interaction_id = %state.interaction_id, "Exit requested");
                let mut exit = Exit::new(message_body);
                if let Some(text) = &self.exit_text {
                    exit = exit.with_reply(text.as_str());
                }
                let mut action = Action::from(exit);
                action.set_name(EXIT_ACTION_NAME);
                return Ok(Some(action));
            }
        }

        let flow = self.active_flow(state)?;
        let Some(resolver) = flow.select_action_resolver(state.flow_key) else {
            tracing::debug!(
                flow = %state.flow_path(),
                flow_key = state.flow_key,
                "Flow exhausted"
            );
            return Ok(None);
        };

        let Some(mut action) = resolver.resolve(&state.flow_context(), user_context).await else {
            tracing::warn!(
                flow = %state.flow_path(),
                flow_key = state.flow_key,
                "Resolver produced no action"
            );
            return Ok(None);
        };

        if let Some(name) = flow.select_action_name(state.flow_key) {
            action.set_name(name);
        }

        if state.question.is_answering {
            if let Some(question) = action.question_mut() {
                question.evaluate(message_body, state).await;
            }
        }

        tracing::debug!(
            flow = %state.flow_path(),
            flow_key = state.flow_key,
            action = action.name().unwrap_or_default(),
            action_type = %action.action_type(),
            "Resolved action"
        );
        Ok(Some(action))
    }

    /// Compute the state that results from `action` having run.
    ///
    /// `None` (no action) completes the conversation.
    ///
    /// # Errors
    ///
    /// A trigger without a schema or to an unknown flow, or a state whose flow
    /// is not in the schema.
    pub fn resolve_next_state_from_action(
        &self,
        message_body: &str,
        state: &ConversationState,
        action: Option<&Action>,
    ) -> Result<ConversationState, ResolutionError> {
        let mut next = state.clone();
        let Some(action) = action else {
            next.is_complete = true;
            return Ok(next);
        };

        let name = action
            .name()
            .unwrap_or_else(|| action.action_type().as_str())
            .to_string();

        match action.kind() {
            ActionKind::Exit(_) => {
                next.record_context(&name, action.context());
                next.is_complete = true;
            }
            ActionKind::Question(question) => {
                if question.was_evaluated() {
                    next.question.attempts.push(message_body.to_string());
                }
                next.record_context(&name, action.context());

                if question.was_answered() || (question.was_failed() && question.continues_on_failure()) {
                    self.advance(&mut next)?;
                } else if question.was_failed() {
                    // Attempts stay on the final state
                    next.question.is_answering = false;
                    next.is_complete = true;
                } else {
                    next.question.is_answering = true;
                }
            }
            ActionKind::Trigger(trigger) => {
                let target = trigger.flow_name();
                if !self.has_schema {
                    return Err(ResolutionError::NoSchema(target.to_string()));
                }
                if !self.flows.contains(target) {
                    return Err(ResolutionError::FlowNotFound(target.to_string()));
                }
                next.record_context(&name, action.context());
                next.flow = Some(target.to_string());
                next.flow_key = 0;
                next.question = QuestionState::default();
            }
            ActionKind::Reply(_) | ActionKind::Message(_) => {
                next.record_context(&name, action.context());
                self.advance(&mut next)?;
            }
        }

        tracing::debug!(
            flow = %next.flow_path(),
            flow_key = next.flow_key,
            is_answering = next.question.is_answering,
            is_complete = next.is_complete,
            "Resolved next state"
        );
        Ok(next)
    }

    fn active_flow(&self, state: &ConversationState) -> Result<&Arc<Flow>, ResolutionError> {
        match state.flow.as_deref() {
            None => Ok(&self.root),
            Some(path) => self
                .flows
                .get(path)
                .ok_or_else(|| ResolutionError::InvalidFlowName(path.to_string())),
        }
    }

    fn advance(&self, next: &mut ConversationState) -> Result<(), ResolutionError> {
        let flow_len = self.active_flow(next)?.len();
        next.flow_key += 1;
        next.question = QuestionState::default();
        if next.flow_key >= flow_len {
            next.is_complete = true;
        }
        Ok(())
    }
}
