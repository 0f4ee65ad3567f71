//! Conversation turn executor

use super::traits::{InteractionHooks, LoggingHooks, NoUserContext, StateStore, Transport, UserContextProvider};
use super::RuntimeError;
use crate::action::Action;
use crate::config::FlowConfig;
use crate::controller::FlowController;
use crate::cookie::ConversationState;
use crate::flow::UserContext;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::{Mutex, RwLock};

/// Default cap on actions resolved for a single inbound message
pub const DEFAULT_MAX_ACTIONS_PER_TURN: usize = 10;

/// Result of handling one inbound message
#[derive(Debug)]
pub struct TurnOutcome {
    /// Actions that ran this turn, with delivery ids recorded
    pub actions: Vec<Action>,
    /// State after the turn. Already cleared from the store when complete.
    pub state: ConversationState,
}

impl TurnOutcome {
    pub fn is_complete(&self) -> bool {
        self.state.is_complete
    }
}

/// Runs conversation turns against any store and transport
pub struct ConversationRuntime<S, T>
where
    S: StateStore,
    T: Transport,
{
    controller: Arc<FlowController>,
    store: S,
    transport: T,
    user_contexts: Arc<dyn UserContextProvider>,
    hooks: Arc<dyn InteractionHooks>,
    max_actions_per_turn: usize,
    /// One lock per sender so turns of a conversation never overlap
    turn_locks: RwLock<HashMap<String, Arc<Mutex<()>>>>,
}

impl<S, T> ConversationRuntime<S, T>
where
    S: StateStore,
    T: Transport,
{
    pub fn new(controller: Arc<FlowController>, store: S, transport: T) -> Self {
        Self {
            controller,
            store,
            transport,
            user_contexts: Arc::new(NoUserContext),
            hooks: Arc::new(LoggingHooks),
            max_actions_per_turn: DEFAULT_MAX_ACTIONS_PER_TURN,
            turn_locks: RwLock::new(HashMap::new()),
        }
    }

    #[must_use]
    pub fn with_user_contexts(mut self, provider: impl UserContextProvider + 'static) -> Self {
        self.user_contexts = Arc::new(provider);
        self
    }

    #[must_use]
    pub fn with_hooks(mut self, hooks: impl InteractionHooks + 'static) -> Self {
        self.hooks = Arc::new(hooks);
        self
    }

    #[must_use]
    pub fn with_max_actions_per_turn(mut self, max_actions: usize) -> Self {
        self.max_actions_per_turn = max_actions.max(1);
        self
    }

    /// Build a runtime with every setting in `config` applied: the exit
    /// keywords and exit text on the controller, the action cap on the runtime
    pub fn from_config(controller: FlowController, store: S, transport: T, config: &FlowConfig) -> Self {
        Self::new(Arc::new(config.configure_controller(controller)), store, transport).with_config(config)
    }

    /// Apply the runtime-side settings of `config`.
    ///
    /// The controller is already shared at this point, so exit keywords and
    /// exit text are not installed here. Use [`ConversationRuntime::from_config`]
    /// or [`FlowConfig::configure_controller`] for those.
    #[must_use]
    pub fn with_config(self, config: &FlowConfig) -> Self {
        self.with_max_actions_per_turn(config.max_actions_per_turn)
    }

    pub fn controller(&self) -> &FlowController {
        &self.controller
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    pub fn transport(&self) -> &T {
        &self.transport
    }

    /// Handle one inbound message from `from`.
    ///
    /// Turns for the same sender are serialized; different senders run
    /// independently.
    ///
    /// # Errors
    ///
    /// Any store, transport, user context or resolution failure. The state is
    /// left as it was before the turn and the error is also passed to
    /// [`InteractionHooks::on_error`].
    pub async fn handle_message(&self, from: &str, body: &str) -> Result<TurnOutcome, RuntimeError> {
        let lock = self.turn_lock(from).await;
        let result = {
            let _guard = lock.lock().await;
            let result = self.run_turn(from, body).await;
            if let Err(e) = &result {
                self.hooks.on_error(from, e).await;
            }
            result
        };

        if matches!(&result, Ok(outcome) if outcome.is_complete()) {
            self.release_turn_lock(from, &lock).await;
        }
        result
    }

    async fn run_turn(&self, from: &str, body: &str) -> Result<TurnOutcome, RuntimeError> {
        let mut state = match self.store.load_state(from).await.map_err(RuntimeError::Store)? {
            Some(state) if !state.is_complete => state,
            _ => {
                let state = ConversationState::new(from);
                tracing::info!(from = %from, interaction_id = %state.interaction_id, "Starting conversation");
                state
            }
        };

        let user_context = self
            .user_contexts
            .user_context(from)
            .await
            .map_err(RuntimeError::UserContext)?;

        let mut actions = Vec::new();
        let mut steps = 0;
        loop {
            steps += 1;
            let mut action = self
                .controller
                .resolve_action_from_state(body, &state, &user_context)
                .await?;

            if let Some(action) = action.as_mut() {
                self.deliver(from, action).await?;
            }

            state = self
                .controller
                .resolve_next_state_from_action(body, &state, action.as_ref())?;
            let produced = action.is_some();
            actions.extend(action);

            // Keep going while nothing waits on the sender
            if !produced || state.is_complete || state.question.is_answering {
                break;
            }
            if steps >= self.max_actions_per_turn {
                tracing::warn!(
                    from = %from,
                    interaction_id = %state.interaction_id,
                    limit = self.max_actions_per_turn,
                    "Action limit reached for turn"
                );
                break;
            }
        }

        self.finish_turn(&state, &user_context).await?;

        tracing::info!(
            from = %from,
            interaction_id = %state.interaction_id,
            actions = actions.len(),
            flow = %state.flow_path(),
            flow_key = state.flow_key,
            complete = state.is_complete,
            "Turn handled"
        );

        Ok(TurnOutcome { actions, state })
    }

    async fn deliver(&self, from: &str, action: &mut Action) -> Result<(), RuntimeError> {
        let Some(outbound) = action.outbound() else {
            return Ok(());
        };
        let recipient = outbound.to.as_deref().unwrap_or(from);
        let delivery_id = self
            .transport
            .deliver(recipient, &outbound.body)
            .await
            .map_err(RuntimeError::Transport)?;
        tracing::debug!(
            to = %recipient,
            action = action.name().unwrap_or_default(),
            delivery_id = ?delivery_id,
            "Delivered action"
        );
        action.record_delivery(delivery_id);
        Ok(())
    }

    async fn finish_turn(
        &self,
        state: &ConversationState,
        user_context: &UserContext,
    ) -> Result<(), RuntimeError> {
        if state.is_complete {
            self.hooks.on_interaction_end(state, user_context).await;
            self.store
                .clear_state(&state.from)
                .await
                .map_err(RuntimeError::Store)
        } else {
            self.store.save_state(state).await.map_err(RuntimeError::Store)
        }
    }

    async fn turn_lock(&self, from: &str) -> Arc<Mutex<()>> {
        {
            let locks = self.turn_locks.read().await;
            if let Some(lock) = locks.get(from) {
                return Arc::clone(lock);
            }
        }
        let mut locks = self.turn_locks.write().await;
        Arc::clone(locks.entry(from.to_string()).or_default())
    }

    /// Drop the sender's lock once its conversation is over, unless another
    /// turn for the same sender already holds a handle to it
    async fn release_turn_lock(&self, from: &str, lock: &Arc<Mutex<()>>) {
        let mut locks = self.turn_locks.write().await;
        let idle = locks
            .get(from)
            .is_some_and(|held| Arc::ptr_eq(held, lock) && Arc::strong_count(lock) == 2);
        if idle {
            locks.remove(from);
        }
    }

    #[cfg(test)]
    pub(crate) async fn turn_lock_count(&self) -> usize {
        self.turn_locks.read().await.len()
    }
}
