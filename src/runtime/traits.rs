//! Trait abstractions for runtime I/O
//!
//! These traits enable testing the runtime with mock implementations.

use super::RuntimeError;
use crate::action::DeliveryId;
use crate::cookie::ConversationState;
use crate::flow::UserContext;
use async_trait::async_trait;
use std::sync::Arc;

/// Outbound messaging client
#[async_trait]
pub trait Transport: Send + Sync {
    /// Send `body` to `recipient`, returning the transport's message id(s)
    async fn deliver(&self, recipient: &str, body: &str) -> Result<DeliveryId, String>;
}

/// Storage for conversation state documents, keyed by sender
#[async_trait]
pub trait StateStore: Send + Sync {
    async fn load_state(&self, from: &str) -> Result<Option<ConversationState>, String>;

    async fn save_state(&self, state: &ConversationState) -> Result<(), String>;

    /// Remove the state of a finished conversation
    async fn clear_state(&self, from: &str) -> Result<(), String>;
}

/// Supplies the user context passed to flow resolvers
#[async_trait]
pub trait UserContextProvider: Send + Sync {
    async fn user_context(&self, from: &str) -> Result<UserContext, String>;
}

/// Callbacks around the conversation lifecycle
#[async_trait]
pub trait InteractionHooks: Send + Sync {
    /// Called once with the final state when a conversation completes
    async fn on_interaction_end(&self, _state: &ConversationState, _user_context: &UserContext) {}

    /// Called when a turn fails
    async fn on_error(&self, _from: &str, _error: &RuntimeError) {}
}

/// Provider for deployments without per-user data
#[derive(Debug, Clone, Copy, Default)]
pub struct NoUserContext;

#[async_trait]
impl UserContextProvider for NoUserContext {
    async fn user_context(&self, _from: &str) -> Result<UserContext, String> {
        Ok(UserContext::Null)
    }
}

/// Hooks that only log
#[derive(Debug, Clone, Copy, Default)]
pub struct LoggingHooks;

#[async_trait]
impl InteractionHooks for LoggingHooks {
    async fn on_interaction_end(&self, state: &ConversationState, _user_context: &UserContext) {
        tracing::info!(
            from = %state.from,
            interaction_id = %state.interaction_id,
            "Interaction ended"
        );
    }

    async fn on_error(&self, from: &str, error: &RuntimeError) {
        tracing::error!(from = %from, error = %error, "Turn failed");
    }
}

// ============================================================================
// Arc implementations for trait objects
// ============================================================================

#[async_trait]
impl<T: Transport + ?Sized> Transport for Arc<T> {
    async fn deliver(&self, recipient: &str, body: &str) -> Result<DeliveryId, String> {
        (**self).deliver(recipient, body).await
    }
}

#[async_trait]
impl<T: StateStore + ?Sized> StateStore for Arc<T> {
    async fn load_state(&self, from: &str) -> Result<Option<ConversationState>, String> {
        (**self).load_state(from).await
    }

    async fn save_state(&self, state: &ConversationState) -> Result<(), String> {
        (**self).save_state(state).await
    }

    async fn clear_state(&self, from: &str) -> Result<(), String> {
        (**self).clear_state(from).await
    }
}

#[async_trait]
impl<T: UserContextProvider + ?Sized> UserContextProvider for Arc<T> {
    async fn user_context(&self, from: &str) -> Result<UserContext, String> {
        (**self).user_context(from).await
    }
}

#[async_trait]
impl<T: InteractionHooks + ?Sized> InteractionHooks for Arc<T> {
    async fn on_interaction_end(&self, state: &ConversationState, user_context: &UserContext) {
        (**self).on_interaction_end(state, user_context).await;
    }

    async fn on_error(&self, from: &str, error: &RuntimeError) {
        (**self).on_error(from, error).await;
    }
}
