//! In-memory state store

use super::traits::StateStore;
use crate::cookie::ConversationState;
use async_trait::async_trait;
use std::collections::HashMap;
use tokio::sync::RwLock;

/// State store backed by a map, for single-process deployments and tests
#[derive(Debug, Default)]
pub struct MemoryStateStore {
    states: RwLock<HashMap<String, ConversationState>>,
}

impl MemoryStateStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn get(&self, from: &str) -> Option<ConversationState> {
        self.states.read().await.get(from).cloned()
    }

    pub async fn len(&self) -> usize {
        self.states.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.states.read().await.is_empty()
    }
}

#[async_trait]
impl StateStore for MemoryStateStore {
    async fn load_state(&self, from: &str) -> Result<Option<ConversationState>, String> {
        Ok(self.get(from).await)
    }

    async fn save_state(&self, state: &ConversationState) -> Result<(), String> {
        self.states
            .write()
            .await
            .insert(state.from.clone(), state.clone());
        Ok(())
    }

    async fn clear_state(&self, from: &str) -> Result<(), String> {
        self.states.write().await.remove(from);
        Ok(())
    }
}
