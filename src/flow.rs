//! Flows: ordered, uniquely named action resolvers
//!
//! A flow is one conversation branch. Each entry pairs an action name with a
//! resolver that builds the [`Action`] when the conversation reaches that
//! position.

use crate::action::{Action, ActionContext};
use crate::error::ConfigError;
use async_trait::async_trait;
use std::collections::{BTreeMap, HashSet};
use std::fmt;
use std::future::Future;
use std::sync::Arc;

/// Recorded action contexts of one flow, keyed by action name
pub type FlowContext = BTreeMap<String, ActionContext>;

/// Caller-supplied data about the sender, passed to every resolver
pub type UserContext = serde_json::Value;

/// Builds the action for one flow position
///
/// Returning `None` means "no action": the turn ends without output.
#[async_trait]
pub trait ActionResolver: Send + Sync {
    async fn resolve(&self, flow_context: &FlowContext, user_context: &UserContext)
        -> Option<Action>;
}

#[async_trait]
impl<F> ActionResolver for F
where
    F: Fn(&FlowContext, &UserContext) -> Option<Action> + Send + Sync,
{
    async fn resolve(
        &self,
        flow_context: &FlowContext,
        user_context: &UserContext,
    ) -> Option<Action> {
        self(flow_context, user_context)
    }
}

/// Pins a closure to the resolver signature so its argument types are inferred
pub fn resolver<F>(f: F) -> F
where
    F: Fn(&FlowContext, &UserContext) -> Option<Action> + Send + Sync,
{
    f
}

/// Adapter for resolvers that need to await something
pub struct AsyncResolver<F>(F);

/// Wrap an async closure as an [`ActionResolver`]. The closure receives
/// owned copies of the contexts.
pub fn async_resolver<F, Fut>(f: F) -> AsyncResolver<F>
where
    F: Fn(FlowContext, UserContext) -> Fut + Send + Sync,
    Fut: Future<Output = Option<Action>> + Send + 'static,
{
    AsyncResolver(f)
}

#[async_trait]
impl<F, Fut> ActionResolver for AsyncResolver<F>
where
    F: Fn(FlowContext, UserContext) -> Fut + Send + Sync,
    Fut: Future<Output = Option<Action>> + Send + 'static,
{
    async fn resolve(
        &self,
        flow_context: &FlowContext,
        user_context: &UserContext,
    ) -> Option<Action> {
        (self.0)(flow_context.clone(), user_context.clone()).await
    }
}

/// A named resolver inside a flow
#[derive(Clone)]
pub struct ActionEntry {
    name: String,
    resolver: Arc<dyn ActionResolver>,
}

impl ActionEntry {
    pub fn new(name: impl Into<String>, resolver: impl ActionResolver + 'static) -> Self {
        Self {
            name: name.into(),
            resolver: Arc::new(resolver),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }
}

/// Ordered sequence of named action resolvers
#[derive(Clone, Default)]
pub struct Flow {
    entries: Vec<ActionEntry>,
}

impl Flow {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a named resolver
    pub fn add_action(
        &mut self,
        name: impl Into<String>,
        resolver: impl ActionResolver + 'static,
    ) -> Result<&mut Self, ConfigError> {
        let entry = ActionEntry::new(name, resolver);
        self.check_name(&entry.name)?;
        self.entries.push(entry);
        Ok(self)
    }

    /// Append several entries. Nothing is added if any entry is rejected.
    pub fn add_actions(
        &mut self,
        entries: impl IntoIterator<Item = ActionEntry>,
    ) -> Result<&mut Self, ConfigError> {
        let entries: Vec<ActionEntry> = entries.into_iter().collect();
        if entries.is_empty() {
            return Err(ConfigError::EmptyActionList);
        }

        let mut seen = HashSet::new();
        for entry in &entries {
            self.check_name(&entry.name)?;
            if !seen.insert(entry.name.as_str()) {
                return Err(ConfigError::DuplicateActionName(entry.name.clone()));
            }
        }

        self.entries.extend(entries);
        Ok(self)
    }

    /// Owned variant of [`Flow::add_action`] for building flows in one expression
    pub fn with_action(
        mut self,
        name: impl Into<String>,
        resolver: impl ActionResolver + 'static,
    ) -> Result<Self, ConfigError> {
        self.add_action(name, resolver)?;
        Ok(self)
    }

    /// Resolver at `index`, or `None` past the end of the flow
    pub fn select_action_resolver(&self, index: usize) -> Option<&dyn ActionResolver> {
        self.entries.get(index).map(|entry| entry.resolver.as_ref())
    }

    /// Action name at `index`, or `None` past the end of the flow
    pub fn select_action_name(&self, index: usize) -> Option<&str> {
        self.entries.get(index).map(ActionEntry::name)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn action_names(&self) -> impl Iterator<Item = &str> {
        self.entries.iter().map(ActionEntry::name)
    }

    fn check_name(&self, name: &str) -> Result<(), ConfigError> {
        if name.trim().is_empty() {
            return Err(ConfigError::EmptyActionName);
        }
        if self.entries.iter().any(|entry| entry.name == name) {
            return Err(ConfigError::DuplicateActionName(name.to_string()));
        }
        Ok(())
    }
}

impl fmt::Debug for Flow {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Flow")
            .field("actions", &self.action_names().collect::<Vec<_>>())
            .finish()
    }
}
