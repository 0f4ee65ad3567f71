//! Jump to another flow in the schema

use crate::error::ConfigError;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Trigger {
    flow_name: String,
}

impl Trigger {
    /// `flow_name` is the dotted schema path of the target flow
    pub fn new(flow_name: impl Into<String>) -> Result<Self, ConfigError> {
        let flow_name = flow_name.into();
        if flow_name.is_empty() {
            return Err(ConfigError::EmptyTriggerTarget);
        }
        Ok(Self { flow_name })
    }

    pub fn flow_name(&self) -> &str {
        &self.flow_name
    }
}
