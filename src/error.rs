//! Error types for flow construction and resolution
//!
//! Construction problems surface as [`ConfigError`] before any conversation
//! runs. Structural problems found while walking a conversation surface as
//! [`ResolutionError`]. Neither is retried by the engine.

use thiserror::Error;

/// Malformed flows, schemas, actions or question options
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ConfigError {
    #[error("Action name must be a non-empty string")]
    EmptyActionName,
    #[error("Flow already has an action named '{0}'")]
    DuplicateActionName(String),
    #[error("Action list must contain at least one action")]
    EmptyActionList,
    #[error("Flow must perform at least one action (flow: {path})")]
    EmptyFlow { path: String },
    #[error("Flow schema must contain at least one flow (schema: {path})")]
    EmptySchema { path: String },
    #[error("Duplicate flow name in schema: {path}")]
    DuplicateFlowPath { path: String },
    #[error("Schema already has an entry named '{0}'")]
    DuplicateSchemaKey(String),
    #[error("Schema keys must be non-empty strings")]
    EmptySchemaKey,
    #[error("{0} body must be a non-empty string")]
    EmptyBody(&'static str),
    #[error("Message recipient must be a non-empty string")]
    EmptyRecipient,
    #[error("Trigger target flow name must be a non-empty string")]
    EmptyTriggerTarget,
    #[error("Multiple choice questions need at least 2 choices, got {0}")]
    NotEnoughChoices(usize),
    #[error("max_retries must be between 0 and {ceiling}, got {value}")]
    MaxRetriesOutOfRange { value: u32, ceiling: u32 },
}

/// Structural errors found while resolving a conversation turn
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ResolutionError {
    #[error("Invalid flow name in state: {0}")]
    InvalidFlowName(String),
    #[error("Cannot trigger flow '{0}': controller has no flow schema")]
    NoSchema(String),
    #[error("Flow not found in schema: {0}")]
    FlowNotFound(String),
}
