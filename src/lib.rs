//! SMS conversation flow engine
//!
//! A conversation is a tree of flows. Each flow is an ordered list of named
//! actions (reply, message, question, trigger, exit) whose resolvers see the
//! context recorded so far. The engine is stateless between messages: every
//! inbound SMS is resolved against a serializable [`cookie::ConversationState`]
//! and produces the next one.
//!
//! [`controller::FlowController`] holds the pure resolution logic and
//! [`runtime::ConversationRuntime`] wires it to storage and a transport.

pub mod action;
pub mod config;
pub mod controller;
pub mod cookie;
pub mod error;
pub mod flow;
pub mod runtime;
pub mod schema;

pub use action::{Action, ActionContext, ActionType, Question, QuestionOptions};
pub use config::FlowConfig;
pub use controller::FlowController;
pub use cookie::ConversationState;
pub use error::{ConfigError, ResolutionError};
pub use flow::{async_resolver, resolver, ActionResolver, Flow, FlowContext, UserContext};
pub use runtime::{ConversationRuntime, RuntimeError, TurnOutcome};
pub use schema::{FlowSchema, ROOT_FLOW_KEY};
