//! Conversational actions
//!
//! An [`Action`] is one unit of conversational output. The variant-specific
//! payload lives in [`ActionKind`]; the shared metadata (name, delivery id,
//! creation time) lives on [`Action`] itself and is only written by the
//! controller and the runtime.

mod exit;
mod message;
mod question;
mod reply;
mod trigger;

pub use exit::Exit;
pub use message::Message;
pub use question::{
    async_validator, Answer, AnswerValidator, AsyncValidator, Question, QuestionOptions,
    QuestionStatus, QuestionType, DEFAULT_INVALID_ANSWER_TEXT, MAX_RETRIES,
};
pub use reply::Reply;
pub use trigger::Trigger;

use crate::error::ConfigError;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Variant tag of an action
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ActionType {
    Reply,
    Message,
    Exit,
    Question,
    Trigger,
}

impl ActionType {
    pub fn as_str(self) -> &'static str {
        match self {
            ActionType::Reply => "reply",
            ActionType::Message => "message",
            ActionType::Exit => "exit",
            ActionType::Question => "question",
            ActionType::Trigger => "trigger",
        }
    }
}

impl fmt::Display for ActionType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Transport identifier(s) returned when an action is delivered
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum DeliveryId {
    Single(String),
    Many(Vec<String>),
}

impl From<String> for DeliveryId {
    fn from(id: String) -> Self {
        DeliveryId::Single(id)
    }
}

impl From<Vec<String>> for DeliveryId {
    fn from(ids: Vec<String>) -> Self {
        DeliveryId::Many(ids)
    }
}

/// Snapshot of the public state an action contributes to conversation history
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case", rename_all_fields = "camelCase")]
pub enum ActionContext {
    Reply {
        body: String,
    },
    Message {
        to: String,
        body: String,
    },
    Exit {
        message_body: String,
    },
    Question {
        body: String,
        question_type: QuestionType,
        answer: Option<Answer>,
        was_answered: bool,
        was_failed: bool,
    },
    Trigger {
        trigger_flow_name: String,
    },
}

/// Text to hand to the transport for one action
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Outbound {
    /// Explicit recipient; `None` means the conversation's own sender
    pub to: Option<String>,
    pub body: String,
}

impl Outbound {
    fn reply(body: impl Into<String>) -> Self {
        Self {
            to: None,
            body: body.into(),
        }
    }
}

/// Variant payloads
#[derive(Debug, Clone)]
pub enum ActionKind {
    Reply(Reply),
    Message(Message),
    Exit(Exit),
    Question(Question),
    Trigger(Trigger),
}

/// A unit of conversational behavior produced by a flow resolver
#[derive(Debug, Clone)]
pub struct Action {
    name: Option<String>,
    delivery_id: Option<DeliveryId>,
    created_at: DateTime<Utc>,
    kind: ActionKind,
}

impl Action {
    pub fn new(kind: ActionKind) -> Self {
        Self {
            name: None,
            delivery_id: None,
            created_at: Utc::now(),
            kind,
        }
    }

    pub fn reply(body: impl Into<String>) -> Result<Self, ConfigError> {
        Reply::new(body).map(Self::from)
    }

    pub fn message(to: impl Into<String>, body: impl Into<String>) -> Result<Self, ConfigError> {
        Message::new(to, body).map(Self::from)
    }

    pub fn exit(message_body: impl Into<String>) -> Self {
        Exit::new(message_body).into()
    }

    pub fn trigger(flow_name: impl Into<String>) -> Result<Self, ConfigError> {
        Trigger::new(flow_name).map(Self::from)
    }

    /// Name assigned by the controller from the flow position, if any
    pub fn name(&self) -> Option<&str> {
        self.name.as_deref()
    }

    pub fn action_type(&self) -> ActionType {
        match &self.kind {
            ActionKind::Reply(_) => ActionType::Reply,
            ActionKind::Message(_) => ActionType::Message,
            ActionKind::Exit(_) => ActionType::Exit,
            ActionKind::Question(_) => ActionType::Question,
            ActionKind::Trigger(_) => ActionType::Trigger,
        }
    }

    pub fn delivery_id(&self) -> Option<&DeliveryId> {
        self.delivery_id.as_ref()
    }

    pub fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    pub fn kind(&self) -> &ActionKind {
        &self.kind
    }

    pub fn as_question(&self) -> Option<&Question> {
        match &self.kind {
            ActionKind::Question(question) => Some(question),
            _ => None,
        }
    }

    /// Immutable snapshot of this action for the conversation context map
    pub fn context(&self) -> ActionContext {
        match &self.kind {
            ActionKind::Reply(reply) => ActionContext::Reply {
                body: reply.body().to_string(),
            },
            ActionKind::Message(message) => ActionContext::Message {
                to: message.to().to_string(),
                body: message.body().to_string(),
            },
            ActionKind::Exit(exit) => ActionContext::Exit {
                message_body: exit.message_body().to_string(),
            },
            ActionKind::Question(question) => question.context(),
            ActionKind::Trigger(trigger) => ActionContext::Trigger {
                trigger_flow_name: trigger.flow_name().to_string(),
            },
        }
    }

    /// What the transport should send for this action, if anything
    pub fn outbound(&self) -> Option<Outbound> {
        match &self.kind {
            ActionKind::Reply(reply) => Some(Outbound::reply(reply.body())),
            ActionKind::Message(message) => Some(Outbound {
                to: Some(message.to().to_string()),
                body: message.body().to_string(),
            }),
            ActionKind::Exit(exit) => exit.reply().map(Outbound::reply),
            ActionKind::Question(question) => question.outbound_body().map(Outbound::reply),
            ActionKind::Trigger(_) => None,
        }
    }

    /// Store the transport identifier(s) after delivery
    pub fn record_delivery(&mut self, delivery_id: impl Into<DeliveryId>) {
        self.delivery_id = Some(delivery_id.into());
    }

    pub(crate) fn set_name(&mut self, name: impl Into<String>) {
        self.name = Some(name.into());
    }

    pub(crate) fn question_mut(&mut self) -> Option<&mut Question> {
        match &mut self.kind {
            ActionKind::Question(question) => Some(question),
            _ => None,
        }
    }
}

impl From<Reply> for Action {
    fn from(reply: Reply) -> Self {
        Self::new(ActionKind::Reply(reply))
    }
}

impl From<Message> for Action {
    fn from(message: Message) -> Self {
        Self::new(ActionKind::Message(message))
    }
}

impl From<Exit> for Action {
    fn from(exit: Exit) -> Self {
        Self::new(ActionKind::Exit(exit))
    }
}

impl From<Question> for Action {
    fn from(question: Question) -> Self {
        Self::new(ActionKind::Question(question))
    }
}

impl From<Trigger> for Action {
    fn from(trigger: Trigger) -> Self {
        Self::new(ActionKind::Trigger(trigger))
    }
}
