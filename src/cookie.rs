//! Conversation state document ("cookie")
//!
//! The document records where a conversation stands. It is created by the
//! transport layer on first contact and replaced wholesale each turn by the
//! controller; the engine never mutates a caller's copy.

use crate::action::ActionContext;
use crate::flow::FlowContext;
use crate::schema::ROOT_FLOW_KEY;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Question sub-state carried between turns
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct QuestionState {
    /// The prompt has been sent and the next message is an answer
    pub is_answering: bool,
    /// Answers already given to the current question
    pub attempts: Vec<String>,
}

/// Persisted record of one conversation
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConversationState {
    pub interaction_id: String,
    pub from: String,
    pub created_at: DateTime<Utc>,
    /// Active flow path; `None` is the root flow
    pub flow: Option<String>,
    /// Index of the next action in the active flow
    pub flow_key: usize,
    /// Action contexts per flow path, then per action name
    #[serde(default)]
    pub context: BTreeMap<String, FlowContext>,
    #[serde(default)]
    pub question: QuestionState,
    #[serde(default)]
    pub is_complete: bool,
}

impl ConversationState {
    /// Fresh state at the start of the root flow
    pub fn new(from: impl Into<String>) -> Self {
        Self {
            interaction_id: uuid::Uuid::new_v4().to_string(),
            from: from.into(),
            created_at: Utc::now(),
            flow: None,
            flow_key: 0,
            context: BTreeMap::new(),
            question: QuestionState::default(),
            is_complete: false,
        }
    }

    /// Key of the active flow in the context map
    pub fn flow_path(&self) -> &str {
        self.flow.as_deref().unwrap_or(ROOT_FLOW_KEY)
    }

    /// Recorded contexts of the active flow
    pub fn flow_context(&self) -> FlowContext {
        self.context.get(self.flow_path()).cloned().unwrap_or_default()
    }

    pub fn action_context(&self, flow_path: &str, action_name: &str) -> Option<&ActionContext> {
        self.context.get(flow_path)?.get(action_name)
    }

    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }

    pub fn from_json(json: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(json)
    }

    pub(crate) fn record_context(&mut self, action_name: &str, context: ActionContext) {
        let path = self.flow_path().to_string();
        self.context
            .entry(path)
            .or_default()
            .insert(action_name.to_string(), context);
    }
}
