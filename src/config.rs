//! Environment configuration

use crate::controller::{ExitKeywords, FlowController, DEFAULT_EXIT_KEYWORDS};
use crate::runtime::DEFAULT_MAX_ACTIONS_PER_TURN;

pub const DEFAULT_CONSOLE_FROM: &str = "+15555550100";

/// Settings shared by the controller, the runtime and the console binary
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FlowConfig {
    /// Messages that end a conversation (matched case-insensitively)
    pub exit_keywords: Vec<String>,
    /// Reply sent when a conversation is ended by an exit keyword
    pub exit_text: Option<String>,
    /// Cap on actions resolved for one inbound message
    pub max_actions_per_turn: usize,
    /// Sender number used by the console binary
    pub console_from: String,
}

impl Default for FlowConfig {
    fn default() -> Self {
        Self {
            exit_keywords: DEFAULT_EXIT_KEYWORDS.iter().map(ToString::to_string).collect(),
            exit_text: None,
            max_actions_per_turn: DEFAULT_MAX_ACTIONS_PER_TURN,
            console_from: DEFAULT_CONSOLE_FROM.to_string(),
        }
    }
}

impl FlowConfig {
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build from any key lookup; unset or unparsable values keep defaults
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let defaults = Self::default();

        let exit_keywords = lookup("SMS_FLOW_EXIT_KEYWORDS")
            .map(|raw| {
                raw.split(',')
                    .map(str::trim)
                    .filter(|keyword| !keyword.is_empty())
                    .map(String::from)
                    .collect::<Vec<_>>()
            })
            .filter(|keywords| !keywords.is_empty())
            .unwrap_or(defaults.exit_keywords);

        let max_actions_per_turn = lookup("SMS_FLOW_MAX_ACTIONS_PER_TURN")
            .and_then(|raw| raw.trim().parse::<usize>().ok())
            .filter(|max| *max > 0)
            .unwrap_or(defaults.max_actions_per_turn);

        Self {
            exit_keywords,
            exit_text: lookup("SMS_FLOW_EXIT_TEXT").filter(|text| !text.is_empty()),
            max_actions_per_turn,
            console_from: lookup("SMS_FLOW_FROM").unwrap_or(defaults.console_from),
        }
    }

    pub fn exit_test(&self) -> ExitKeywords {
        ExitKeywords::new(&self.exit_keywords)
    }

    /// Install the exit keywords and exit text on `controller`
    pub fn configure_controller(&self, controller: FlowController) -> FlowController {
        let controller = controller.with_exit_test(self.exit_test());
        match &self.exit_text {
            Some(text) => controller.with_exit_text(text.as_str()),
            None => controller,
        }
    }
}
