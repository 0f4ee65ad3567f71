//! Questions and their answer-evaluation cycle
//!
//! A question moves `Unstarted -> Answering -> {Answered | Failed}`. It is
//! only evaluated once the state document says the prompt has been sent
//! (`question.is_answering`). Each invalid answer either leaves the question
//! `Answering` (a retry, with an invalid-answer notice due) or, once the
//! recorded attempts reach `max_retries`, moves it to `Failed`.

use super::ActionContext;
use crate::cookie::ConversationState;
use crate::error::ConfigError;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::future::Future;
use std::sync::Arc;

/// Upper bound for `max_retries` unless a question overrides it
pub const MAX_RETRIES: u32 = 10;

pub const DEFAULT_INVALID_ANSWER_TEXT: &str =
    "Sorry, that answer was not valid. Please try again.";

/// Predicate deciding whether an inbound message answers a question
#[async_trait]
pub trait AnswerValidator: Send + Sync {
    async fn validate(&self, answer: &str) -> bool;
}

#[async_trait]
impl<F> AnswerValidator for F
where
    F: Fn(&str) -> bool + Send + Sync,
{
    async fn validate(&self, answer: &str) -> bool {
        self(answer)
    }
}

/// Adapter for validators that need to await something
pub struct AsyncValidator<F>(F);

/// Wrap an async closure as an [`AnswerValidator`]
pub fn async_validator<F, Fut>(f: F) -> AsyncValidator<F>
where
    F: Fn(String) -> Fut + Send + Sync,
    Fut: Future<Output = bool> + Send + 'static,
{
    AsyncValidator(f)
}

#[async_trait]
impl<F, Fut> AnswerValidator for AsyncValidator<F>
where
    F: Fn(String) -> Fut + Send + Sync,
    Fut: Future<Output = bool> + Send + 'static,
{
    async fn validate(&self, answer: &str) -> bool {
        (self.0)(answer.to_string()).await
    }
}

/// How answers are matched
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum QuestionType {
    MultipleChoice,
    #[default]
    #[serde(other)]
    Text,
}

impl QuestionType {
    /// Parse a configured type name. Unrecognized names fall back to `Text`.
    pub fn from_name(name: &str) -> Self {
        match name.trim().to_ascii_lowercase().replace(['-', ' '], "_").as_str() {
            "multiple_choice" | "multiplechoice" => QuestionType::MultipleChoice,
            _ => QuestionType::Text,
        }
    }
}

/// Recorded answer: the raw text, or the index of the matching choice
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Answer {
    Choice(usize),
    Text(String),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum QuestionStatus {
    /// Not evaluated yet; the prompt still has to be sent
    Unstarted,
    /// Last answer was invalid and a retry remains
    Answering,
    Answered,
    Failed,
}

/// Options accepted by [`Question::new`]
#[derive(Clone)]
pub struct QuestionOptions {
    question_type: QuestionType,
    choices: Vec<Arc<dyn AnswerValidator>>,
    validate_answer: Option<Arc<dyn AnswerValidator>>,
    max_retries: u32,
    max_retries_ceiling: u32,
    continue_on_failure: bool,
    invalid_answer_text: String,
    success_text: Option<String>,
    failure_text: Option<String>,
}

impl Default for QuestionOptions {
    fn default() -> Self {
        Self {
            question_type: QuestionType::Text,
            choices: Vec::new(),
            validate_answer: None,
            max_retries: 1,
            max_retries_ceiling: MAX_RETRIES,
            continue_on_failure: false,
            invalid_answer_text: DEFAULT_INVALID_ANSWER_TEXT.to_string(),
            success_text: None,
            failure_text: None,
        }
    }
}

impl QuestionOptions {
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn with_type(mut self, question_type: QuestionType) -> Self {
        self.question_type = question_type;
        self
    }

    /// Append a multiple-choice predicate. Order decides the answer index.
    #[must_use]
    pub fn with_choice(mut self, choice: impl AnswerValidator + 'static) -> Self {
        self.choices.push(Arc::new(choice));
        self
    }

    #[must_use]
    pub fn with_validator(mut self, validator: impl AnswerValidator + 'static) -> Self {
        self.validate_answer = Some(Arc::new(validator));
        self
    }

    #[must_use]
    pub fn with_max_retries(mut self, max_retries: u32) -> Self {
        self.max_retries = max_retries;
        self
    }

    #[must_use]
    pub fn with_max_retries_ceiling(mut self, ceiling: u32) -> Self {
        self.max_retries_ceiling = ceiling;
        self
    }

    /// Advance the flow even when the question fails
    #[must_use]
    pub fn continue_on_failure(mut self, continue_on_failure: bool) -> Self {
        self.continue_on_failure = continue_on_failure;
        self
    }

    #[must_use]
    pub fn with_invalid_answer_text(mut self, text: impl Into<String>) -> Self {
        self.invalid_answer_text = text.into();
        self
    }

    #[must_use]
    pub fn with_success_text(mut self, text: impl Into<String>) -> Self {
        self.success_text = Some(text.into());
        self
    }

    #[must_use]
    pub fn with_failure_text(mut self, text: impl Into<String>) -> Self {
        self.failure_text = Some(text.into());
        self
    }
}

/// A prompt whose answer is validated over one or more turns
#[derive(Clone)]
pub struct Question {
    body: String,
    question_type: QuestionType,
    choices: Vec<Arc<dyn AnswerValidator>>,
    validate_answer: Option<Arc<dyn AnswerValidator>>,
    max_retries: u32,
    continue_on_failure: bool,
    invalid_answer_text: String,
    success_text: Option<String>,
    failure_text: Option<String>,
    status: QuestionStatus,
    answer: Option<Answer>,
}

impl Question {
    pub fn new(body: impl Into<String>, options: QuestionOptions) -> Result<Self, ConfigError> {
        let body = body.into();
        if body.is_empty() {
            return Err(ConfigError::EmptyBody("Question"));
        }
        if options.question_type == QuestionType::MultipleChoice && options.choices.len() < 2 {
            return Err(ConfigError::NotEnoughChoices(options.choices.len()));
        }
        if options.max_retries > options.max_retries_ceiling {
            return Err(ConfigError::MaxRetriesOutOfRange {
                value: options.max_retries,
                ceiling: options.max_retries_ceiling,
            });
        }

        Ok(Self {
            body,
            question_type: options.question_type,
            choices: options.choices,
            validate_answer: options.validate_answer,
            max_retries: options.max_retries,
            continue_on_failure: options.continue_on_failure,
            invalid_answer_text: options.invalid_answer_text,
            success_text: options.success_text,
            failure_text: options.failure_text,
            status: QuestionStatus::Unstarted,
            answer: None,
        })
    }

    /// Free-text question with default options
    pub fn text(body: impl Into<String>) -> Result<Self, ConfigError> {
        Self::new(body, QuestionOptions::default())
    }

    pub fn body(&self) -> &str {
        &self.body
    }

    pub fn question_type(&self) -> QuestionType {
        self.question_type
    }

    pub fn max_retries(&self) -> u32 {
        self.max_retries
    }

    pub fn continues_on_failure(&self) -> bool {
        self.continue_on_failure
    }

    pub fn status(&self) -> QuestionStatus {
        self.status
    }

    pub fn answer(&self) -> Option<&Answer> {
        self.answer.as_ref()
    }

    pub fn was_answered(&self) -> bool {
        self.status == QuestionStatus::Answered
    }

    pub fn was_failed(&self) -> bool {
        self.status == QuestionStatus::Failed
    }

    /// True once the question has been checked against an inbound message
    pub fn was_evaluated(&self) -> bool {
        self.status != QuestionStatus::Unstarted
    }

    /// An invalid answer was given and the notice should be sent
    pub fn should_send_invalid_notice(&self) -> bool {
        self.status == QuestionStatus::Answering
    }

    /// Check `message_body` against this question.
    ///
    /// Does nothing unless the state says the question is being answered.
    pub async fn evaluate(&mut self, message_body: &str, state: &ConversationState) {
        if !state.question.is_answering {
            return;
        }

        let answer = match self.question_type {
            QuestionType::Text => {
                let valid = match &self.validate_answer {
                    Some(validator) => validator.validate(message_body).await,
                    None => !message_body.trim().is_empty(),
                };
                valid.then(|| Answer::Text(message_body.to_string()))
            }
            QuestionType::MultipleChoice => {
                let mut matched = None;
                for (index, choice) in self.choices.iter().enumerate() {
                    if choice.validate(message_body).await {
                        matched = Some(Answer::Choice(index));
                        break;
                    }
                }
                matched
            }
        };

        let retries = usize::try_from(self.max_retries).unwrap_or(usize::MAX);
        self.status = match answer {
            Some(answer) => {
                self.answer = Some(answer);
                QuestionStatus::Answered
            }
            None if state.question.attempts.len() < retries => QuestionStatus::Answering,
            None => QuestionStatus::Failed,
        };
    }

    pub(crate) fn context(&self) -> ActionContext {
        ActionContext::Question {
            body: self.body.clone(),
            question_type: self.question_type,
            answer: self.answer.clone(),
            was_answered: self.was_answered(),
            was_failed: self.was_failed(),
        }
    }

    pub(crate) fn outbound_body(&self) -> Option<String> {
        match self.status {
            QuestionStatus::Unstarted => Some(self.body.clone()),
            QuestionStatus::Answering => Some(format!("{}\n{}", self.invalid_answer_text, self.body)),
            QuestionStatus::Answered => self.success_text.clone(),
            QuestionStatus::Failed => self.failure_text.clone(),
        }
    }
}

impl fmt::Debug for Question {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Question")
            .field("body", &self.body)
            .field("question_type", &self.question_type)
            .field("choices", &self.choices.len())
            .field("has_validator", &self.validate_answer.is_some())
            .field("max_retries", &self.max_retries)
            .field("continue_on_failure", &self.continue_on_failure)
            .field("status", &self.status)
            .field("answer", &self.answer)
            .finish_non_exhaustive()
    }
}
