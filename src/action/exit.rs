//! Conversation termination

/// Ends the conversation
///
/// `message_body` is the inbound text that caused the exit. The optional
/// reply is sent back to the sender before the conversation is closed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Exit {
    message_body: String,
    reply: Option<String>,
}

impl Exit {
    pub fn new(message_body: impl Into<String>) -> Self {
        Self {
            message_body: message_body.into(),
            reply: None,
        }
    }

    /// Send `text` to the sender when exiting. Empty text sends nothing.
    #[must_use]
    pub fn with_reply(mut self, text: impl Into<String>) -> Self {
        let text = text.into();
        self.reply = (!text.is_empty()).then_some(text);
        self
    }

    pub fn message_body(&self) -> &str {
        &self.message_body
    }

    pub fn reply(&self) -> Option<&str> {
        self.reply.as_deref()
    }
}
