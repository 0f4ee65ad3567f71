//! Message sent to an explicit recipient instead of the sender

use crate::error::ConfigError;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Message {
    to: String,
    body: String,
}

impl Message {
    pub fn new(to: impl Into<String>, body: impl Into<String>) -> Result<Self, ConfigError> {
        let to = to.into();
        let body = body.into();
        if to.is_empty() {
            return Err(ConfigError::EmptyRecipient);
        }
        if body.is_empty() {
            return Err(ConfigError::EmptyBody("Message"));
        }
        Ok(Self { to, body })
    }

    pub fn to(&self) -> &str {
        &self.to
    }

    pub fn body(&self) -> &str {
        &self.body
    }
}
