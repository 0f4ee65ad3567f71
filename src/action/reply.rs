//! Reply to the conversation's sender

use crate::error::ConfigError;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Reply {
    body: String,
}

impl Reply {
    pub fn new(body: impl Into<String>) -> Result<Self, ConfigError> {
        let body = body.into();
        if body.is_empty() {
            return Err(ConfigError::EmptyBody("Reply"));
        }
        Ok(Self { body })
    }

    pub fn body(&self) -> &str {
        &self.body
    }
}
