//! Conversation thread identifiers.

use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use uuid::Uuid;

/// Errors from parsing a thread identifier.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ThreadIdError {
    #[error("thread id must not be empty")]
    Empty,
}

/// Opaque key grouping an ordered conversation history.
///
/// The only constraint is that the id is not blank. New conversations get a
/// millisecond timestamp followed by a random suffix, so concurrent starts never
/// share a thread; callers may supply any other non-empty string to continue
/// a thread.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct ThreadId(String);

impl ThreadId {
    /// Parse a caller-supplied thread id.
    ///
    /// # Errors
    ///
    /// Returns `ThreadIdError::Empty` if the value is empty or only whitespace.
    pub fn parse(value: impl Into<String>) -> Result<Self, ThreadIdError> {
        let value = value.into();
        if value.trim().is_empty() {
            return Err(ThreadIdError::Empty);
        }
        Ok(Self(value))
    }

    /// Generate a fresh thread id for a new conversation.
    #[must_use]
    pub fn generate() -> Self {
        Self::from_parts(Utc::now(), Uuid::new_v4())
    }

    /// `{millis}-{suffix}`: epoch milliseconds then the hyphenless suffix.
    fn from_parts(at: DateTime<Utc>, suffix: Uuid) -> Self {
        Self(format!("{}-{}", at.timestamp_millis(), suffix.simple()))
    }

    /// Returns the id as a string slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for ThreadId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

impl AsRef<str> for ThreadId {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl FromStr for ThreadId {
    type Err = ThreadIdError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl TryFrom<String> for ThreadId {
    type Error = ThreadIdError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::parse(value)
    }
}

impl From<ThreadId> for String {
    fn from(id: ThreadId) -> Self {
        id.0
    }
}
