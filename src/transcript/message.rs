//! Transcript message types
//!
//! Defines the entries of a chat transcript and the id generator that keeps
//! them distinct.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Unique identifier of a transcript message
///
/// Ids are creation timestamps in Unix milliseconds, bumped forward when two
/// messages would otherwise share the same millisecond.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct MessageId(pub u64);

impl fmt::Display for MessageId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Who authored a message
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Sender {
    User,
    Bot,
}

impl Sender {
    pub fn as_str(&self) -> &'static str {
        match self {
            Sender::User => "user",
            Sender::Bot => "bot",
        }
    }
}

impl fmt::Display for Sender {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One transcript entry
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Message {
    pub id: MessageId,
    pub text: String,
    pub sender: Sender,
    /// Bot message has received its terminal signal
    pub complete: bool,
    /// Bot placeholder still waiting for its first fragment
    pub loading: bool,
    pub created_at: DateTime<Utc>,
}

impl Message {
    /// A frozen user message
    pub(crate) fn user(id: MessageId, text: impl Into<String>) -> Self {
        Self {
            id,
            text: text.into(),
            sender: Sender::User,
            complete: true,
            loading: false,
            created_at: Utc::now(),
        }
    }

    /// An empty bot message shown as "thinking" until the first fragment
    pub(crate) fn bot_placeholder(id: MessageId) -> Self {
        Self {
            id,
            text: String::new(),
            sender: Sender::Bot,
            complete: false,
            loading: true,
            created_at: Utc::now(),
        }
    }

    /// A bot message opened by a fragment that arrived with no placeholder
    pub(crate) fn bot_with(id: MessageId, fragment: &str) -> Self {
        Self {
            id,
            text: fragment.to_string(),
            sender: Sender::Bot,
            complete: false,
            loading: false,
            created_at: Utc::now(),
        }
    }

    pub fn is_bot(&self) -> bool {
        self.sender == Sender::Bot
    }

    /// Bot message that may still receive fragments
    pub fn is_streaming(&self) -> bool {
        self.is_bot() && !self.complete
    }
}

/// Strictly increasing id source
///
/// Seeds from the wall clock so ids read as creation times, but never hands
/// out the same value twice.
#[derive(Debug, Default)]
pub struct IdGenerator {
    last: u64,
}

impl IdGenerator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn next_id(&mut self) -> MessageId {
        let now = Utc::now().timestamp_millis().max(0) as u64;
        self.last = now.max(self.last + 1);
        MessageId(self.last)
    }
}
