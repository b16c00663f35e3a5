//! Streaming transcript reducer
//!
//! Folds user submissions and streamed answer fragments into an ordered list
//! of messages. The reducer tracks the open bot message by index instead of
//! inspecting the shape of the list tail.

use super::error::{TranscriptError, TranscriptResult};
use super::message::{IdGenerator, Message, MessageId};
use crate::protocol::StreamEvent;

/// Ids of the two entries created by one submission
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Turn {
    pub user: MessageId,
    pub bot: MessageId,
}

/// What applying a stream event did to the transcript
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Applied {
    /// A fragment arrived with no open bot message and started a new one
    Started(MessageId),
    /// A fragment was appended to the open bot message
    Appended(MessageId),
    /// The open bot message received its terminal signal
    Completed(MessageId),
    /// Nothing changed
    Ignored,
}

impl Applied {
    pub fn message_id(&self) -> Option<MessageId> {
        match self {
            Applied::Started(id) | Applied::Appended(id) | Applied::Completed(id) => Some(*id),
            Applied::Ignored => None,
        }
    }
}

/// Append/mutate-only chat transcript
#[derive(Debug, Default)]
pub struct Transcript {
    messages: Vec<Message>,
    /// Index of the bot message currently accepting fragments
    open_bot: Option<usize>,
    ids: IdGenerator,
}

impl Transcript {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a user submission and open a placeholder bot message for its answer
    ///
    /// A previous bot message that is still open is left as it is; fragments
    /// from here on go to the new placeholder.
    pub fn submit(&mut self, text: &str) -> TranscriptResult<Turn> {
        if text.trim().is_empty() {
            return Err(TranscriptError::EmptyInput);
        }

        if let Some(index) = self.open_bot {
            tracing::debug!(
                message_id = %self.messages[index].id,
                "Submitting while previous answer is still streaming"
            );
        }

        let user = self.ids.next_id();
        let bot = self.ids.next_id();

        self.messages.push(Message::user(user, text));
        self.messages.push(Message::bot_placeholder(bot));
        self.open_bot = Some(self.messages.len() - 1);

        Ok(Turn { user, bot })
    }

    /// Apply one classified inbound event
    pub fn apply(&mut self, event: StreamEvent) -> Applied {
        match event {
            StreamEvent::Fragment(fragment) => self.apply_fragment(&fragment),
            StreamEvent::Terminal => self.complete_turn(),
        }
    }

    /// Append a fragment to the open bot message
    ///
    /// An empty fragment is always the end-of-turn marker, never content.
    pub fn apply_fragment(&mut self, fragment: &str) -> Applied {
        if fragment.is_empty() {
            return self.complete_turn();
        }

        match self.open_bot {
            Some(index) => {
                let message = &mut self.messages[index];
                message.loading = false;
                message.text.push_str(fragment);
                Applied::Appended(message.id)
            }
            None => {
                let id = self.ids.next_id();
                self.messages.push(Message::bot_with(id, fragment));
                self.open_bot = Some(self.messages.len() - 1);
                Applied::Started(id)
            }
        }
    }

    /// Finalize the open bot message; no-op when none is open
    pub fn complete_turn(&mut self) -> Applied {
        match self.open_bot.take() {
            Some(index) => {
                let message = &mut self.messages[index];
                message.complete = true;
                message.loading = false;
                Applied::Completed(message.id)
            }
            None => Applied::Ignored,
        }
    }

    pub fn messages(&self) -> &[Message] {
        &self.messages
    }

    pub fn len(&self) -> usize {
        self.messages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.messages.is_empty()
    }

    pub fn last(&self) -> Option<&Message> {
        self.messages.last()
    }

    pub fn get(&self, id: MessageId) -> Option<&Message> {
        // ids are strictly increasing, so the list is sorted by id
        self.messages
            .binary_search_by_key(&id, |m| m.id)
            .ok()
            .map(|index| &self.messages[index])
    }

    /// The bot message currently accepting fragments
    pub fn open_message(&self) -> Option<&Message> {
        self.open_bot.map(|index| &self.messages[index])
    }

    pub fn is_streaming(&self) -> bool {
        self.open_bot.is_some()
    }
}
