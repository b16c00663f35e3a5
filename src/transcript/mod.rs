//! Chat Transcript
//!
//! Ordered user/bot messages built up from submissions and streamed answer
//! fragments.
//!
//! ## Lifecycle
//!
//! - `submit` appends a frozen user message and a `loading` bot placeholder
//! - the first fragment clears `loading` and starts the answer text
//! - further fragments are appended
//! - the terminal signal (an empty fragment) marks the answer `complete`
//!
//! Messages are never removed; a fresh [`Transcript`] starts a new session.

mod error;
mod message;
mod reducer;

pub use error::{TranscriptError, TranscriptResult};
pub use message::{IdGenerator, Message, MessageId, Sender};
pub use reducer::{Applied, Transcript, Turn};
