//! # Chatline
//!
//! Streaming chat client - sends questions to a websocket backend and folds
//! the streamed answer fragments into a live transcript.
//!
//! ## Features
//!
//! - **Streaming transcript**: answers grow fragment by fragment until the
//!   backend signals the end of the turn
//! - **Resilient transport**: one websocket connection, reconnected at a fixed
//!   interval when it drops, optionally capped
//! - **Rendering**: markdown with inline and display math to HTML
//!
//! ## Modules
//!
//! - [`transcript`]: Message list and the streaming reducer
//! - [`transport`]: WebSocket connection task and reconnect policy
//! - [`protocol`]: JSON frame types
//! - [`render`]: Markdown/math renderer
//! - [`session`]: Wires the transport to a transcript
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use chatline::{ChatSession, Config, SessionUpdate, Applied};
//!
//! #[tokio::main(flavor = "current_thread")]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let mut session = ChatSession::new(&Config::default());
//!     session.connect()?;
//!
//!     while let Some(update) = session.next_update().await {
//!         match update {
//!             SessionUpdate::Connected => {
//!                 session.submit("2+2?")?;
//!             }
//!             SessionUpdate::Transcript(Applied::Completed(id)) => {
//!                 let answer = session.transcript().get(id).unwrap();
//!                 println!("{}", answer.text);
//!                 break;
//!             }
//!             _ => {}
//!         }
//!     }
//!
//!     session.close().await;
//!     Ok(())
//! }
//! ```

pub mod config;
pub mod protocol;
pub mod render;
pub mod session;
pub mod transcript;
pub mod transport;

// Re-export top-level types for convenience
pub use config::{
    generate_default_config, Config, ConfigError, ConnectionConfig, LoggingConfig, RenderConfig,
};

pub use protocol::{parse_inbound, OutgoingFrame, ProtocolError, QuestionMode, StreamEvent};

pub use render::{MarkdownRenderer, Render};

pub use session::{
    Assist, ChatSession, ConnectionStatus, SessionError, SessionResult, SessionUpdate,
};

pub use transcript::{Applied, Message, MessageId, Sender, Transcript, TranscriptError, Turn};

pub use transport::{
    ConnectionState, ReconnectPolicy, Transport, TransportError, TransportEvent,
};
