//! Chat Backend Transport
//!
//! Keeps one websocket connection to the chat backend alive and turns inbound
//! frames into a simplified event stream.
//!
//! ## Architecture
//!
//! - **Transport**: owner-side handle; `connect`, `send`, `close`
//! - **Connection task**: owns the socket, reconnects when it drops
//! - **ReconnectPolicy**: fixed-interval retries, optionally capped
//!
//! ## Usage
//!
//! ```rust,no_run
//! use chatline::protocol::QuestionMode;
//! use chatline::transport::{ReconnectPolicy, Transport, TransportEvent};
//!
//! # async fn run() -> Result<(), Box<dyn std::error::Error>> {
//! let (mut transport, mut events) = Transport::new(ReconnectPolicy::default());
//! transport.connect("ws://localhost:8000/ws")?;
//!
//! while let Some(event) = events.recv().await {
//!     match event {
//!         TransportEvent::Connected => transport.send("2+2?", QuestionMode::Auto)?,
//!         TransportEvent::Stream(event) => println!("{:?}", event),
//!         _ => {}
//!     }
//! }
//! # Ok(())
//! # }
//! ```

mod client;
mod error;
mod events;
mod policy;

pub use client::Transport;
pub use error::{TransportError, TransportResult};
pub use events::{ConnectionState, TransportEvent};
pub use policy::ReconnectPolicy;
