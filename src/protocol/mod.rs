//! Wire Protocol
//!
//! The backend speaks JSON text frames over a websocket.
//!
//! ```text
//! client -> backend   {"type": "auto" | "masked", "question": "..."}
//! backend -> client   {"answer": "..."}
//! ```
//!
//! An `answer` of `""` ends the current answer. Anything else that arrives on
//! the socket (for example the backend's plain-text `Error: ...` replies) is a
//! [`ProtocolError`] and is dropped by the transport.

mod messages;

pub use messages::{
    parse_inbound, IncomingFrame, OutgoingFrame, ProtocolError, QuestionMode, StreamEvent,
};
