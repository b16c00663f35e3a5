//! Transport events and connection state

use std::time::Duration;

use crate::protocol::StreamEvent;

/// Event delivered from the connection task to the transport owner
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TransportEvent {
    /// The socket is open and ready to send
    Connected,
    /// A classified answer frame
    Stream(StreamEvent),
    /// Transport-level failure; a `Disconnected` follows when the socket is gone
    Error(String),
    /// The socket closed or could not be opened
    Disconnected { reason: String },
    /// A reconnect attempt is scheduled after `delay`
    Reconnecting { attempt: u32, delay: Duration },
    /// The reconnect policy is exhausted; the task has stopped
    GaveUp { attempts: u32 },
}

/// Lifecycle of the logical connection
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionState {
    /// `connect` has not been called
    Idle,
    Connecting,
    Open,
    /// Waiting out the reconnect delay before attempt `attempt`
    Reconnecting { attempt: u32 },
    /// Closed by the owner
    Closed,
    /// Reconnect policy exhausted
    GaveUp,
}

impl ConnectionState {
    pub fn is_open(&self) -> bool {
        matches!(self, ConnectionState::Open)
    }

    /// The connection task has finished and will not reconnect
    pub fn is_terminal(&self) -> bool {
        matches!(self, ConnectionState::Closed | ConnectionState::GaveUp)
    }
}
