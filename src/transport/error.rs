//! Transport error types

use thiserror::Error;

/// Errors returned by the transport handle
///
/// None of these are fatal: a dropped connection is retried by the
/// connection task according to its reconnect policy.
#[derive(Error, Debug)]
pub enum TransportError {
    /// Endpoint is not a usable websocket URL
    #[error("Invalid endpoint {endpoint}: {reason}")]
    InvalidEndpoint { endpoint: String, reason: String },

    /// No open connection to send on
    #[error("Socket not ready")]
    NotReady,

    /// Outgoing frame could not be serialized
    #[error("Failed to encode frame: {0}")]
    Encode(#[from] serde_json::Error),

    /// The connection task is gone
    #[error("Connection task has stopped")]
    ChannelClosed,
}

/// Result type alias for transport operations
pub type TransportResult<T> = Result<T, TransportError>;
