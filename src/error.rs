//! Error types for the voice streaming client.
//!
//! The taxonomy follows the recovery boundaries of the system: capture
//! errors keep the session alive, transport errors drive reconnection,
//! protocol violations are logged and discarded, and application errors
//! end a turn or a connection depending on their `fatal` flag.

use thiserror::Error;

/// Error type for voice client operations
#[derive(Debug, Clone, Error)]
pub enum VoiceError {
    /// Microphone or audio-host failure; capture does not start
    #[error("Capture error: {0}")]
    Capture(String),

    /// Could not establish or complete the WebSocket handshake
    #[error("Connection failed: {0}")]
    ConnectionFailed(String),

    /// Transport-level failure on an established connection
    #[error("Network error: {0}")]
    Network(String),

    /// Inbound message violated the wire protocol
    #[error("Protocol error: {0}")]
    Protocol(String),

    /// Backend-reported application error
    #[error("Backend error: {0}")]
    Application(String),

    /// Operation not valid in the current connection state
    #[error("{operation} is not allowed while {state}")]
    Rejected {
        operation: &'static str,
        state: String,
    },

    /// Invalid client configuration
    #[error("Configuration error: {0}")]
    Configuration(String),
}

/// Result type for voice client operations
pub type VoiceResult<T> = Result<T, VoiceError>;
