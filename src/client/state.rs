//! Connection state machine.
//!
//! States form a tagged union with a pure transition function; the
//! session core applies transitions and rejects anything not in the
//! table without mutating state.

use serde::Serialize;

/// Connection state of a voice session. Exactly one is active.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "state", rename_all = "lowercase")]
pub enum ConnectionState {
    /// Initial state; also terminal after an explicit disconnect
    Disconnected,
    /// Dialing and awaiting the capabilities handshake
    Connecting,
    /// Session established, idle between turns
    Connected,
    /// Client is streaming user audio for the current turn
    Listening,
    /// Backend is generating the reply for the current turn
    Responding,
    /// Transport or fatal application failure; reconnection may follow
    Error { message: String },
}

impl ConnectionState {
    /// Lowercase state name as surfaced to the UI.
    pub fn name(&self) -> &'static str {
        match self {
            ConnectionState::Disconnected => "disconnected",
            ConnectionState::Connecting => "connecting",
            ConnectionState::Connected => "connected",
            ConnectionState::Listening => "listening",
            ConnectionState::Responding => "responding",
            ConnectionState::Error { .. } => "error",
        }
    }

    /// Whether a turn is currently in flight.
    pub fn in_turn(&self) -> bool {
        matches!(
            self,
            ConnectionState::Listening | ConnectionState::Responding
        )
    }

    /// Whether the session holds a live transport.
    pub fn is_live(&self) -> bool {
        matches!(
            self,
            ConnectionState::Connecting
                | ConnectionState::Connected
                | ConnectionState::Listening
                | ConnectionState::Responding
        )
    }
}

impl std::fmt::Display for ConnectionState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

/// Inputs that may move the state machine.
#[derive(Debug, Clone, PartialEq)]
pub(crate) enum Transition {
    /// connect() issued by the caller
    ConnectRequested,
    /// Capabilities received, handshake complete
    HandshakeCompleted,
    /// First audio/text of a turn accepted
    TurnStarted,
    /// endAudio sent or backend closed the user's speech segment
    SpeechEnded,
    /// Backend reported the turn complete
    TurnCompleted,
    /// Socket closed, malformed traffic, timeout, or fatal backend error
    Failed(String),
    /// Automatic or user-triggered reconnect attempt beginning
    ReconnectStarted,
    /// cancel() issued; turn aborted, back to idle
    Cancelled,
    /// disconnect() issued; terminal for this session
    DisconnectRequested,
}

/// Pure transition function. Returns the successor state, or `None` when
/// the input is not valid in the given state (callers log and keep the
/// current state untouched).
pub(crate) fn apply(state: &ConnectionState, transition: &Transition) -> Option<ConnectionState> {
    use ConnectionState as S;
    use Transition as T;

    match (state, transition) {
        (S::Disconnected, T::ConnectRequested) => Some(S::Connecting),
        (S::Error { .. }, T::ConnectRequested) => Some(S::Connecting),
        (S::Connecting, T::HandshakeCompleted) => Some(S::Connected),
        (S::Connected, T::TurnStarted) => Some(S::Listening),
        (S::Listening, T::SpeechEnded) => Some(S::Responding),
        (S::Responding, T::TurnCompleted) => Some(S::Connected),
        (S::Connected | S::Listening | S::Responding, T::Cancelled) => Some(S::Connected),
        (S::Error { .. }, T::ReconnectStarted) => Some(S::Connecting),
        (S::Disconnected, T::Failed(_)) => None,
        (_, T::Failed(message)) => Some(S::Error {
            message: message.clone(),
        }),
        (_, T::DisconnectRequested) => Some(S::Disconnected),
        _ => None,
    }
}
