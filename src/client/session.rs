//! Session core: the I/O-free heart of the voice client.
//!
//! `SessionCore` owns the connection state machine, the transcript and
//! response accumulators, the turn counter, and the tool tracker. The
//! connection actor feeds it caller commands and inbound server events;
//! everything observable comes back out as [`SessionEvent`]s plus a
//! queryable [`SessionSnapshot`]. Keeping this free of sockets and
//! timers is what makes the protocol semantics directly testable.

use bytes::Bytes;
use tracing::{debug, warn};
use uuid::Uuid;

use super::state::{apply, ConnectionState, Transition};
use crate::audio::frame::AudioFrame;
use crate::error::{VoiceError, VoiceResult};
use crate::protocol::{Capabilities, ClientMessage, ServerEvent};
use crate::tools::{ToolExecution, ToolExecutionTracker, ToolStatus, ToolSummary};

/// Identity and routing hints for one connection.
///
/// Immutable for the lifetime of a connection; a reconnect re-sends the
/// same conversation id so the backend can resume context. Runtime
/// toggles (`set_mode`, `set_prefer_local`, `toggle_wake_word`) update
/// the session's current values without touching the original context.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionContext {
    pub conversation_id: String,
    pub user_id: String,
    pub mode: String,
    pub prefer_local: bool,
    pub wake_word_enabled: bool,
}

impl SessionContext {
    /// Context for a fresh conversation with a generated id.
    pub fn new(user_id: impl Into<String>, mode: impl Into<String>) -> Self {
        Self {
            conversation_id: Uuid::new_v4().to_string(),
            user_id: user_id.into(),
            mode: mode.into(),
            prefer_local: false,
            wake_word_enabled: false,
        }
    }

    /// Context resuming an existing conversation.
    pub fn resume(
        conversation_id: impl Into<String>,
        user_id: impl Into<String>,
        mode: impl Into<String>,
    ) -> Self {
        Self {
            conversation_id: conversation_id.into(),
            user_id: user_id.into(),
            mode: mode.into(),
            prefer_local: false,
            wake_word_enabled: false,
        }
    }

    pub fn with_prefer_local(mut self, prefer_local: bool) -> Self {
        self.prefer_local = prefer_local;
        self
    }

    pub fn with_wake_word(mut self, enabled: bool) -> Self {
        self.wake_word_enabled = enabled;
        self
    }
}

/// Caller operations forwarded to the session.
#[derive(Debug)]
pub enum Command {
    SendAudio(AudioFrame),
    SendText(String),
    EndAudio,
    Cancel,
    SetMode(String),
    SetPreferLocal(bool),
    ToggleWakeWord,
    Disconnect,
}

impl Command {
    fn operation(&self) -> &'static str {
        match self {
            Command::SendAudio(_) => "send_audio",
            Command::SendText(_) => "send_text",
            Command::EndAudio => "end_audio",
            Command::Cancel => "cancel",
            Command::SetMode(_) => "set_mode",
            Command::SetPreferLocal(_) => "set_prefer_local",
            Command::ToggleWakeWord => "toggle_wake_word",
            Command::Disconnect => "disconnect",
        }
    }
}

/// What a command puts on the wire.
#[derive(Debug, Clone, PartialEq)]
pub enum Outbound {
    /// JSON control message
    Message(ClientMessage),
    /// Binary PCM16 frame
    Audio(Bytes),
}

/// Observable session events, delivered in order to the UI.
#[derive(Debug, Clone, PartialEq)]
pub enum SessionEvent {
    StateChanged(ConnectionState),
    /// Handshake complete; backend capabilities received
    Ready(Capabilities),
    TranscriptDelta { text: String },
    TranscriptFinal { text: String },
    ResponseDelta { delta: String },
    ResponseFinal { text: String, tier: Option<String> },
    ToolUpdate { id: String, status: ToolStatus },
    TurnComplete { turn: u64 },
    BackendError { message: String, fatal: bool },
}

/// Point-in-time copy of the session for UI display.
#[derive(Debug, Clone)]
pub struct SessionSnapshot {
    pub state: ConnectionState,
    pub conversation_id: Option<String>,
    pub mode: String,
    pub prefer_local: bool,
    pub wake_word_enabled: bool,
    pub capabilities: Option<Capabilities>,
    pub transcript: String,
    pub response: String,
    pub tier: Option<String>,
    pub turn: u64,
    pub retry_attempt: u32,
    pub tools: Vec<ToolExecution>,
    pub tool_summary: ToolSummary,
}

/// The session state machine and its turn-scoped accumulators.
pub struct SessionCore {
    state: ConnectionState,
    context: Option<SessionContext>,
    mode: String,
    prefer_local: bool,
    wake_word_enabled: bool,
    capabilities: Option<Capabilities>,
    transcript: String,
    response: String,
    tier: Option<String>,
    turn: u64,
    turn_cancelled: bool,
    tools: ToolExecutionTracker,
    retry_attempt: u32,
    pending: Vec<SessionEvent>,
}

impl Default for SessionCore {
    fn default() -> Self {
        Self::new()
    }
}

impl SessionCore {
    pub fn new() -> Self {
        Self {
            state: ConnectionState::Disconnected,
            context: None,
            mode: String::new(),
            prefer_local: false,
            wake_word_enabled: false,
            capabilities: None,
            transcript: String::new(),
            response: String::new(),
            tier: None,
            turn: 0,
            turn_cancelled: false,
            tools: ToolExecutionTracker::new(),
            retry_attempt: 0,
            pending: Vec::new(),
        }
    }

    pub fn state(&self) -> &ConnectionState {
        &self.state
    }

    pub fn context(&self) -> Option<&SessionContext> {
        self.context.as_ref()
    }

    pub fn retry_attempt(&self) -> u32 {
        self.retry_attempt
    }

    /// Take all events produced since the last drain, in order.
    pub fn drain_events(&mut self) -> Vec<SessionEvent> {
        std::mem::take(&mut self.pending)
    }

    // ── Lifecycle ───────────────────────────────────────────────────────

    /// Begin a new session from `Disconnected` (or `Error`, for a
    /// user-triggered retry). Replaces the session context wholesale.
    pub fn begin_connect(&mut self, context: SessionContext) -> VoiceResult<()> {
        if !self.transition(Transition::ConnectRequested) {
            return Err(VoiceError::Rejected {
                operation: "connect",
                state: self.state.name().to_string(),
            });
        }
        self.mode = context.mode.clone();
        self.prefer_local = context.prefer_local;
        self.wake_word_enabled = context.wake_word_enabled;
        self.context = Some(context);
        self.capabilities = None;
        self.retry_attempt = 0;
        self.reset_turn_outputs();
        Ok(())
    }

    /// Begin an automatic reconnect attempt with the existing context.
    /// Returns `false` if the session is not in the error state.
    pub fn begin_reconnect(&mut self) -> bool {
        if self.context.is_none() {
            return false;
        }
        if !self.transition(Transition::ReconnectStarted) {
            return false;
        }
        self.retry_attempt += 1;
        true
    }

    /// The handshake message for the current context.
    pub fn connect_message(&self) -> Option<ClientMessage> {
        self.context.as_ref().map(|ctx| ClientMessage::Connect {
            conversation_id: ctx.conversation_id.clone(),
            user_id: ctx.user_id.clone(),
            mode: self.mode.clone(),
            prefer_local: self.prefer_local,
            wake_word_enabled: self.wake_word_enabled,
        })
    }

    /// Transport-level failure: socket closed, malformed traffic, or a
    /// timeout. Drives the machine to `Error`; the actor owns retries.
    pub fn transport_failed(&mut self, reason: &str) {
        if !self.transition(Transition::Failed(reason.to_string())) {
            debug!("transport failure in {} ignored: {reason}", self.state);
        }
    }

    /// Soft turn timeout: abort a stuck `Responding` turn, keep the
    /// connection.
    pub fn turn_timed_out(&mut self) {
        if matches!(self.state, ConnectionState::Responding) {
            self.turn_cancelled = true;
            self.transition(Transition::Cancelled);
            self.pending.push(SessionEvent::BackendError {
                message: "turn timed out".to_string(),
                fatal: false,
            });
        }
    }

    /// Explicit disconnect: terminal for this session, no further events.
    pub fn force_disconnect(&mut self) {
        self.transition(Transition::DisconnectRequested);
    }

    // ── Caller commands ─────────────────────────────────────────────────

    /// Apply a caller command, returning what to put on the wire.
    ///
    /// Commands invalid in the current state are rejected without
    /// mutating anything.
    pub fn command(&mut self, command: Command) -> VoiceResult<Option<Outbound>> {
        if matches!(command, Command::Disconnect) {
            self.force_disconnect();
            return Ok(None);
        }

        if !self.state.is_live() {
            return Err(self.rejected(command.operation()));
        }

        match command {
            Command::SendAudio(frame) => {
                match self.state {
                    ConnectionState::Connected => {
                        self.start_turn();
                        self.transition(Transition::TurnStarted);
                    }
                    ConnectionState::Listening => {}
                    _ => return Err(self.rejected("send_audio")),
                }
                Ok(Some(Outbound::Audio(frame.to_le_bytes())))
            }
            Command::SendText(content) => {
                match self.state {
                    ConnectionState::Connected => {
                        self.start_turn();
                        self.transition(Transition::TurnStarted);
                    }
                    ConnectionState::Listening => {}
                    _ => return Err(self.rejected("send_text")),
                }
                Ok(Some(Outbound::Message(ClientMessage::Text { content })))
            }
            Command::EndAudio => {
                if !matches!(self.state, ConnectionState::Listening) {
                    return Err(self.rejected("end_audio"));
                }
                self.transition(Transition::SpeechEnded);
                Ok(Some(Outbound::Message(ClientMessage::EndAudio)))
            }
            Command::Cancel => {
                if !self.transition(Transition::Cancelled) {
                    return Err(self.rejected("cancel"));
                }
                // Late events for this turn no longer match and are dropped
                self.turn_cancelled = true;
                Ok(Some(Outbound::Message(ClientMessage::Cancel)))
            }
            Command::SetMode(mode_id) => {
                self.mode = mode_id.clone();
                Ok(Some(Outbound::Message(ClientMessage::SetMode { mode_id })))
            }
            Command::SetPreferLocal(enabled) => {
                self.prefer_local = enabled;
                Ok(Some(Outbound::Message(ClientMessage::SetPreferLocal {
                    enabled,
                })))
            }
            Command::ToggleWakeWord => {
                self.wake_word_enabled = !self.wake_word_enabled;
                Ok(Some(Outbound::Message(ClientMessage::ToggleWakeWord)))
            }
            Command::Disconnect => unreachable!("handled above"),
        }
    }

    // ── Inbound events ──────────────────────────────────────────────────

    /// Apply one demultiplexed backend event.
    ///
    /// Protocol violations (events in the wrong state, unknown ids,
    /// status regressions, stale turns) are logged and discarded; they
    /// never crash the client or corrupt state.
    pub fn apply_event(&mut self, event: ServerEvent) {
        if matches!(self.state, ConnectionState::Disconnected) {
            return;
        }

        if matches!(self.state, ConnectionState::Connecting) {
            match event {
                ServerEvent::Capabilities { capabilities } => {
                    self.complete_handshake(capabilities);
                }
                other => warn!("event before handshake ignored: {other:?}"),
            }
            return;
        }

        match event {
            ServerEvent::Capabilities { .. } => {
                warn!("duplicate capabilities event ignored");
            }
            ServerEvent::TranscriptPartial { text, turn } => {
                if self.is_stale(turn) {
                    debug!("stale transcript.partial dropped");
                    return;
                }
                if matches!(self.state, ConnectionState::Listening) {
                    self.transcript.push_str(&text);
                    self.pending.push(SessionEvent::TranscriptDelta { text });
                } else {
                    debug!("transcript.partial outside listening dropped");
                }
            }
            ServerEvent::TranscriptFinal { text, turn } => {
                if self.is_stale(turn) {
                    debug!("stale transcript.final dropped");
                    return;
                }
                match self.state {
                    ConnectionState::Listening => {
                        self.transcript = text.clone();
                        self.transition(Transition::SpeechEnded);
                        self.pending.push(SessionEvent::TranscriptFinal { text });
                    }
                    ConnectionState::Responding => {
                        self.transcript = text.clone();
                        self.pending.push(SessionEvent::TranscriptFinal { text });
                    }
                    _ => debug!("transcript.final outside a turn dropped"),
                }
            }
            ServerEvent::ResponsePartial { delta, turn } => {
                if self.is_stale(turn) {
                    debug!("stale response.partial dropped");
                    return;
                }
                match self.state {
                    ConnectionState::Listening => {
                        // Backend started responding before end_audio
                        // reached it; treat as end of speech.
                        self.transition(Transition::SpeechEnded);
                        self.response.push_str(&delta);
                        self.pending.push(SessionEvent::ResponseDelta { delta });
                    }
                    ConnectionState::Responding => {
                        self.response.push_str(&delta);
                        self.pending.push(SessionEvent::ResponseDelta { delta });
                    }
                    _ => debug!("response.partial outside a turn dropped"),
                }
            }
            ServerEvent::ResponseFinal { text, tier, turn } => {
                if self.is_stale(turn) {
                    debug!("stale response.final dropped");
                    return;
                }
                match self.state {
                    ConnectionState::Listening | ConnectionState::Responding => {
                        if matches!(self.state, ConnectionState::Listening) {
                            self.transition(Transition::SpeechEnded);
                        }
                        self.response = text.clone();
                        if tier.is_some() {
                            self.tier = tier.clone();
                        }
                        self.transition(Transition::TurnCompleted);
                        self.pending.push(SessionEvent::ResponseFinal { text, tier });
                        self.pending.push(SessionEvent::TurnComplete { turn: self.turn });
                    }
                    _ => debug!("response.final outside a turn dropped"),
                }
            }
            ServerEvent::ToolStarted {
                id,
                name,
                args,
                turn,
            } => {
                if self.is_stale(turn) {
                    debug!("stale tool.started dropped");
                    return;
                }
                if self.tools.start(id.clone(), name, args) {
                    self.pending.push(SessionEvent::ToolUpdate {
                        id,
                        status: ToolStatus::Pending,
                    });
                }
            }
            ServerEvent::ToolProgress { id } => {
                if self.turn_cancelled {
                    debug!("tool.progress after cancel dropped");
                    return;
                }
                if self.tools.progress(&id) {
                    self.pending.push(SessionEvent::ToolUpdate {
                        id,
                        status: ToolStatus::Running,
                    });
                }
            }
            ServerEvent::ToolCompleted { id, result } => {
                if self.turn_cancelled {
                    debug!("tool.completed after cancel dropped");
                    return;
                }
                if self.tools.complete(&id, result) {
                    self.pending.push(SessionEvent::ToolUpdate {
                        id,
                        status: ToolStatus::Completed,
                    });
                }
            }
            ServerEvent::ToolError { id, error } => {
                if self.turn_cancelled {
                    debug!("tool.error after cancel dropped");
                    return;
                }
                if self.tools.fail(&id, error) {
                    self.pending.push(SessionEvent::ToolUpdate {
                        id,
                        status: ToolStatus::Error,
                    });
                }
            }
            ServerEvent::Tier { tier } => {
                if !self.turn_cancelled {
                    self.tier = Some(tier);
                }
            }
            ServerEvent::Error { message, fatal } => {
                self.pending.push(SessionEvent::BackendError {
                    message: message.clone(),
                    fatal,
                });
                if fatal {
                    self.transition(Transition::Failed(message));
                } else if self.state.in_turn() {
                    // Ends the current turn only
                    self.turn_cancelled = true;
                    self.transition(Transition::Cancelled);
                }
            }
        }
    }

    // ── Snapshot ────────────────────────────────────────────────────────

    pub fn snapshot(&self) -> SessionSnapshot {
        SessionSnapshot {
            state: self.state.clone(),
            conversation_id: self.context.as_ref().map(|c| c.conversation_id.clone()),
            mode: self.mode.clone(),
            prefer_local: self.prefer_local,
            wake_word_enabled: self.wake_word_enabled,
            capabilities: self.capabilities,
            transcript: self.transcript.clone(),
            response: self.response.clone(),
            tier: self.tier.clone(),
            turn: self.turn,
            retry_attempt: self.retry_attempt,
            tools: self.tools.executions().to_vec(),
            tool_summary: self.tools.summary(),
        }
    }

    // ── Internals ───────────────────────────────────────────────────────

    fn complete_handshake(&mut self, capabilities: Capabilities) {
        self.capabilities = Some(capabilities);
        self.retry_attempt = 0;
        self.reset_turn_outputs();
        self.transition(Transition::HandshakeCompleted);
        self.pending.push(SessionEvent::Ready(capabilities));
    }

    fn start_turn(&mut self) {
        self.turn += 1;
        self.turn_cancelled = false;
        self.reset_turn_outputs();
    }

    fn reset_turn_outputs(&mut self) {
        self.transcript.clear();
        self.response.clear();
        self.tier = None;
        self.tools.clear();
    }

    /// An event is stale when its turn tag does not match the current
    /// turn, or when it is untagged and the current turn was cancelled.
    fn is_stale(&self, tag: Option<u64>) -> bool {
        match tag {
            Some(turn) => turn != self.turn || self.turn_cancelled,
            None => self.turn_cancelled,
        }
    }

    fn transition(&mut self, transition: Transition) -> bool {
        match apply(&self.state, &transition) {
            Some(next) => {
                if next != self.state {
                    debug!("state {} -> {}", self.state, next);
                    self.state = next;
                    self.pending
                        .push(SessionEvent::StateChanged(self.state.clone()));
                } else {
                    self.state = next;
                }
                true
            }
            None => {
                warn!("transition {transition:?} invalid in {}", self.state);
                false
            }
        }
    }

    fn rejected(&self, operation: &'static str) -> VoiceError {
        VoiceError::Rejected {
            operation,
            state: self.state.name().to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::audio::frame::FRAME_SAMPLES;

    fn test_context() -> SessionContext {
        SessionContext::resume("conv-1", "user-1", "assistant")
    }

    fn capabilities() -> ServerEvent {
        ServerEvent::Capabilities {
            capabilities: Capabilities {
                stt: true,
                tts: true,
                streaming: true,
                wake_word: true,
            },
        }
    }

    fn connected_core() -> SessionCore {
        let mut core = SessionCore::new();
        core.begin_connect(test_context()).unwrap();
        core.apply_event(capabilities());
        core.drain_events();
        core
    }

    fn frame() -> AudioFrame {
        AudioFrame::from_samples(vec![0; FRAME_SAMPLES]).unwrap()
    }

    #[test]
    fn handshake_reaches_connected_and_reports_ready() {
        let mut core = SessionCore::new();
        core.begin_connect(test_context()).unwrap();
        assert_eq!(core.state(), &ConnectionState::Connecting);

        core.apply_event(capabilities());
        assert_eq!(core.state(), &ConnectionState::Connected);

        let events = core.drain_events();
        assert!(events
            .iter()
            .any(|e| matches!(e, SessionEvent::Ready(c) if c.stt)));
    }

    #[test]
    fn commands_are_rejected_while_disconnected_without_mutation() {
        let mut core = SessionCore::new();
        let err = core.command(Command::SendAudio(frame())).unwrap_err();
        assert!(matches!(err, VoiceError::Rejected { .. }));
        assert_eq!(core.state(), &ConnectionState::Disconnected);
        assert!(core.drain_events().is_empty());
    }

    #[test]
    fn first_audio_starts_the_turn() {
        let mut core = connected_core();
        let out = core.command(Command::SendAudio(frame())).unwrap();
        assert!(matches!(out, Some(Outbound::Audio(bytes)) if bytes.len() == FRAME_SAMPLES * 2));
        assert_eq!(core.state(), &ConnectionState::Listening);

        // Subsequent frames do not retrigger the transition
        core.drain_events();
        core.command(Command::SendAudio(frame())).unwrap();
        assert!(core.drain_events().is_empty());
    }

    #[test]
    fn end_audio_moves_to_responding_only_from_listening() {
        let mut core = connected_core();
        assert!(core.command(Command::EndAudio).is_err());

        core.command(Command::SendAudio(frame())).unwrap();
        core.command(Command::EndAudio).unwrap();
        assert_eq!(core.state(), &ConnectionState::Responding);
    }

    #[test]
    fn partials_accumulate_and_finals_close() {
        let mut core = connected_core();
        core.command(Command::SendAudio(frame())).unwrap();

        core.apply_event(ServerEvent::TranscriptPartial {
            text: "turn on ".into(),
            turn: None,
        });
        core.apply_event(ServerEvent::TranscriptPartial {
            text: "the printer".into(),
            turn: None,
        });
        assert_eq!(core.snapshot().transcript, "turn on the printer");

        core.apply_event(ServerEvent::TranscriptFinal {
            text: "turn on the printer".into(),
            turn: None,
        });
        assert_eq!(core.state(), &ConnectionState::Responding);

        core.apply_event(ServerEvent::ResponsePartial {
            delta: "Powering ".into(),
            turn: None,
        });
        core.apply_event(ServerEvent::ResponsePartial {
            delta: "up.".into(),
            turn: None,
        });
        core.apply_event(ServerEvent::ResponseFinal {
            text: "Powering up.".into(),
            tier: Some("local".into()),
            turn: None,
        });

        assert_eq!(core.state(), &ConnectionState::Connected);
        let snapshot = core.snapshot();
        assert_eq!(snapshot.response, "Powering up.");
        assert_eq!(snapshot.tier.as_deref(), Some("local"));
    }

    #[test]
    fn new_turn_resets_accumulators() {
        let mut core = connected_core();
        core.command(Command::SendAudio(frame())).unwrap();
        core.apply_event(ServerEvent::TranscriptFinal {
            text: "first".into(),
            turn: None,
        });
        core.apply_event(ServerEvent::ResponseFinal {
            text: "first reply".into(),
            tier: None,
            turn: None,
        });

        core.command(Command::SendAudio(frame())).unwrap();
        let snapshot = core.snapshot();
        assert_eq!(snapshot.transcript, "");
        assert_eq!(snapshot.response, "");
        assert!(snapshot.tools.is_empty());
        assert_eq!(snapshot.turn, 2);
    }

    #[test]
    fn cancel_is_idempotent_and_discards_stragglers() {
        let mut core = connected_core();
        core.command(Command::SendAudio(frame())).unwrap();
        core.command(Command::EndAudio).unwrap();
        core.apply_event(ServerEvent::ResponsePartial {
            delta: "Let me ".into(),
            turn: Some(1),
        });

        core.command(Command::Cancel).unwrap();
        assert_eq!(core.state(), &ConnectionState::Connected);
        let after_first = core.snapshot();

        core.command(Command::Cancel).unwrap();
        assert_eq!(core.state(), &ConnectionState::Connected);
        assert_eq!(core.snapshot().response, after_first.response);

        // Late events for the cancelled turn are silently dropped
        core.drain_events();
        core.apply_event(ServerEvent::ResponsePartial {
            delta: "think".into(),
            turn: Some(1),
        });
        core.apply_event(ServerEvent::ResponseFinal {
            text: "too late".into(),
            tier: None,
            turn: Some(1),
        });
        assert!(core.drain_events().is_empty());
        assert_eq!(core.snapshot().response, "Let me ");
        assert_eq!(core.state(), &ConnectionState::Connected);
    }

    #[test]
    fn events_for_a_different_turn_are_dropped() {
        let mut core = connected_core();
        core.command(Command::SendAudio(frame())).unwrap();
        core.drain_events();

        core.apply_event(ServerEvent::TranscriptPartial {
            text: "ghost".into(),
            turn: Some(7),
        });
        assert!(core.drain_events().is_empty());
        assert_eq!(core.snapshot().transcript, "");
    }

    #[test]
    fn text_input_starts_a_turn_from_connected() {
        let mut core = connected_core();
        let out = core.command(Command::SendText("hello".into())).unwrap();
        assert_eq!(
            out,
            Some(Outbound::Message(ClientMessage::Text {
                content: "hello".into()
            }))
        );
        assert_eq!(core.state(), &ConnectionState::Listening);

        core.apply_event(ServerEvent::ResponsePartial {
            delta: "Hi".into(),
            turn: None,
        });
        // Response promotes a text turn straight to responding
        assert_eq!(core.state(), &ConnectionState::Responding);
    }

    #[test]
    fn non_fatal_backend_error_ends_only_the_turn() {
        let mut core = connected_core();
        core.command(Command::SendAudio(frame())).unwrap();
        core.command(Command::EndAudio).unwrap();

        core.apply_event(ServerEvent::Error {
            message: "generation failed".into(),
            fatal: false,
        });
        assert_eq!(core.state(), &ConnectionState::Connected);
        let events = core.drain_events();
        assert!(events.iter().any(|e| matches!(
            e,
            SessionEvent::BackendError { fatal: false, .. }
        )));
    }

    #[test]
    fn fatal_backend_error_fails_the_connection() {
        let mut core = connected_core();
        core.apply_event(ServerEvent::Error {
            message: "session revoked".into(),
            fatal: true,
        });
        assert_eq!(core.state().name(), "error");
    }

    #[test]
    fn duplicate_capabilities_are_ignored() {
        let mut core = connected_core();
        core.apply_event(ServerEvent::Capabilities {
            capabilities: Capabilities {
                stt: false,
                tts: false,
                streaming: false,
                wake_word: false,
            },
        });
        // Original capabilities survive
        assert!(core.snapshot().capabilities.unwrap().stt);
    }

    #[test]
    fn toggles_update_session_values() {
        let mut core = connected_core();
        core.command(Command::SetPreferLocal(true)).unwrap();
        core.command(Command::SetMode("fabrication".into())).unwrap();
        core.command(Command::ToggleWakeWord).unwrap();

        let snapshot = core.snapshot();
        assert!(snapshot.prefer_local);
        assert_eq!(snapshot.mode, "fabrication");
        assert!(snapshot.wake_word_enabled);

        core.command(Command::ToggleWakeWord).unwrap();
        assert!(!core.snapshot().wake_word_enabled);
    }

    #[test]
    fn reconnect_preserves_conversation_id_and_clears_accumulators() {
        let mut core = connected_core();
        core.command(Command::SendAudio(frame())).unwrap();
        core.command(Command::EndAudio).unwrap();
        core.apply_event(ServerEvent::ResponsePartial {
            delta: "half a rep".into(),
            turn: None,
        });

        core.transport_failed("socket closed");
        assert_eq!(core.state().name(), "error");

        assert!(core.begin_reconnect());
        assert_eq!(core.retry_attempt(), 1);
        assert_eq!(core.state(), &ConnectionState::Connecting);

        core.apply_event(capabilities());
        assert_eq!(core.state(), &ConnectionState::Connected);
        let snapshot = core.snapshot();
        assert_eq!(snapshot.conversation_id.as_deref(), Some("conv-1"));
        assert_eq!(snapshot.transcript, "");
        assert_eq!(snapshot.response, "");
        assert_eq!(snapshot.retry_attempt, 0);
    }

    #[test]
    fn no_events_are_delivered_after_disconnect() {
        let mut core = connected_core();
        core.command(Command::Disconnect).unwrap();
        assert_eq!(core.state(), &ConnectionState::Disconnected);
        core.drain_events();

        core.apply_event(ServerEvent::ResponsePartial {
            delta: "ghost".into(),
            turn: None,
        });
        core.apply_event(capabilities());
        assert!(core.drain_events().is_empty());
        assert_eq!(core.state(), &ConnectionState::Disconnected);
    }

    #[test]
    fn tool_events_flow_into_the_tracker() {
        let mut core = connected_core();
        core.command(Command::SendAudio(frame())).unwrap();
        core.command(Command::EndAudio).unwrap();

        core.apply_event(ServerEvent::ToolStarted {
            id: "t1".into(),
            name: "printer_status".into(),
            args: None,
            turn: Some(1),
        });
        core.apply_event(ServerEvent::ToolProgress { id: "t1".into() });
        core.apply_event(ServerEvent::ToolCompleted {
            id: "t1".into(),
            result: Some("idle".into()),
        });

        let snapshot = core.snapshot();
        assert_eq!(snapshot.tools.len(), 1);
        assert_eq!(snapshot.tool_summary.completed, 1);

        // A started event for a stale turn is not tracked
        core.apply_event(ServerEvent::ToolStarted {
            id: "t2".into(),
            name: "ghost".into(),
            args: None,
            turn: Some(99),
        });
        assert_eq!(core.snapshot().tools.len(), 1);
    }
}
