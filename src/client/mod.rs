//! The voice stream client.
//!
//! [`VoiceStreamClient`] owns the connection lifecycle and multiplexes
//! audio frames, text, and control commands onto one ordered channel to
//! the backend. All operations return immediately; the resulting state
//! transitions are observed through the state watch and the session
//! event stream, never through a blocking return value.

pub mod backoff;
mod connection;
pub mod session;
pub mod state;

pub use session::{
    Command, Outbound, SessionContext, SessionCore, SessionEvent, SessionSnapshot,
};
pub use state::ConnectionState;

use std::sync::Arc;

use parking_lot::Mutex;
use tokio::sync::{mpsc, oneshot, watch};
use tokio::task::JoinHandle;

use crate::audio::frame::AudioFrame;
use crate::config::VoiceClientConfig;
use crate::error::{VoiceError, VoiceResult};

/// Client for one logical voice session with the backend.
///
/// Must be used from within a tokio runtime: `connect()` spawns the
/// connection actor onto the current runtime.
pub struct VoiceStreamClient {
    config: VoiceClientConfig,
    core: Arc<Mutex<SessionCore>>,
    state_tx: Arc<watch::Sender<ConnectionState>>,
    state_rx: watch::Receiver<ConnectionState>,
    event_tx: mpsc::UnboundedSender<SessionEvent>,
    event_rx: Option<mpsc::UnboundedReceiver<SessionEvent>>,
    cmd_tx: Option<mpsc::UnboundedSender<Command>>,
    shutdown_tx: Option<oneshot::Sender<()>>,
    actor: Option<JoinHandle<()>>,
}

impl VoiceStreamClient {
    pub fn new(config: VoiceClientConfig) -> Self {
        let (state_tx, state_rx) = watch::channel(ConnectionState::Disconnected);
        let (event_tx, event_rx) = mpsc::unbounded_channel();
        Self {
            config,
            core: Arc::new(Mutex::new(SessionCore::new())),
            state_tx: Arc::new(state_tx),
            state_rx,
            event_tx,
            event_rx: Some(event_rx),
            cmd_tx: None,
            shutdown_tx: None,
            actor: None,
        }
    }

    /// Begin a new session with the given context.
    ///
    /// Returns immediately after spawning the connection actor; watch
    /// the state stream for `Connecting → Connected` (or `Error`).
    /// Rejected while a session is already live.
    pub fn connect(&mut self, context: SessionContext) -> VoiceResult<()> {
        if self.core.lock().state().is_live() {
            return Err(VoiceError::Rejected {
                operation: "connect",
                state: self.core.lock().state().name().to_string(),
            });
        }
        self.config.endpoint_url()?;

        self.core.lock().begin_connect(context)?;
        self.publish();

        let (cmd_tx, cmd_rx) = mpsc::unbounded_channel();
        let (shutdown_tx, shutdown_rx) = oneshot::channel();
        self.cmd_tx = Some(cmd_tx);
        self.shutdown_tx = Some(shutdown_tx);
        self.actor = Some(tokio::spawn(connection::run_session(
            self.config.clone(),
            self.core.clone(),
            cmd_rx,
            self.state_tx.clone(),
            self.event_tx.clone(),
            shutdown_rx,
        )));
        Ok(())
    }

    /// End the session. Terminal: no further events are delivered until
    /// a new `connect()` begins a new session.
    pub fn disconnect(&mut self) {
        if let Some(shutdown_tx) = self.shutdown_tx.take() {
            let _ = shutdown_tx.send(());
        }
        self.core.lock().force_disconnect();
        self.publish();
        self.cmd_tx = None;
    }

    /// Queue one PCM16 frame for transmission.
    pub fn send_audio(&self, frame: AudioFrame) -> VoiceResult<()> {
        self.send_command("send_audio", Command::SendAudio(frame))
    }

    /// Queue a text message for the current (or a new) turn.
    pub fn send_text(&self, content: impl Into<String>) -> VoiceResult<()> {
        self.send_command("send_text", Command::SendText(content.into()))
    }

    /// Mark the end of the user's speech for this turn.
    pub fn end_audio(&self) -> VoiceResult<()> {
        self.send_command("end_audio", Command::EndAudio)
    }

    /// Best-effort abort of the current turn.
    pub fn cancel(&self) -> VoiceResult<()> {
        self.send_command("cancel", Command::Cancel)
    }

    /// Switch the backend mode for subsequent turns.
    pub fn set_mode(&self, mode_id: impl Into<String>) -> VoiceResult<()> {
        self.send_command("set_mode", Command::SetMode(mode_id.into()))
    }

    /// Update the local/cloud routing hint.
    pub fn set_prefer_local(&self, enabled: bool) -> VoiceResult<()> {
        self.send_command("set_prefer_local", Command::SetPreferLocal(enabled))
    }

    /// Toggle wake-word listening on the backend.
    pub fn toggle_wake_word(&self) -> VoiceResult<()> {
        self.send_command("toggle_wake_word", Command::ToggleWakeWord)
    }

    /// Current connection state.
    pub fn state(&self) -> ConnectionState {
        self.state_rx.borrow().clone()
    }

    /// Subscribe to connection state changes.
    pub fn subscribe_state(&self) -> watch::Receiver<ConnectionState> {
        self.state_rx.clone()
    }

    /// Take the session event stream. Yields `None` after the first call;
    /// there is exactly one consumer.
    pub fn events(&mut self) -> Option<mpsc::UnboundedReceiver<SessionEvent>> {
        self.event_rx.take()
    }

    /// Point-in-time snapshot of the full session for UI display.
    pub fn snapshot(&self) -> SessionSnapshot {
        self.core.lock().snapshot()
    }

    fn send_command(&self, operation: &'static str, command: Command) -> VoiceResult<()> {
        let Some(cmd_tx) = &self.cmd_tx else {
            return Err(self.rejected(operation));
        };
        cmd_tx.send(command).map_err(|_| self.rejected(operation))
    }

    fn rejected(&self, operation: &'static str) -> VoiceError {
        VoiceError::Rejected {
            operation,
            state: self.state().name().to_string(),
        }
    }

    fn publish(&self) {
        connection::sync_outputs(&self.core, &self.state_tx, &self.event_tx);
    }
}

impl Drop for VoiceStreamClient {
    fn drop(&mut self) {
        if let Some(shutdown_tx) = self.shutdown_tx.take() {
            let _ = shutdown_tx.send(());
        }
        if let Some(actor) = self.actor.take() {
            actor.abort();
        }
    }
}
