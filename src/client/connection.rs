//! Connection actor: WebSocket transport plus reconnection.
//!
//! One actor task runs per `connect()` call. It owns the socket for the
//! life of the session, forwarding caller commands from an ordered
//! channel, demultiplexing inbound events into the session core, and
//! enforcing the handshake, liveness, and turn timeouts. On transport
//! failure it drives the exponential-backoff reconnect loop with the
//! same session context, so the backend can resume the conversation.

use std::sync::Arc;

use bytes::Bytes;
use futures::{SinkExt, StreamExt};
use parking_lot::Mutex;
use tokio::net::TcpStream;
use tokio::sync::{mpsc, oneshot, watch};
use tokio::time::{sleep_until, timeout, Instant, MissedTickBehavior};
use tokio_tungstenite::tungstenite::protocol::Message;
use tokio_tungstenite::{connect_async, MaybeTlsStream, WebSocketStream};
use tracing::{debug, error, info, warn};

use super::session::{Command, Outbound, SessionCore, SessionEvent};
use super::state::ConnectionState;
use crate::config::VoiceClientConfig;
use crate::protocol::ServerEvent;

type WsStream = WebSocketStream<MaybeTlsStream<TcpStream>>;

/// Why one connection's event loop ended.
enum Drive {
    /// Transport failure; the session core has not been told yet
    Failed(String),
    /// Fatal backend error; the core is already in the error state
    Errored,
    /// Explicit disconnect; terminal
    Disconnected,
}

/// Publish the core's current state and drain its pending events.
pub(crate) fn sync_outputs(
    core: &Mutex<SessionCore>,
    state_tx: &watch::Sender<ConnectionState>,
    event_tx: &mpsc::UnboundedSender<SessionEvent>,
) {
    let (state, events) = {
        let mut core = core.lock();
        (core.state().clone(), core.drain_events())
    };
    state_tx.send_replace(state);
    for event in events {
        let _ = event_tx.send(event);
    }
}

/// Run one session: connect, serve, and reconnect until the session is
/// explicitly disconnected or the retry ceiling is reached.
///
/// Expects the core to already be in `Connecting` (set by `connect()`).
pub(crate) async fn run_session(
    config: VoiceClientConfig,
    core: Arc<Mutex<SessionCore>>,
    mut cmd_rx: mpsc::UnboundedReceiver<Command>,
    state_tx: Arc<watch::Sender<ConnectionState>>,
    event_tx: mpsc::UnboundedSender<SessionEvent>,
    mut shutdown_rx: oneshot::Receiver<()>,
) {
    let url = match config.endpoint_url() {
        Ok(url) => url.to_string(),
        Err(e) => {
            core.lock().transport_failed(&e.to_string());
            sync_outputs(&core, &state_tx, &event_tx);
            return;
        }
    };

    let mut first_attempt = true;
    loop {
        if !first_attempt {
            // Backoff, then move error -> connecting for the retry
            let attempt = core.lock().retry_attempt();
            if config.reconnect.exhausted(attempt) {
                warn!("reconnect attempts exhausted after {attempt} retries");
                break;
            }
            let delay = config.reconnect.delay_for_attempt(attempt);
            info!("reconnecting in {delay:?} (attempt {})", attempt + 1);

            tokio::select! {
                _ = tokio::time::sleep(delay) => {}
                _ = &mut shutdown_rx => {
                    core.lock().force_disconnect();
                    sync_outputs(&core, &state_tx, &event_tx);
                    return;
                }
                command = cmd_rx.recv() => {
                    match command {
                        Some(Command::Disconnect) | None => {
                            core.lock().force_disconnect();
                            sync_outputs(&core, &state_tx, &event_tx);
                            return;
                        }
                        Some(other) => {
                            // Everything else is invalid while in error
                            if let Err(e) = core.lock().command(other) {
                                warn!("command rejected: {e}");
                            }
                            continue;
                        }
                    }
                }
            }

            if !core.lock().begin_reconnect() {
                break;
            }
            sync_outputs(&core, &state_tx, &event_tx);
        }
        first_attempt = false;

        info!("connecting to {url}");
        let dial = timeout(config.handshake_timeout, connect_async(url.as_str())).await;
        let ws = match dial {
            Ok(Ok((ws, _response))) => ws,
            Ok(Err(e)) => {
                core.lock().transport_failed(&format!("failed to connect: {e}"));
                sync_outputs(&core, &state_tx, &event_tx);
                continue;
            }
            Err(_) => {
                core.lock().transport_failed("connection timeout");
                sync_outputs(&core, &state_tx, &event_tx);
                continue;
            }
        };

        match drive_connection(
            &config,
            &core,
            &mut cmd_rx,
            &state_tx,
            &event_tx,
            &mut shutdown_rx,
            ws,
        )
        .await
        {
            Drive::Disconnected => break,
            Drive::Failed(reason) => {
                warn!("connection lost: {reason}");
                core.lock().transport_failed(&reason);
                sync_outputs(&core, &state_tx, &event_tx);
            }
            Drive::Errored => {
                sync_outputs(&core, &state_tx, &event_tx);
            }
        }
    }

    sync_outputs(&core, &state_tx, &event_tx);
    info!("session actor terminated");
}

/// Serve one established connection until it ends.
async fn drive_connection(
    config: &VoiceClientConfig,
    core: &Arc<Mutex<SessionCore>>,
    cmd_rx: &mut mpsc::UnboundedReceiver<Command>,
    state_tx: &watch::Sender<ConnectionState>,
    event_tx: &mpsc::UnboundedSender<SessionEvent>,
    shutdown_rx: &mut oneshot::Receiver<()>,
    ws: WsStream,
) -> Drive {
    let (mut sink, mut stream) = ws.split();

    // Open the session; the capabilities event completes the handshake
    let connect_msg = core.lock().connect_message();
    let Some(connect_msg) = connect_msg else {
        return Drive::Failed("no session context".to_string());
    };
    let json = match connect_msg.to_json() {
        Ok(json) => json,
        Err(e) => return Drive::Failed(format!("failed to serialize handshake: {e}")),
    };
    if let Err(e) = sink.send(Message::Text(json.into())).await {
        return Drive::Failed(format!("handshake send failed: {e}"));
    }

    let handshake_deadline = Instant::now() + config.handshake_timeout;
    let mut last_inbound = Instant::now();
    let mut responding_since: Option<Instant> = None;
    let mut ping = tokio::time::interval(config.ping_interval);
    ping.set_missed_tick_behavior(MissedTickBehavior::Delay);

    loop {
        let phase = core.lock().state().clone();
        match phase {
            ConnectionState::Responding => {
                responding_since.get_or_insert_with(Instant::now);
            }
            _ => responding_since = None,
        }
        let connecting = matches!(phase, ConnectionState::Connecting);
        let turn_deadline = responding_since.map(|since| since + config.turn_timeout);

        tokio::select! {
            _ = &mut *shutdown_rx => {
                let _ = sink.send(Message::Close(None)).await;
                core.lock().force_disconnect();
                sync_outputs(core, state_tx, event_tx);
                return Drive::Disconnected;
            }

            command = cmd_rx.recv() => {
                let Some(command) = command else {
                    // Client handle dropped without an explicit disconnect
                    core.lock().force_disconnect();
                    sync_outputs(core, state_tx, event_tx);
                    return Drive::Disconnected;
                };
                let disconnecting = matches!(command, Command::Disconnect);
                let outbound = core.lock().command(command);
                sync_outputs(core, state_tx, event_tx);
                match outbound {
                    Ok(Some(Outbound::Message(msg))) => match msg.to_json() {
                        Ok(json) => {
                            if let Err(e) = sink.send(Message::Text(json.into())).await {
                                return Drive::Failed(format!("send failed: {e}"));
                            }
                        }
                        Err(e) => error!("failed to serialize outbound message: {e}"),
                    },
                    Ok(Some(Outbound::Audio(bytes))) => {
                        if let Err(e) = sink.send(Message::Binary(bytes)).await {
                            return Drive::Failed(format!("audio send failed: {e}"));
                        }
                    }
                    Ok(None) => {}
                    Err(e) => warn!("command rejected: {e}"),
                }
                if disconnecting {
                    let _ = sink.send(Message::Close(None)).await;
                    return Drive::Disconnected;
                }
            }

            inbound = stream.next() => {
                last_inbound = Instant::now();
                match inbound {
                    Some(Ok(Message::Text(text))) => {
                        match ServerEvent::parse(&text) {
                            Ok(event) => {
                                core.lock().apply_event(event);
                                sync_outputs(core, state_tx, event_tx);
                                if matches!(core.lock().state(), ConnectionState::Error { .. }) {
                                    return Drive::Errored;
                                }
                            }
                            Err(e) => {
                                // Malformed inbound traffic is a transport error
                                return Drive::Failed(format!("malformed message: {e}"));
                            }
                        }
                    }
                    Some(Ok(Message::Binary(data))) => {
                        debug!("unexpected binary message ({} bytes) ignored", data.len());
                    }
                    Some(Ok(Message::Ping(_) | Message::Pong(_) | Message::Frame(_))) => {}
                    Some(Ok(Message::Close(frame))) => {
                        return Drive::Failed(format!("closed by backend: {frame:?}"));
                    }
                    Some(Err(e)) => return Drive::Failed(format!("websocket error: {e}")),
                    None => return Drive::Failed("websocket stream ended".to_string()),
                }
            }

            _ = sleep_until(handshake_deadline), if connecting => {
                return Drive::Failed("handshake timeout".to_string());
            }

            _ = sleep_until(last_inbound + config.liveness_timeout) => {
                return Drive::Failed("liveness timeout".to_string());
            }

            _ = sleep_until(turn_deadline.unwrap_or_else(Instant::now)), if turn_deadline.is_some() => {
                core.lock().turn_timed_out();
                sync_outputs(core, state_tx, event_tx);
            }

            _ = ping.tick() => {
                if let Err(e) = sink.send(Message::Ping(Bytes::new())).await {
                    return Drive::Failed(format!("ping failed: {e}"));
                }
            }
        }
    }
}
