//! Scenario tests for the session state machine.
//!
//! These drive `SessionCore` directly, with no sockets or timers, and
//! assert the exact observable state sequences of the voice protocol.

use kitty_voice::audio::frame::FRAME_SAMPLES;
use kitty_voice::client::session::{Command, SessionCore, SessionEvent};
use kitty_voice::client::SessionContext;
use kitty_voice::protocol::{Capabilities, ServerEvent};
use kitty_voice::{AudioFrame, ConnectionState};

fn frame() -> AudioFrame {
    AudioFrame::from_samples(vec![0; FRAME_SAMPLES]).unwrap()
}

fn capabilities() -> ServerEvent {
    ServerEvent::Capabilities {
        capabilities: Capabilities {
            stt: true,
            tts: true,
            streaming: true,
            wake_word: false,
        },
    }
}

/// Collect the state names observed so far, extended by every
/// StateChanged event.
fn observed_states(core: &mut SessionCore, into: &mut Vec<&'static str>) {
    for event in core.drain_events() {
        if let SessionEvent::StateChanged(state) = event {
            into.push(state.name());
        }
    }
}

#[test]
fn full_voice_turn_produces_the_exact_state_sequence() {
    let mut core = SessionCore::new();
    let mut states = vec![core.state().name()];

    core.begin_connect(SessionContext::resume("conv-1", "user-1", "assistant"))
        .unwrap();
    observed_states(&mut core, &mut states);

    core.apply_event(capabilities());
    observed_states(&mut core, &mut states);

    for _ in 0..3 {
        core.command(Command::SendAudio(frame())).unwrap();
    }
    observed_states(&mut core, &mut states);

    core.command(Command::EndAudio).unwrap();
    observed_states(&mut core, &mut states);

    core.apply_event(ServerEvent::ResponsePartial {
        delta: "All ".into(),
        turn: None,
    });
    core.apply_event(ServerEvent::ResponsePartial {
        delta: "set.".into(),
        turn: None,
    });
    core.apply_event(ServerEvent::ResponseFinal {
        text: "All set.".into(),
        tier: Some("cloud".into()),
        turn: None,
    });
    observed_states(&mut core, &mut states);

    assert_eq!(
        states,
        [
            "disconnected",
            "connecting",
            "connected",
            "listening",
            "responding",
            "connected",
        ]
    );
    assert_eq!(core.snapshot().response, "All set.");
    assert_eq!(core.snapshot().tier.as_deref(), Some("cloud"));
}

#[test]
fn socket_loss_mid_response_recovers_through_one_reconnect() {
    let mut core = SessionCore::new();
    core.begin_connect(SessionContext::resume("conv-9", "user-1", "assistant"))
        .unwrap();
    core.apply_event(capabilities());
    core.command(Command::SendAudio(frame())).unwrap();
    core.command(Command::EndAudio).unwrap();
    core.apply_event(ServerEvent::ResponsePartial {
        delta: "half-finished".into(),
        turn: None,
    });
    assert_eq!(core.state(), &ConnectionState::Responding);

    // Transport dies mid-generation
    core.transport_failed("socket closed");
    assert_eq!(core.state().name(), "error");
    assert_eq!(core.retry_attempt(), 0);

    // One reconnect attempt succeeds
    assert!(core.begin_reconnect());
    assert_eq!(core.state(), &ConnectionState::Connecting);
    assert_eq!(core.retry_attempt(), 1);

    core.apply_event(capabilities());
    assert_eq!(core.state(), &ConnectionState::Connected);

    let snapshot = core.snapshot();
    assert_eq!(snapshot.conversation_id.as_deref(), Some("conv-9"));
    assert_eq!(snapshot.transcript, "");
    assert_eq!(snapshot.response, "");
    assert_eq!(snapshot.retry_attempt, 0);
}

#[test]
fn invalid_operations_never_mutate_state() {
    let mut core = SessionCore::new();

    assert!(core.command(Command::SendAudio(frame())).is_err());
    assert!(core.command(Command::EndAudio).is_err());
    assert!(core.command(Command::Cancel).is_err());
    assert_eq!(core.state(), &ConnectionState::Disconnected);

    core.begin_connect(SessionContext::resume("conv-1", "user-1", "assistant"))
        .unwrap();
    // Audio during the handshake is rejected and connecting is kept
    assert!(core.command(Command::SendAudio(frame())).is_err());
    assert_eq!(core.state(), &ConnectionState::Connecting);

    core.apply_event(capabilities());
    // end_audio with no turn in flight is rejected
    assert!(core.command(Command::EndAudio).is_err());
    assert_eq!(core.state(), &ConnectionState::Connected);
}

#[test]
fn double_cancel_equals_single_cancel() {
    let mut core = SessionCore::new();
    core.begin_connect(SessionContext::resume("conv-1", "user-1", "assistant"))
        .unwrap();
    core.apply_event(capabilities());
    core.command(Command::SendAudio(frame())).unwrap();

    core.command(Command::Cancel).unwrap();
    let once = core.snapshot();

    core.command(Command::Cancel).unwrap();
    let twice = core.snapshot();

    assert_eq!(once.state, twice.state);
    assert_eq!(once.transcript, twice.transcript);
    assert_eq!(once.response, twice.response);
    assert_eq!(once.turn, twice.turn);
}

#[test]
fn turn_events_after_disconnect_are_never_delivered() {
    let mut core = SessionCore::new();
    core.begin_connect(SessionContext::resume("conv-1", "user-1", "assistant"))
        .unwrap();
    core.apply_event(capabilities());
    core.command(Command::SendAudio(frame())).unwrap();
    core.drain_events();

    core.command(Command::Disconnect).unwrap();
    core.drain_events();

    core.apply_event(ServerEvent::TranscriptPartial {
        text: "ghost".into(),
        turn: None,
    });
    core.apply_event(ServerEvent::ResponseFinal {
        text: "ghost".into(),
        tier: None,
        turn: None,
    });
    assert!(core.drain_events().is_empty());
    assert_eq!(core.state(), &ConnectionState::Disconnected);
}
