//! Client-side voice streaming for the KITTY assistant.
//!
//! The crate captures microphone audio on a dedicated real-time context,
//! encodes it into fixed PCM16 frames, multiplexes audio/text/control
//! traffic over one persistent WebSocket session, and surfaces streaming
//! transcript, response, and tool-execution events to the embedding UI.
//!
//! Typical wiring:
//!
//! ```rust,no_run
//! use kitty_voice::{
//!     frame_queue, CaptureEngine, SessionContext, VoiceClientConfig, VoiceStreamClient,
//! };
//!
//! # async fn run() -> kitty_voice::VoiceResult<()> {
//! let config = VoiceClientConfig::new("wss://voice.example/session");
//! let (producer, consumer) = frame_queue(config.frame_queue_capacity);
//!
//! // The capture engine lives on the audio thread and feeds the queue
//! let engine = CaptureEngine::new(move |frame| producer.push(frame));
//!
//! let mut client = VoiceStreamClient::new(config);
//! client.connect(SessionContext::new("user-1", "assistant"))?;
//!
//! // The session task drains the queue into the client
//! # let _ = engine;
//! while let Some(frame) = consumer.pop() {
//!     client.send_audio(frame)?;
//! }
//! # Ok(())
//! # }
//! ```

pub mod audio;
pub mod client;
pub mod config;
pub mod error;
pub mod protocol;
pub mod tools;

// Re-export commonly used items for convenience
pub use audio::{
    frame_queue, AudioAnalyzer, AudioFrame, CaptureEngine, FrameConsumer, FrameProducer,
    SpectrumSummary, FRAME_BYTES, FRAME_SAMPLES, SAMPLE_RATE,
};
#[cfg(feature = "audio-io")]
pub use audio::MicrophoneSource;
pub use client::{
    ConnectionState, SessionContext, SessionEvent, SessionSnapshot, VoiceStreamClient,
};
pub use config::VoiceClientConfig;
pub use error::{VoiceError, VoiceResult};
pub use protocol::{Capabilities, ClientMessage, ServerEvent};
pub use tools::{ToolExecution, ToolExecutionTracker, ToolStatus, ToolSummary};
