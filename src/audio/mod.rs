//! Audio capture, framing, buffering, and analysis.

pub mod analyzer;
pub mod capture;
pub mod frame;
#[cfg(feature = "audio-io")]
pub mod input;
pub mod queue;

pub use analyzer::{AudioAnalyzer, SpectrumSummary, DEFAULT_BANDS};
pub use capture::{CaptureEngine, CaptureStats};
pub use frame::{AudioFrame, FRAME_BYTES, FRAME_SAMPLES, SAMPLE_RATE};
#[cfg(feature = "audio-io")]
pub use input::MicrophoneSource;
pub use queue::{frame_queue, FrameConsumer, FrameProducer};
