//! Audio capture engine: float sample batches in, full PCM16 frames out.
//!
//! Runs on the audio host's real-time callback thread. The engine never
//! blocks, performs no I/O, and its only allocation is the fresh frame
//! buffer taken at each frame boundary, so a stall here cannot come from
//! this layer.

use super::frame::{sample_to_i16, AudioFrame, FRAME_SAMPLES};

/// Counters for the capture path.
#[derive(Debug, Default, Clone, Copy)]
pub struct CaptureStats {
    /// Total input samples accepted
    pub accepted_samples: u64,
    /// Full frames emitted
    pub frames_emitted: u64,
}

/// Accumulates incoming float samples into full [`AudioFrame`]s.
///
/// Samples arrive in batches of whatever size the audio host delivers
/// (commonly 128). Each time the accumulator reaches [`FRAME_SAMPLES`]
/// the full frame is handed to the sink and the accumulator is replaced
/// wholesale by a fresh buffer; the emitted frame's backing store is
/// never touched again by the engine.
pub struct CaptureEngine {
    buffer: Vec<i16>,
    sink: Box<dyn FnMut(AudioFrame) + Send>,
    stats: CaptureStats,
}

impl CaptureEngine {
    /// Create an engine delivering frames to `sink`.
    pub fn new(sink: impl FnMut(AudioFrame) + Send + 'static) -> Self {
        Self {
            buffer: Vec::with_capacity(FRAME_SAMPLES),
            sink: Box::new(sink),
            stats: CaptureStats::default(),
        }
    }

    /// Accept one batch of mono float samples in [-1.0, 1.0].
    ///
    /// An empty batch is a no-op. Always returns `true`: the engine asks
    /// its host to keep processing regardless of input, since upstream
    /// failures are the host's to report.
    pub fn push_samples(&mut self, samples: &[f32]) -> bool {
        if samples.is_empty() {
            return true;
        }

        for &sample in samples {
            self.buffer.push(sample_to_i16(sample));
            if self.buffer.len() == FRAME_SAMPLES {
                let full = std::mem::replace(
                    &mut self.buffer,
                    Vec::with_capacity(FRAME_SAMPLES),
                );
                // Length is FRAME_SAMPLES by construction
                if let Some(frame) = AudioFrame::from_samples(full) {
                    (self.sink)(frame);
                    self.stats.frames_emitted += 1;
                }
            }
        }
        self.stats.accepted_samples += samples.len() as u64;

        true
    }

    /// Samples currently buffered toward the next frame.
    pub fn buffered(&self) -> usize {
        self.buffer.len()
    }

    /// Capture counters.
    pub fn stats(&self) -> CaptureStats {
        self.stats
    }

    /// Discard any partially accumulated samples.
    pub fn reset(&mut self) {
        self.buffer.clear();
    }
}
