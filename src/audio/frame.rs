//! PCM16 audio frames and float-to-PCM conversion.
//!
//! Frames are the atomic transport unit: mono, 16 kHz, exactly
//! [`FRAME_SAMPLES`] signed 16-bit samples, little-endian on the wire.
//! Partial frames are never produced.

use bytes::Bytes;

/// Sample rate of the capture pipeline in Hz
pub const SAMPLE_RATE: u32 = 16_000;

/// Number of samples per frame (~256 ms at 16 kHz)
pub const FRAME_SAMPLES: usize = 4096;

/// Wire size of one frame in bytes (PCM16)
pub const FRAME_BYTES: usize = FRAME_SAMPLES * 2;

/// A full frame of mono PCM16 audio.
///
/// Immutable once produced; ownership transfers to the transport layer
/// on emission. The capture engine allocates a fresh backing buffer for
/// every frame, so a frame is never aliased by the capture path.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AudioFrame {
    samples: Vec<i16>,
}

impl AudioFrame {
    /// Build a frame from exactly [`FRAME_SAMPLES`] samples.
    ///
    /// Returns `None` if the sample count is wrong; the capture engine
    /// guarantees full frames, so `None` only occurs for hand-built input.
    pub fn from_samples(samples: Vec<i16>) -> Option<Self> {
        if samples.len() != FRAME_SAMPLES {
            return None;
        }
        Some(Self { samples })
    }

    /// A frame of silence.
    pub fn silence() -> Self {
        Self {
            samples: vec![0; FRAME_SAMPLES],
        }
    }

    /// The frame's samples.
    pub fn samples(&self) -> &[i16] {
        &self.samples
    }

    /// Encode the frame as little-endian PCM16 bytes for transmission.
    pub fn to_le_bytes(&self) -> Bytes {
        let mut out = Vec::with_capacity(FRAME_BYTES);
        for sample in &self.samples {
            out.extend_from_slice(&sample.to_le_bytes());
        }
        Bytes::from(out)
    }
}

/// Convert one float sample in [-1.0, 1.0] to a signed 16-bit sample.
///
/// Scaling is asymmetric: negative samples are multiplied by 32768 and
/// non-negative samples by 32767, so the full float range maps exactly
/// onto [-32768, 32767] with no overflow at the -1.0 boundary.
#[inline]
pub fn sample_to_i16(sample: f32) -> i16 {
    let clamped = sample.clamp(-1.0, 1.0);
    if clamped < 0.0 {
        (clamped * 32768.0) as i16
    } else {
        (clamped * 32767.0) as i16
    }
}
