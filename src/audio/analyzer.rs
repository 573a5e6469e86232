//! Spectrum and level analysis for visualization.
//!
//! Taps the raw sample stream independently of the transport path: the
//! analyzer keeps a rolling window of recent samples and recomputes its
//! summary on demand (typically once per animation tick). It never fails;
//! with no live stream it reports a zeroed summary.

use std::collections::VecDeque;
use std::f32::consts::PI;
use std::sync::Arc;

use realfft::num_complex::Complex32;
use realfft::{RealFftPlanner, RealToComplex};

/// Number of spectrum buckets reported by default
pub const DEFAULT_BANDS: usize = 64;

/// FFT window length in samples (128 ms at 16 kHz)
const WINDOW_SIZE: usize = 2048;

/// One visualization summary: per-band magnitudes plus a scalar level.
#[derive(Debug, Clone, PartialEq)]
pub struct SpectrumSummary {
    /// Normalized band magnitudes in [0, 1], low frequencies first
    pub bands: Vec<f32>,
    /// RMS level of the analysis window in [0, 1]
    pub level: f32,
}

impl SpectrumSummary {
    fn zeroed(bands: usize) -> Self {
        Self {
            bands: vec![0.0; bands],
            level: 0.0,
        }
    }
}

/// Rolling-window FFT analyzer over the live audio stream.
pub struct AudioAnalyzer {
    window: VecDeque<f32>,
    fft: Arc<dyn RealToComplex<f32>>,
    input: Vec<f32>,
    spectrum: Vec<Complex32>,
    hann: Vec<f32>,
    bands: usize,
}

impl AudioAnalyzer {
    /// Create an analyzer reporting `bands` spectrum buckets.
    pub fn new(bands: usize) -> Self {
        let mut planner = RealFftPlanner::<f32>::new();
        let fft = planner.plan_fft_forward(WINDOW_SIZE);
        let input = fft.make_input_vec();
        let spectrum = fft.make_output_vec();
        let hann = (0..WINDOW_SIZE)
            .map(|i| 0.5 - 0.5 * (2.0 * PI * i as f32 / WINDOW_SIZE as f32).cos())
            .collect();
        Self {
            window: VecDeque::with_capacity(WINDOW_SIZE),
            fft,
            input,
            spectrum,
            hann,
            bands: bands.max(1),
        }
    }

    /// Feed raw mono samples; only the most recent window is retained.
    pub fn push_samples(&mut self, samples: &[f32]) {
        for &sample in samples {
            if self.window.len() == WINDOW_SIZE {
                self.window.pop_front();
            }
            self.window.push_back(sample);
        }
    }

    /// Compute the current summary.
    ///
    /// An empty window (no stream yet, or after [`reset`](Self::reset))
    /// yields zeroed bands and a zero level rather than an error.
    pub fn summary(&mut self) -> SpectrumSummary {
        if self.window.is_empty() {
            return SpectrumSummary::zeroed(self.bands);
        }

        // Zero-pad at the front so partial windows analyze cleanly
        let pad = WINDOW_SIZE - self.window.len();
        for slot in self.input.iter_mut().take(pad) {
            *slot = 0.0;
        }
        for (i, &sample) in self.window.iter().enumerate() {
            self.input[pad + i] = sample * self.hann[pad + i];
        }

        let mut sum_squares = 0.0f32;
        for &sample in self.window.iter() {
            sum_squares += sample * sample;
        }
        let level = (sum_squares / self.window.len() as f32).sqrt().min(1.0);

        if self.fft.process(&mut self.input, &mut self.spectrum).is_err() {
            return SpectrumSummary::zeroed(self.bands);
        }

        // Fold frequency bins evenly into the configured band count
        let n_bins = self.spectrum.len();
        let scale = 2.0 / WINDOW_SIZE as f32;
        let mut bands = vec![0.0f32; self.bands];
        for (band, slot) in bands.iter_mut().enumerate() {
            let start = band * n_bins / self.bands;
            let end = ((band + 1) * n_bins / self.bands).max(start + 1);
            let mut acc = 0.0;
            for bin in &self.spectrum[start..end.min(n_bins)] {
                acc += bin.norm() * scale;
            }
            *slot = (acc / (end - start) as f32).min(1.0);
        }

        SpectrumSummary { bands, level }
    }

    /// Drop all buffered samples; the next summary is zeroed.
    pub fn reset(&mut self) {
        self.window.clear();
    }

    /// Configured band count.
    pub fn bands(&self) -> usize {
        self.bands
    }
}
