//! Microphone host built on cpal.
//!
//! Owns the OS input stream and bridges it to the capture engine on the
//! audio backend's callback thread. Multi-channel input is downmixed to
//! mono by averaging. Capture failures (no device, unsupported rate,
//! permission denied) surface as [`VoiceError::Capture`] and simply mean
//! capture does not start; they never take down a network session.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use cpal::traits::{DeviceTrait, HostTrait, StreamTrait};
use cpal::{Device, SampleRate, Stream, StreamConfig};
use parking_lot::Mutex;
use tracing::{error, info, warn};

use super::analyzer::AudioAnalyzer;
use super::capture::CaptureEngine;
use super::frame::SAMPLE_RATE;
use crate::error::{VoiceError, VoiceResult};

/// Microphone source feeding a [`CaptureEngine`].
pub struct MicrophoneSource {
    device: Device,
    config: StreamConfig,
    stream: Option<Stream>,
    running: Arc<AtomicBool>,
}

impl MicrophoneSource {
    /// Open the default input device at the pipeline sample rate.
    pub fn new() -> VoiceResult<Self> {
        let host = cpal::default_host();
        let device = host
            .default_input_device()
            .ok_or_else(|| VoiceError::Capture("no input device available".into()))?;

        info!(
            "Using input device: {}",
            device.name().unwrap_or_else(|_| "unknown".to_string())
        );

        let config = pick_config(&device)?;
        Ok(Self {
            device,
            config,
            stream: None,
            running: Arc::new(AtomicBool::new(false)),
        })
    }

    /// Number of input channels the stream delivers (downmixed to mono).
    pub fn channels(&self) -> u16 {
        self.config.channels
    }

    /// Start capture, feeding `engine` and optionally tapping `analyzer`.
    ///
    /// The engine moves onto the audio callback thread; its sink (the
    /// frame-queue producer) is the only way audio leaves this context.
    pub fn start(
        &mut self,
        mut engine: CaptureEngine,
        analyzer: Option<Arc<Mutex<AudioAnalyzer>>>,
    ) -> VoiceResult<()> {
        if self.running.load(Ordering::Acquire) {
            warn!("Capture already running");
            return Ok(());
        }

        let channels = self.config.channels as usize;
        let running = self.running.clone();
        let mut mono = Vec::new();

        let stream = self
            .device
            .build_input_stream(
                &self.config,
                move |data: &[f32], _: &cpal::InputCallbackInfo| {
                    if !running.load(Ordering::Acquire) {
                        return;
                    }

                    let samples: &[f32] = if channels == 1 {
                        data
                    } else {
                        mono.clear();
                        mono.extend(
                            data.chunks(channels)
                                .map(|frame| frame.iter().sum::<f32>() / channels as f32),
                        );
                        &mono
                    };

                    if let Some(analyzer) = &analyzer {
                        analyzer.lock().push_samples(samples);
                    }
                    engine.push_samples(samples);
                },
                |err| {
                    error!("Audio input stream error: {}", err);
                },
                None,
            )
            .map_err(|e| VoiceError::Capture(format!("failed to build input stream: {e}")))?;

        stream
            .play()
            .map_err(|e| VoiceError::Capture(format!("failed to start input stream: {e}")))?;

        self.running.store(true, Ordering::Release);
        self.stream = Some(stream);
        info!("Started audio capture at {} Hz", SAMPLE_RATE);
        Ok(())
    }

    /// Stop capture and release the input stream.
    pub fn stop(&mut self) {
        self.running.store(false, Ordering::Release);
        if self.stream.take().is_some() {
            info!("Stopped audio capture");
        }
    }

    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::Acquire)
    }
}

impl Drop for MicrophoneSource {
    fn drop(&mut self) {
        self.stop();
    }
}

/// Find an f32 input configuration that supports the pipeline rate.
fn pick_config(device: &Device) -> VoiceResult<StreamConfig> {
    let ranges = device
        .supported_input_configs()
        .map_err(|e| VoiceError::Capture(format!("failed to query input configs: {e}")))?;

    let mut fallback = None;
    for range in ranges {
        if range.sample_format() != cpal::SampleFormat::F32 {
            continue;
        }
        if let Some(supported) = range.try_with_sample_rate(SampleRate(SAMPLE_RATE)) {
            if supported.channels() == 1 {
                return Ok(supported.config());
            }
            fallback.get_or_insert(supported.config());
        }
    }

    fallback.ok_or_else(|| {
        VoiceError::Capture(format!(
            "input device does not support {} Hz f32 capture",
            SAMPLE_RATE
        ))
    })
}
