//! Bounded single-producer/single-consumer frame queue.
//!
//! Connects the real-time capture context to the session task. When the
//! consumer falls behind, the oldest frame is dropped to make room; the
//! producer never blocks, so the audio thread is never stalled by a slow
//! network path.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use parking_lot::Mutex;
use ringbuf::{traits::*, HeapRb};

use super::frame::AudioFrame;

struct Shared {
    ring: Mutex<HeapRb<AudioFrame>>,
    dropped: AtomicU64,
}

/// Create a bounded frame queue with the given capacity.
///
/// Returns exactly one producer and one consumer; neither half is
/// cloneable, which is what enforces the single-pipeline rule.
pub fn frame_queue(capacity: usize) -> (FrameProducer, FrameConsumer) {
    let shared = Arc::new(Shared {
        ring: Mutex::new(HeapRb::new(capacity.max(1))),
        dropped: AtomicU64::new(0),
    });
    (
        FrameProducer {
            shared: shared.clone(),
        },
        FrameConsumer { shared },
    )
}

/// Producer half, owned by the capture context.
pub struct FrameProducer {
    shared: Arc<Shared>,
}

impl FrameProducer {
    /// Push a frame, evicting the oldest queued frame if full.
    pub fn push(&self, frame: AudioFrame) {
        let mut ring = self.shared.ring.lock();
        if let Err(frame) = ring.try_push(frame) {
            // Queue full: drop from the head, keep the newest audio
            let _ = ring.try_pop();
            let _ = ring.try_push(frame);
            self.shared.dropped.fetch_add(1, Ordering::Relaxed);
        }
    }

    /// Number of frames evicted because the consumer fell behind.
    pub fn dropped(&self) -> u64 {
        self.shared.dropped.load(Ordering::Relaxed)
    }
}

/// Consumer half, owned by the session task.
pub struct FrameConsumer {
    shared: Arc<Shared>,
}

impl FrameConsumer {
    /// Take the oldest queued frame, if any.
    pub fn pop(&self) -> Option<AudioFrame> {
        self.shared.ring.lock().try_pop()
    }

    /// Frames currently queued.
    pub fn len(&self) -> usize {
        self.shared.ring.lock().occupied_len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Discard all queued frames.
    pub fn clear(&self) {
        self.shared.ring.lock().clear();
    }
}
