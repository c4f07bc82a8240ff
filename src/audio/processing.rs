use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;

use futures_util::future::BoxFuture;
use tracing::trace;

use super::frame::{AudioFrame, PcmFrame};
use super::pcm::encode;
use super::resample::resample;
use crate::error::Result;

/// Where finished frames go. Supplied by the caller when capture starts.
pub trait FrameSink: Send + Sync {
    /// Called from the device thread once per processed frame. Must not block.
    fn on_audio_frame(&self, frame: PcmFrame);

    /// Called once when recording stops; signals the logical end of the audio stream.
    fn end_of_stream(&self) -> BoxFuture<'_, Result<()>>;
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct FrameStats {
    pub processed: u64,
    /// Frames that arrived after recording stopped.
    pub ignored: u64,
}

/// Per-frame work for one recording: resample, encode, hand off.
///
/// The device callback holds an `Arc` of this and checks `recording` on entry,
/// so `halt` can race with an in-flight callback without a lock.
pub struct FramePipeline {
    recording: AtomicBool,
    target_rate: u32,
    sink: Arc<dyn FrameSink>,
    processed: AtomicU64,
    ignored: AtomicU64,
}

impl FramePipeline {
    pub fn new(target_rate: u32, sink: Arc<dyn FrameSink>) -> Self {
        Self {
            recording: AtomicBool::new(false),
            target_rate,
            sink,
            processed: AtomicU64::new(0),
            ignored: AtomicU64::new(0),
        }
    }

    pub fn arm(&self) {
        self.recording.store(true, Ordering::Release);
    }

    pub fn halt(&self) {
        self.recording.store(false, Ordering::Release);
    }

    pub fn is_recording(&self) -> bool {
        self.recording.load(Ordering::Acquire)
    }

    pub fn target_rate(&self) -> u32 {
        self.target_rate
    }

    /// Returns `false` when the frame was dropped because recording is off.
    pub fn process(&self, frame: AudioFrame) -> bool {
        if !self.is_recording() {
            self.ignored.fetch_add(1, Ordering::Relaxed);
            return false;
        }

        // 1. Native rate -> target rate (no copy when they already match)
        let resampled = resample(frame.samples(), frame.sample_rate(), self.target_rate);
        // 2. f32 -> i16
        let pcm = encode(&resampled);
        trace!(
            "Frame {} @ {}Hz -> {} @ {}Hz",
            frame.len(),
            frame.sample_rate(),
            pcm.len(),
            self.target_rate
        );

        // 3. Hand off. Sink must not block, we're on the device thread here.
        self.sink.on_audio_frame(pcm);
        self.processed.fetch_add(1, Ordering::Relaxed);
        true
    }

    pub fn stats(&self) -> FrameStats {
        FrameStats {
            processed: self.processed.load(Ordering::Relaxed),
            ignored: self.ignored.load(Ordering::Relaxed),
        }
    }
}
