use std::collections::VecDeque;

use tracing::info;

use super::event::PipelineEvent;
use super::metrics::{compute_snapshot, PipelineSnapshot};

const MAX_EVENTS: usize = 10_000;

/// Bounded history of pipeline events. Once full, the oldest events fall off,
/// so snapshots describe the most recent window only.
#[derive(Debug)]
pub struct TelemetryRecorder {
    buffer: VecDeque<PipelineEvent>,
    capacity: usize,
}

impl Default for TelemetryRecorder {
    fn default() -> Self {
        Self::new()
    }
}

impl TelemetryRecorder {
    pub fn new() -> Self {
        Self::with_capacity(MAX_EVENTS)
    }

    pub fn with_capacity(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            buffer: VecDeque::with_capacity(capacity.min(MAX_EVENTS)),
            capacity,
        }
    }

    pub fn record(&mut self, event: PipelineEvent) {
        if self.buffer.len() >= self.capacity {
            self.buffer.pop_front();
        }
        self.buffer.push_back(event);
    }

    pub fn snapshot(&self) -> PipelineSnapshot {
        compute_snapshot(&self.buffer)
    }

    pub fn len(&self) -> usize {
        self.buffer.len()
    }

    pub fn is_empty(&self) -> bool {
        self.buffer.is_empty()
    }

    pub fn clear(&mut self) {
        self.buffer.clear();
    }

    /// Logs a one-line summary; called when the transport shuts down.
    pub fn log_summary(&self) {
        let snap = self.snapshot();
        info!(
            "Pipeline summary: sent={} ({} bytes) dropped={} ({:.1}%) connections={} reconnects={} malformed={}",
            snap.frames_sent,
            snap.bytes_sent,
            snap.frames_dropped,
            snap.drop_ratio * 100.0,
            snap.connections,
            snap.reconnects_scheduled,
            snap.malformed_inbound,
        );
    }
}
