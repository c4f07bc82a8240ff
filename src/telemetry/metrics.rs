use std::collections::VecDeque;

use serde::Serialize;

use super::event::PipelineEvent;

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct PipelineSnapshot {
    pub frames_sent: u64,
    pub bytes_sent: u64,
    pub frames_dropped: u64,
    pub connections: u64,
    pub reconnects_scheduled: u64,
    pub highest_attempt: u32,
    pub retries_exhausted: u64,
    pub malformed_inbound: u64,
    pub control_rejected: u64,
    /// Share of audio frames that never reached the wire, 0.0 - 1.0.
    pub drop_ratio: f64,
}

pub fn compute_snapshot(events: &VecDeque<PipelineEvent>) -> PipelineSnapshot {
    let mut snap = PipelineSnapshot::default();

    for event in events {
        match event {
            PipelineEvent::FrameSent { bytes } => {
                snap.frames_sent += 1;
                snap.bytes_sent += *bytes as u64;
            }
            PipelineEvent::FrameDropped => snap.frames_dropped += 1,
            PipelineEvent::Connected => snap.connections += 1,
            PipelineEvent::ReconnectScheduled { attempt } => {
                snap.reconnects_scheduled += 1;
                snap.highest_attempt = snap.highest_attempt.max(*attempt);
            }
            PipelineEvent::RetriesExhausted => snap.retries_exhausted += 1,
            PipelineEvent::MalformedInbound => snap.malformed_inbound += 1,
            PipelineEvent::ControlRejected => snap.control_rejected += 1,
        }
    }

    let total_frames = snap.frames_sent + snap.frames_dropped;
    if total_frames > 0 {
        snap.drop_ratio = snap.frames_dropped as f64 / total_frames as f64;
    }

    snap
}
