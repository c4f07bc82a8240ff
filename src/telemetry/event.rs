use serde::{Deserialize, Serialize};

// Allowed: counts, byte sizes, attempt numbers
// Forbidden: samples, payload bytes, recognition/translation text

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum PipelineEvent {
    /// An audio frame left on the wire.
    FrameSent { bytes: usize },
    /// An audio frame was discarded because no connection was open.
    FrameDropped,
    Connected,
    ReconnectScheduled { attempt: u32 },
    RetriesExhausted,
    MalformedInbound,
    /// A control message was refused with `NotConnected`.
    ControlRejected,
}
