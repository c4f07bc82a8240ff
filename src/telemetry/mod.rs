//! Counting-only observability for the capture-to-transport pipeline.
//!
//! # PRIVACY INVARIANT
//! Telemetry events must **NEVER** contain audio samples or transcript text.
//! Only counts, sizes and attempt numbers are allowed.
//!
//! Telemetry is never read by the connection state machine; it exists for
//! logging and verification.

pub mod event;
pub mod metrics;
pub mod recorder;

pub use event::PipelineEvent;
pub use metrics::PipelineSnapshot;
pub use recorder::TelemetryRecorder;
