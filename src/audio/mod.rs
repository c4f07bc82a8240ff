pub mod capture;
pub mod device;
pub mod frame;
pub mod pcm;
pub mod processing;
pub mod resample;
pub mod session;

pub use capture::{CpalDevice, FrameChunker};
pub use device::{AudioDevice, CaptureRequest, DeviceStream, FrameCallback};
pub use frame::{AudioFrame, PcmFrame};
pub use processing::{FramePipeline, FrameSink, FrameStats};
pub use resample::resample;
pub use session::{CaptureSession, CaptureState};
