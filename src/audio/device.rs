use futures_util::future::BoxFuture;

use super::frame::AudioFrame;
use crate::config::InputConstraints;
use crate::error::Result;

/// Receives every fixed-size frame the device produces, on the device's thread.
pub type FrameCallback = Box<dyn FnMut(AudioFrame) + Send + 'static>;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CaptureRequest {
    /// Samples per delivered frame, at the native rate.
    pub frame_size: usize,
    pub constraints: InputConstraints,
}

/// An audio input capability: something that can be asked for a mono input stream.
pub trait AudioDevice: Send + Sync {
    /// Opens the input and starts delivering frames to `on_frame`.
    ///
    /// Fails with [`crate::StreamError::Device`] when the device is missing,
    /// permission is denied or the format is unusable.
    fn open(
        &self,
        request: CaptureRequest,
        on_frame: FrameCallback,
    ) -> BoxFuture<'static, Result<Box<dyn DeviceStream>>>;
}

/// A live input stream returned by [`AudioDevice::open`].
pub trait DeviceStream: Send {
    /// Native rate of the delivered frames, in Hz.
    fn sample_rate(&self) -> u32;

    /// Stops frame delivery. May fail if the backend is already gone.
    fn detach(&mut self) -> Result<()>;

    /// Releases the device and everything behind it. Must be idempotent.
    fn release(&mut self);
}
