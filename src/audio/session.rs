use std::sync::Arc;

use tracing::{error, info, warn};

use super::device::{AudioDevice, CaptureRequest, DeviceStream};
use super::frame::AudioFrame;
use super::processing::{FramePipeline, FrameSink};
use crate::config::CaptureConfig;
use crate::error::{Result, StreamError};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum CaptureState {
    #[default]
    Idle,
    Recording,
}

/// Owns the device stream for one recording at a time.
///
/// `Idle --start--> Recording --stop--> Idle`. Teardown is idempotent and
/// also runs on drop.
#[derive(Default)]
pub struct CaptureSession {
    state: CaptureState,
    pipeline: Option<Arc<FramePipeline>>,
    stream: Option<Box<dyn DeviceStream>>,
    sink: Option<Arc<dyn FrameSink>>,
}

impl CaptureSession {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn state(&self) -> CaptureState {
        self.state
    }

    /// Native rate of the open device, while recording.
    pub fn native_rate(&self) -> Option<u32> {
        self.stream.as_ref().map(|s| s.sample_rate())
    }

    pub async fn start(
        &mut self,
        device: &dyn AudioDevice,
        config: &CaptureConfig,
        sink: Arc<dyn FrameSink>,
    ) -> Result<()> {
        if self.state != CaptureState::Idle {
            return Err(StreamError::AlreadyActive);
        }
        if config.frame_size == 0 || config.target_rate == 0 {
            return Err(StreamError::Config(
                "frame_size and target_rate must be non-zero".into(),
            ));
        }

        // 1. Pipeline first, so the callback has somewhere to go
        let pipeline = Arc::new(FramePipeline::new(config.target_rate, Arc::clone(&sink)));
        // Armed before the device opens so the first frames are kept.
        pipeline.arm();

        let callback_pipeline = Arc::clone(&pipeline);
        let request = CaptureRequest {
            frame_size: config.frame_size,
            constraints: config.constraints,
        };

        // 2. Open the device. Frames can start flowing before this returns.
        let stream = match device
            .open(
                request,
                Box::new(move |frame: AudioFrame| {
                    callback_pipeline.process(frame);
                }),
            )
            .await
        {
            Ok(stream) => stream,
            Err(e) => {
                pipeline.halt();
                error!("Capture failed to start: {}", e);
                return Err(e);
            }
        };

        info!(
            "Capture started: {}Hz -> {}Hz, {} samples per frame",
            stream.sample_rate(),
            pipeline.target_rate(),
            config.frame_size
        );

        self.pipeline = Some(pipeline);
        self.stream = Some(stream);
        self.sink = Some(sink);
        self.state = CaptureState::Recording;
        Ok(())
    }

    /// Stops recording and signals end-of-stream to the sink.
    ///
    /// A no-op returning `Ok` when not recording. The session is `Idle` when
    /// this returns, whatever the result; an error only reports that the
    /// end-of-stream signal could not be delivered.
    pub async fn stop(&mut self) -> Result<()> {
        if self.state != CaptureState::Recording {
            return Ok(());
        }

        // Order matters: stop frames, free the device, then tell the far end.
        self.teardown();
        self.state = CaptureState::Idle;

        match self.sink.take() {
            Some(sink) => sink.end_of_stream().await,
            None => Ok(()),
        }
    }

    fn teardown(&mut self) {
        if let Some(pipeline) = self.pipeline.take() {
            pipeline.halt();
            let stats = pipeline.stats();
            info!(
                "Capture stopped: {} frames processed, {} ignored",
                stats.processed, stats.ignored
            );
        }

        if let Some(mut stream) = self.stream.take() {
            if let Err(e) = stream.detach() {
                warn!("Frame callback detach failed, releasing anyway: {}", e);
            }
            stream.release();
        }
    }
}

impl Drop for CaptureSession {
    fn drop(&mut self) {
        self.teardown();
    }
}
