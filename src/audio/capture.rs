use cpal::traits::{DeviceTrait, HostTrait, StreamTrait};
use futures_util::future::BoxFuture;
use ringbuf::traits::{Consumer, Observer, Producer, Split};
use ringbuf::{HeapCons, HeapProd, HeapRb};
use tokio::sync::{mpsc, oneshot};
use tracing::{debug, error, info, warn};

use super::device::{AudioDevice, CaptureRequest, DeviceStream, FrameCallback};
use super::frame::AudioFrame;
use crate::error::{Result, StreamError};

enum CaptureCommand {
    Pause,
    Shutdown,
}

/// The host's input device through cpal.
///
/// cpal streams cannot leave the thread that built them, so each opened stream
/// lives on its own `audio-capture` thread and is driven by commands.
#[derive(Debug, Clone, Default)]
pub struct CpalDevice {
    device_name: Option<String>,
}

impl CpalDevice {
    pub fn new() -> Self {
        Self::default()
    }

    /// Picks the input device whose name matches instead of the host default.
    pub fn named(name: impl Into<String>) -> Self {
        Self {
            device_name: Some(name.into()),
        }
    }
}

impl AudioDevice for CpalDevice {
    fn open(
        &self,
        request: CaptureRequest,
        on_frame: FrameCallback,
    ) -> BoxFuture<'static, Result<Box<dyn DeviceStream>>> {
        let device_name = self.device_name.clone();

        Box::pin(async move {
            let (ready_tx, ready_rx) = oneshot::channel();
            let (cmd_tx, cmd_rx) = mpsc::unbounded_channel();

            std::thread::Builder::new()
                .name("audio-capture".to_string())
                .spawn(move || {
                    CaptureActor { commands: cmd_rx }.run(device_name, request, on_frame, ready_tx)
                })
                .map_err(|e| StreamError::Device(format!("failed to spawn capture thread: {}", e)))?;

            let sample_rate = ready_rx
                .await
                .map_err(|_| StreamError::Device("capture thread exited during setup".into()))??;

            let stream: Box<dyn DeviceStream> = Box::new(CpalStream {
                commands: cmd_tx,
                sample_rate,
                released: false,
            });
            Ok(stream)
        })
    }
}

struct CpalStream {
    commands: mpsc::UnboundedSender<CaptureCommand>,
    sample_rate: u32,
    released: bool,
}

impl DeviceStream for CpalStream {
    fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    fn detach(&mut self) -> Result<()> {
        self.commands
            .send(CaptureCommand::Pause)
            .map_err(|_| StreamError::Device("capture thread already stopped".into()))
    }

    fn release(&mut self) {
        if self.released {
            return;
        }
        self.released = true;
        // The thread drops the cpal stream and exits once it sees Shutdown.
        if self.commands.send(CaptureCommand::Shutdown).is_err() {
            debug!("[Audio] Capture thread was already gone at release");
        }
    }
}

impl Drop for CpalStream {
    fn drop(&mut self) {
        self.release();
    }
}

struct CaptureActor {
    commands: mpsc::UnboundedReceiver<CaptureCommand>,
}

impl CaptureActor {
    fn run(
        mut self,
        device_name: Option<String>,
        request: CaptureRequest,
        on_frame: FrameCallback,
        ready: oneshot::Sender<Result<u32>>,
    ) {
        // 1. Build + play the stream on this thread (cpal::Stream is !Send)
        let (stream, sample_rate) = match build_stream(device_name.as_deref(), request, on_frame) {
            Ok(built) => built,
            Err(e) => {
                error!("[Audio] Failed to open input: {}", e);
                let _ = ready.send(Err(e));
                return;
            }
        };

        // 2. Tell the caller the native rate
        if ready.send(Ok(sample_rate)).is_err() {
            // Caller went away while we were opening.
            return;
        }

        // 3. Park until told to pause or shut down. A dropped sender counts as shutdown.
        while let Some(cmd) = self.commands.blocking_recv() {
            match cmd {
                CaptureCommand::Pause => {
                    if let Err(e) = stream.pause() {
                        warn!("[Audio] Pause failed: {}", e);
                    }
                }
                CaptureCommand::Shutdown => break,
            }
        }

        drop(stream);
        info!("[Audio] Stream released");
    }
}

fn build_stream(
    device_name: Option<&str>,
    request: CaptureRequest,
    on_frame: FrameCallback,
) -> Result<(cpal::Stream, u32)> {
    let host = cpal::default_host();
    let device = match device_name {
        Some(name) => host
            .input_devices()
            .map_err(|e| StreamError::Device(e.to_string()))?
            .find(|d| d.name().map(|n| n == name).unwrap_or(false))
            .ok_or_else(|| StreamError::Device(format!("no input device named '{}'", name)))?,
        None => host
            .default_input_device()
            .ok_or_else(|| StreamError::Device("No input device available".into()))?,
    };

    info!("[Audio] Input Device: {}", device.name().unwrap_or_default());

    let supported = device
        .default_input_config()
        .map_err(|e| StreamError::Device(format!("default config error: {}", e)))?;
    let sample_rate = supported.sample_rate().0;
    let channels = supported.channels().max(1) as usize;

    // Echo cancellation, noise suppression and gain control belong to the
    // OS audio stack on cpal hosts; record what was asked for.
    debug!("[Audio] Requested input processing: {:?}", request.constraints);
    info!(
        "[Audio] Config Selected: Rate={}Hz, Channels={}, Format={:?}, Frame={}",
        sample_rate,
        channels,
        supported.sample_format(),
        request.frame_size
    );

    // Note: device buffer sizes vary per host (e.g. 441 on some, 1024 on others),
    // so we re-chunk to frame_size ourselves instead of asking cpal for it.
    let mut chunker = FrameChunker::new(request.frame_size, channels, sample_rate, on_frame);
    let err_fn = |err| error!("[Audio] Stream error: {}", err);
    let config: cpal::StreamConfig = supported.config();

    let stream = match supported.sample_format() {
        cpal::SampleFormat::F32 => device.build_input_stream(
            &config,
            move |data: &[f32], _: &_| chunker.push_interleaved(data, |s| s),
            err_fn,
            None,
        ),
        cpal::SampleFormat::I16 => device.build_input_stream(
            &config,
            move |data: &[i16], _: &_| chunker.push_interleaved(data, |s| s as f32 / 32768.0),
            err_fn,
            None,
        ),
        other => {
            return Err(StreamError::Device(format!("Unsupported sample format: {:?}", other)));
        }
    }
    .map_err(|e| StreamError::Device(e.to_string()))?;

    stream
        .play()
        .map_err(|e| StreamError::Device(format!("failed to start stream: {}", e)))?;

    Ok((stream, sample_rate))
}

/// Turns the arbitrary-length buffers cpal hands us into fixed-size mono frames.
pub struct FrameChunker {
    producer: HeapProd<f32>,
    consumer: HeapCons<f32>,
    frame_size: usize,
    channels: usize,
    sample_rate: u32,
    on_frame: FrameCallback,
}

impl FrameChunker {
    pub fn new(frame_size: usize, channels: usize, sample_rate: u32, on_frame: FrameCallback) -> Self {
        let frame_size = frame_size.max(1);
        let channels = channels.max(1);
        let (producer, consumer) = HeapRb::<f32>::new(frame_size * 2).split();
        Self {
            producer,
            consumer,
            frame_size,
            channels,
            sample_rate,
            on_frame,
        }
    }

    /// Feeds one interleaved buffer; calls back once per completed frame.
    pub fn push_interleaved<T: Copy>(&mut self, data: &[T], to_f32: impl Fn(T) -> f32) {
        // First channel only. A full ring drops the sample (lossy).
        for &sample in data.iter().step_by(self.channels) {
            let _ = self.producer.try_push(to_f32(sample));
            if self.consumer.occupied_len() >= self.frame_size {
                self.emit_frame();
            }
        }
    }

    fn emit_frame(&mut self) {
        let mut samples = vec![0.0f32; self.frame_size];
        let filled = self.consumer.pop_slice(&mut samples);
        samples.truncate(filled);
        (self.on_frame)(AudioFrame::new(samples, self.sample_rate));
    }
}
