#![allow(dead_code)]

use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use futures_util::future::BoxFuture;
use speechlink::audio::{
    AudioDevice, AudioFrame, CaptureRequest, DeviceStream, FrameCallback, FrameSink, PcmFrame,
};
use speechlink::transport::{Connector, Link, LinkPeer, Outbound};
use speechlink::{ConnectionState, StreamError, TransportEvent, WireMessage};
use tokio::sync::mpsc;

// ---------------------------------------------------------------------------
// Connections
// ---------------------------------------------------------------------------

/// What the next `connect()` does.
#[derive(Debug, Clone)]
pub enum Dial {
    Accept,
    Refuse(&'static str),
}

struct ConnectorInner {
    script: VecDeque<Dial>,
    attempts: usize,
    peers: mpsc::UnboundedSender<LinkPeer>,
}

/// Connector driven by a script. Once the script runs out every attempt is refused.
/// Accepted connections hand their server side to the test through `peers`.
#[derive(Clone)]
pub struct ScriptedConnector {
    inner: Arc<Mutex<ConnectorInner>>,
}

impl ScriptedConnector {
    pub fn new(script: Vec<Dial>) -> (Self, mpsc::UnboundedReceiver<LinkPeer>) {
        let (tx, rx) = mpsc::unbounded_channel();
        let connector = Self {
            inner: Arc::new(Mutex::new(ConnectorInner {
                script: script.into(),
                attempts: 0,
                peers: tx,
            })),
        };
        (connector, rx)
    }

    pub fn attempts(&self) -> usize {
        self.inner.lock().unwrap().attempts
    }

    pub fn push(&self, dial: Dial) {
        self.inner.lock().unwrap().script.push_back(dial);
    }
}

impl Connector for ScriptedConnector {
    fn connect(&self) -> BoxFuture<'static, Result<Link, StreamError>> {
        let mut inner = self.inner.lock().unwrap();
        inner.attempts += 1;
        let dial = inner.script.pop_front().unwrap_or(Dial::Refuse("no route"));

        match dial {
            Dial::Accept => {
                let (link, peer) = Link::channel();
                let _ = inner.peers.send(peer);
                Box::pin(async move { Ok(link) })
            }
            Dial::Refuse(reason) => {
                Box::pin(async move { Err(StreamError::ConnectionLost(reason.to_string())) })
            }
        }
    }
}

pub const WAIT: Duration = Duration::from_secs(120);

pub async fn next_peer(peers: &mut mpsc::UnboundedReceiver<LinkPeer>) -> LinkPeer {
    tokio::time::timeout(WAIT, peers.recv())
        .await
        .expect("timed out waiting for a connection")
        .expect("connector dropped")
}

pub async fn next_event(events: &mut mpsc::UnboundedReceiver<TransportEvent>) -> TransportEvent {
    tokio::time::timeout(WAIT, events.recv())
        .await
        .expect("timed out waiting for a transport event")
        .expect("transport event channel closed")
}

/// Skips events until the given state is reported.
pub async fn wait_status(
    events: &mut mpsc::UnboundedReceiver<TransportEvent>,
    wanted: ConnectionState,
) {
    loop {
        if let TransportEvent::StatusChanged(state) = next_event(events).await {
            if state == wanted {
                return;
            }
        }
    }
}

/// Next text frame the client wrote, decoded.
pub async fn next_sent(peer: &mut LinkPeer) -> WireMessage {
    let raw = next_sent_raw(peer).await;
    WireMessage::decode(&raw).expect("client sent an undecodable frame")
}

pub async fn next_sent_raw(peer: &mut LinkPeer) -> String {
    match tokio::time::timeout(WAIT, peer.outbound.recv())
        .await
        .expect("timed out waiting for an outbound frame")
        .expect("link dropped")
    {
        Outbound::Text(text) => text,
        Outbound::Close(code) => panic!("expected a text frame, got close {}", code),
    }
}

// ---------------------------------------------------------------------------
// Audio
// ---------------------------------------------------------------------------

#[derive(Default)]
pub struct StreamCounters {
    pub opened: AtomicUsize,
    pub detached: AtomicUsize,
    pub released: AtomicUsize,
    pub last_request: Mutex<Option<CaptureRequest>>,
}

impl StreamCounters {
    pub fn opened(&self) -> usize {
        self.opened.load(Ordering::SeqCst)
    }

    pub fn detached(&self) -> usize {
        self.detached.load(Ordering::SeqCst)
    }

    pub fn released(&self) -> usize {
        self.released.load(Ordering::SeqCst)
    }
}

type SharedCallback = Arc<Mutex<Option<FrameCallback>>>;

/// In-memory input device. Frames are pushed by the test with [`FakeDevice::emit`].
pub struct FakeDevice {
    rate: u32,
    failure: Option<String>,
    detach_fails: bool,
    callback: SharedCallback,
    counters: Arc<StreamCounters>,
}

impl FakeDevice {
    pub fn new(rate: u32) -> Self {
        Self {
            rate,
            failure: None,
            detach_fails: false,
            callback: Arc::new(Mutex::new(None)),
            counters: Arc::new(StreamCounters::default()),
        }
    }

    pub fn failing(reason: &str) -> Self {
        Self {
            failure: Some(reason.to_string()),
            ..Self::new(48_000)
        }
    }

    pub fn with_detach_failure(mut self) -> Self {
        self.detach_fails = true;
        self
    }

    pub fn counters(&self) -> Arc<StreamCounters> {
        Arc::clone(&self.counters)
    }

    /// Delivers one native frame. Returns `false` if no stream is attached.
    pub fn emit(&self, samples: Vec<f32>) -> bool {
        let mut guard = self.callback.lock().unwrap();
        match guard.as_mut() {
            Some(callback) => {
                callback(AudioFrame::new(samples, self.rate));
                true
            }
            None => false,
        }
    }
}

impl AudioDevice for FakeDevice {
    fn open(
        &self,
        request: CaptureRequest,
        on_frame: FrameCallback,
    ) -> BoxFuture<'static, Result<Box<dyn DeviceStream>, StreamError>> {
        let rate = self.rate;
        let failure = self.failure.clone();
        let detach_fails = self.detach_fails;
        let callback = Arc::clone(&self.callback);
        let counters = Arc::clone(&self.counters);

        Box::pin(async move {
            if let Some(reason) = failure {
                return Err(StreamError::Device(reason));
            }
            counters.opened.fetch_add(1, Ordering::SeqCst);
            *counters.last_request.lock().unwrap() = Some(request);
            *callback.lock().unwrap() = Some(on_frame);
            Ok(Box::new(FakeStream {
                rate,
                detach_fails,
                callback,
                counters,
                released: false,
            }) as Box<dyn DeviceStream>)
        })
    }
}

struct FakeStream {
    rate: u32,
    detach_fails: bool,
    callback: SharedCallback,
    counters: Arc<StreamCounters>,
    released: bool,
}

impl DeviceStream for FakeStream {
    fn sample_rate(&self) -> u32 {
        self.rate
    }

    fn detach(&mut self) -> Result<(), StreamError> {
        self.counters.detached.fetch_add(1, Ordering::SeqCst);
        if self.detach_fails {
            return Err(StreamError::Device("device vanished".into()));
        }
        *self.callback.lock().unwrap() = None;
        Ok(())
    }

    fn release(&mut self) {
        if self.released {
            return;
        }
        self.released = true;
        *self.callback.lock().unwrap() = None;
        self.counters.released.fetch_add(1, Ordering::SeqCst);
    }
}

/// Sink that keeps everything it is given.
pub struct RecordingSink {
    pub frames: Mutex<Vec<PcmFrame>>,
    pub ends: AtomicUsize,
    end_result: Result<(), StreamError>,
}

impl RecordingSink {
    pub fn new() -> Arc<Self> {
        Arc::new(Self {
            frames: Mutex::new(Vec::new()),
            ends: AtomicUsize::new(0),
            end_result: Ok(()),
        })
    }

    pub fn failing_end(error: StreamError) -> Arc<Self> {
        Arc::new(Self {
            frames: Mutex::new(Vec::new()),
            ends: AtomicUsize::new(0),
            end_result: Err(error),
        })
    }

    pub fn frame_count(&self) -> usize {
        self.frames.lock().unwrap().len()
    }

    pub fn end_count(&self) -> usize {
        self.ends.load(Ordering::SeqCst)
    }
}

impl FrameSink for RecordingSink {
    fn on_audio_frame(&self, frame: PcmFrame) {
        self.frames.lock().unwrap().push(frame);
    }

    fn end_of_stream(&self) -> BoxFuture<'_, Result<(), StreamError>> {
        self.ends.fetch_add(1, Ordering::SeqCst);
        let result = self.end_result.clone();
        Box::pin(async move { result })
    }
}
