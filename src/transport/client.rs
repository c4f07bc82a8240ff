use std::future::pending;
use std::pin::Pin;
use std::time::Duration;

use futures_util::future::BoxFuture;
use tokio::sync::mpsc::error::TrySendError;
use tokio::sync::{mpsc, oneshot, watch};
use tokio::task::JoinHandle;
use tokio::time::{sleep, Sleep};
use tracing::{debug, info, warn};

use super::link::{Connector, Link, LinkEvent, CLOSE_NORMAL};
use super::machine::{ConnectionMachine, LinkEffect, LinkInput};
use super::message::WireMessage;
use super::state::{ConnectionState, TransportEvent};
use crate::audio::{FrameSink, PcmFrame};
use crate::config::TransportConfig;
use crate::error::{Result, StreamError};
use crate::telemetry::{PipelineEvent, PipelineSnapshot, TelemetryRecorder};

enum Command {
    Connect,
    Send {
        message: WireMessage,
        reply: Option<oneshot::Sender<Result<()>>>,
    },
    /// End-of-stream audio sentinel followed by `Stop`.
    Finish {
        reply: oneshot::Sender<Result<()>>,
    },
    Close {
        reply: oneshot::Sender<()>,
    },
    Snapshot {
        reply: oneshot::Sender<PipelineSnapshot>,
    },
}

/// The task that owns the connection, its state and the retry timer.
///
/// Everything runs on this one task: commands, inbound frames, handshake
/// completion and the retry timer are awaited together in a single `select!`.
pub struct Transport<C: Connector> {
    connector: C,
    machine: ConnectionMachine,
    commands: mpsc::Receiver<Command>,
    events: mpsc::UnboundedSender<TransportEvent>,
    state_tx: watch::Sender<ConnectionState>,
    link: Option<Link>,
    pending: Option<BoxFuture<'static, Result<Link>>>,
    retry: Option<Pin<Box<Sleep>>>,
    telemetry: TelemetryRecorder,
}

impl<C: Connector> Transport<C> {
    pub fn new(
        connector: C,
        config: &TransportConfig,
    ) -> (Self, TransportHandle, mpsc::UnboundedReceiver<TransportEvent>) {
        let (cmd_tx, cmd_rx) = mpsc::channel(config.command_capacity.max(1));
        let (event_tx, event_rx) = mpsc::unbounded_channel();
        let (state_tx, state_rx) = watch::channel(ConnectionState::Disconnected);

        let transport = Self {
            connector,
            machine: ConnectionMachine::new(config.max_attempts, config.retry_delay()),
            commands: cmd_rx,
            events: event_tx,
            state_tx,
            link: None,
            pending: None,
            retry: None,
            telemetry: TelemetryRecorder::new(),
        };
        let handle = TransportHandle {
            commands: cmd_tx,
            state: state_rx,
        };
        (transport, handle, event_rx)
    }

    /// Builds the transport and runs it on a new tokio task.
    pub fn spawn(
        connector: C,
        config: &TransportConfig,
    ) -> (
        TransportHandle,
        mpsc::UnboundedReceiver<TransportEvent>,
        JoinHandle<()>,
    ) {
        let (transport, handle, events) = Self::new(connector, config);
        let task = tokio::spawn(transport.run());
        (handle, events, task)
    }

    /// Runs until every [`TransportHandle`] is dropped.
    pub async fn run(mut self) {
        info!("Transport started");

        loop {
            tokio::select! {
                cmd = self.commands.recv() => match cmd {
                    Some(cmd) => self.on_command(cmd),
                    None => break,
                },
                opened = wait_open(&mut self.pending) => {
                    self.pending = None;
                    match opened {
                        Ok(link) => {
                            self.link = Some(link);
                            self.apply(LinkInput::Opened);
                        }
                        Err(e) => {
                            warn!("Connection attempt failed: {}", e);
                            self.apply(LinkInput::Failed(e.to_string()));
                        }
                    }
                },
                event = wait_link(&mut self.link) => self.on_link_event(event),
                _ = wait_retry(&mut self.retry) => {
                    self.retry = None;
                    self.apply(LinkInput::RetryElapsed);
                },
            }
        }

        self.apply(LinkInput::CloseRequested);
        self.telemetry.log_summary();
        info!("Transport stopped");
    }

    fn on_command(&mut self, cmd: Command) {
        match cmd {
            Command::Connect => self.apply(LinkInput::Connect { explicit: true }),
            Command::Send { message, reply } => {
                let kind = message.kind();
                let result = self.deliver(message);
                match reply {
                    Some(reply) => {
                        let _ = reply.send(result);
                    }
                    None => {
                        if let Err(e) = result {
                            warn!("Unacknowledged {} send failed: {}", kind, e);
                        }
                    }
                }
            }
            Command::Finish { reply } => {
                let result = if self.is_connected() {
                    self.deliver(WireMessage::end_of_stream())
                        .and_then(|_| self.deliver(WireMessage::Stop))
                } else {
                    warn!("No connection, stop signal not sent");
                    self.telemetry.record(PipelineEvent::ControlRejected);
                    Err(StreamError::NotConnected("stop"))
                };
                let _ = reply.send(result);
            }
            Command::Close { reply } => {
                self.apply(LinkInput::CloseRequested);
                let _ = reply.send(());
            }
            Command::Snapshot { reply } => {
                let _ = reply.send(self.telemetry.snapshot());
            }
        }
    }

    fn is_connected(&self) -> bool {
        self.machine.state() == ConnectionState::Connected && self.link.is_some()
    }

    /// Audio while down is dropped and nudges a reconnect; control messages
    /// while down fail with `NotConnected`.
    fn deliver(&mut self, message: WireMessage) -> Result<()> {
        let is_audio = message.is_audio();

        if !self.is_connected() {
            if is_audio {
                self.telemetry.record(PipelineEvent::FrameDropped);
                debug!("Dropping audio frame while {}", self.machine.state());
                self.apply(LinkInput::Connect { explicit: false });
                return Ok(());
            }
            self.telemetry.record(PipelineEvent::ControlRejected);
            return Err(StreamError::NotConnected(message.kind()));
        }

        // Connected: encode and push to the writer task. Never awaits.
        let text = message.encode()?;
        let bytes = text.len();
        let sent = match &self.link {
            Some(link) => link.send_text(text),
            None => Err(StreamError::ConnectionLost("no connection".into())),
        };

        match sent {
            Ok(()) => {
                if is_audio {
                    self.telemetry.record(PipelineEvent::FrameSent { bytes });
                }
                Ok(())
            }
            Err(e) => {
                self.apply(LinkInput::Failed(e.to_string()));
                if is_audio {
                    self.telemetry.record(PipelineEvent::FrameDropped);
                    Ok(())
                } else {
                    Err(e)
                }
            }
        }
    }

    fn on_link_event(&mut self, event: LinkEvent) {
        match event {
            LinkEvent::Message(text) => match WireMessage::decode(&text) {
                Ok(message) => {
                    debug!("Inbound {}", message.kind());
                    self.emit(TransportEvent::Message(message));
                }
                Err(e) => {
                    warn!("Malformed inbound message: {}", e);
                    self.telemetry.record(PipelineEvent::MalformedInbound);
                    self.emit(TransportEvent::Message(WireMessage::Error {
                        message: e.to_string(),
                    }));
                }
            },
            LinkEvent::Closed { code, reason } => {
                info!("Connection closed (code {:?}): {}", code, reason);
                self.apply(LinkInput::Closed { code });
            }
            LinkEvent::Failed(reason) => {
                warn!("Connection error: {}", reason);
                self.apply(LinkInput::Failed(reason));
            }
        }
    }

    /// Runs one machine step and executes what it asks for.
    fn apply(&mut self, input: LinkInput) {
        // 1. Decide (pure)
        // 2. Execute effects in order
        // 3. Publish the resulting state to watchers
        for effect in self.machine.step(input) {
            match effect {
                LinkEffect::Open => {
                    if let Some(stale) = self.link.take() {
                        stale.close(CLOSE_NORMAL);
                    }
                    self.pending = Some(self.connector.connect());
                }
                LinkEffect::Close(code) => {
                    self.pending = None;
                    if let Some(link) = self.link.take() {
                        link.close(code);
                    }
                }
                // Already gone on the wire, just forget it.
                LinkEffect::Release => {
                    self.pending = None;
                    self.link = None;
                }
                LinkEffect::ArmRetry(delay) => self.retry = Some(Box::pin(sleep(delay))),
                LinkEffect::CancelRetry => self.retry = None,
                LinkEffect::Emit(event) => self.emit(event),
                LinkEffect::Record(event) => self.telemetry.record(event),
            }
        }
        self.state_tx.send_if_modified(|state| {
            let next = self.machine.state();
            if *state == next {
                false
            } else {
                *state = next;
                true
            }
        });
    }

    fn emit(&self, event: TransportEvent) {
        // Nobody listening is fine.
        let _ = self.events.send(event);
    }
}

async fn wait_open(pending: &mut Option<BoxFuture<'static, Result<Link>>>) -> Result<Link> {
    match pending {
        Some(fut) => fut.await,
        None => pending_forever().await,
    }
}

async fn wait_link(link: &mut Option<Link>) -> LinkEvent {
    match link {
        Some(link) => link.next_event().await,
        None => pending_forever().await,
    }
}

async fn wait_retry(retry: &mut Option<Pin<Box<Sleep>>>) {
    match retry {
        Some(timer) => timer.as_mut().await,
        None => pending_forever().await,
    }
}

async fn pending_forever<T>() -> T {
    pending::<T>().await
}

/// Cloneable access to a running [`Transport`].
#[derive(Clone)]
pub struct TransportHandle {
    commands: mpsc::Sender<Command>,
    state: watch::Receiver<ConnectionState>,
}

impl TransportHandle {
    pub fn state(&self) -> ConnectionState {
        *self.state.borrow()
    }

    /// Starts connecting unless already connecting or connected.
    pub async fn connect(&self) -> Result<()> {
        self.commands
            .send(Command::Connect)
            .await
            .map_err(|_| StreamError::Closed)
    }

    /// Fire-and-forget send; never waits. A full queue drops the message.
    pub fn send(&self, message: WireMessage) {
        let kind = message.kind();
        match self.commands.try_send(Command::Send {
            message,
            reply: None,
        }) {
            Ok(()) => {}
            Err(TrySendError::Full(_)) => debug!("Transport queue full, dropping {}", kind),
            Err(TrySendError::Closed(_)) => debug!("Transport gone, dropping {}", kind),
        }
    }

    pub fn send_audio(&self, frame: &PcmFrame) {
        self.send(WireMessage::audio(frame));
    }

    /// Sends a control message and reports whether it reached the connection.
    pub async fn send_control(&self, message: WireMessage) -> Result<()> {
        let (reply, rx) = oneshot::channel();
        self.commands
            .send(Command::Send {
                message,
                reply: Some(reply),
            })
            .await
            .map_err(|_| StreamError::Closed)?;
        rx.await.map_err(|_| StreamError::Closed)?
    }

    /// Sends `Audio{empty, is_last}` then `Stop`.
    pub async fn finish(&self) -> Result<()> {
        let (reply, rx) = oneshot::channel();
        self.commands
            .send(Command::Finish { reply })
            .await
            .map_err(|_| StreamError::Closed)?;
        rx.await.map_err(|_| StreamError::Closed)?
    }

    /// Local teardown: cancels any retry and closes normally. Idempotent.
    pub async fn close(&self) -> Result<()> {
        let (reply, rx) = oneshot::channel();
        self.commands
            .send(Command::Close { reply })
            .await
            .map_err(|_| StreamError::Closed)?;
        rx.await.map_err(|_| StreamError::Closed)
    }

    pub async fn snapshot(&self) -> Result<PipelineSnapshot> {
        let (reply, rx) = oneshot::channel();
        self.commands
            .send(Command::Snapshot { reply })
            .await
            .map_err(|_| StreamError::Closed)?;
        rx.await.map_err(|_| StreamError::Closed)
    }

    /// Waits until the connection is open, up to `timeout`.
    pub async fn wait_connected(&self, timeout: Duration) -> Result<()> {
        let mut state = self.state.clone();
        // The watch guard borrows `state`; drop it before leaving the match.
        let outcome = tokio::time::timeout(timeout, async {
            state
                .wait_for(|s| *s == ConnectionState::Connected)
                .await
                .map(|_| ())
        })
        .await;

        match outcome {
            Ok(Ok(())) => Ok(()),
            Ok(Err(_)) => Err(StreamError::Closed),
            Err(_) => Err(StreamError::ConnectionLost(format!(
                "not connected after {:?}",
                timeout
            ))),
        }
    }
}

impl FrameSink for TransportHandle {
    fn on_audio_frame(&self, frame: PcmFrame) {
        self.send_audio(&frame);
    }

    fn end_of_stream(&self) -> BoxFuture<'_, Result<()>> {
        Box::pin(self.finish())
    }
}
