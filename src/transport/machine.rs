use std::time::Duration;

use tracing::{debug, error, info, warn};

use super::link::{is_normal_closure, CLOSE_NORMAL};
use super::state::{ConnectionState, TransportEvent};
use crate::error::StreamError;
use crate::telemetry::PipelineEvent;

/// Inputs to the connection state machine.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LinkInput {
    /// `explicit` is a caller's `connect()`; implicit requests come from audio
    /// sent while down and are ignored once the transport has halted.
    Connect { explicit: bool },
    Opened,
    Closed { code: Option<u16> },
    Failed(String),
    RetryElapsed,
    CloseRequested,
}

/// Work for the driver. The machine itself never touches I/O or timers.
#[derive(Debug, Clone, PartialEq)]
pub enum LinkEffect {
    /// Dispose of any existing connection, then start a new attempt.
    Open,
    /// Close the live connection (or abandon the handshake) with this code.
    Close(u16),
    /// Forget a connection that is already gone.
    Release,
    /// Start the retry timer, replacing any pending one.
    ArmRetry(Duration),
    CancelRetry,
    Emit(TransportEvent),
    Record(PipelineEvent),
}

/// Reconnect policy: fixed delay, bounded attempts, at most one pending retry.
#[derive(Debug)]
pub struct ConnectionMachine {
    state: ConnectionState,
    attempt: u32,
    max_attempts: u32,
    retry_delay: Duration,
    retry_armed: bool,
    /// Set by a local close or by running out of attempts. Only an explicit
    /// connect clears it.
    halted: bool,
}

impl ConnectionMachine {
    pub fn new(max_attempts: u32, retry_delay: Duration) -> Self {
        Self {
            state: ConnectionState::Disconnected,
            attempt: 0,
            max_attempts,
            retry_delay,
            retry_armed: false,
            halted: false,
        }
    }

    pub fn state(&self) -> ConnectionState {
        self.state
    }

    pub fn attempt(&self) -> u32 {
        self.attempt
    }

    pub fn is_halted(&self) -> bool {
        self.halted
    }

    pub fn retry_pending(&self) -> bool {
        self.retry_armed
    }

    /// Pure step: input in, effects out.
    pub fn step(&mut self, input: LinkInput) -> Vec<LinkEffect> {
        let mut effects = Vec::new();

        match input {
            LinkInput::Connect { explicit } => self.request_connect(explicit, &mut effects),
            LinkInput::RetryElapsed => {
                self.retry_armed = false;
                if matches!(self.state, ConnectionState::Reconnecting { .. }) {
                    info!("Retry timer fired, reconnecting (attempt {})", self.attempt);
                    self.open(&mut effects);
                }
            }
            LinkInput::Opened => {
                if self.state != ConnectionState::Connecting {
                    debug!("Discarding connection opened in state {}", self.state);
                    effects.push(LinkEffect::Close(CLOSE_NORMAL));
                    return effects;
                }
                self.attempt = 0;
                self.transition(ConnectionState::Connected, &mut effects);
                effects.push(LinkEffect::Record(PipelineEvent::Connected));
            }
            LinkInput::Closed { code } => {
                let reason = match code {
                    Some(code) => format!("closed with code {}", code),
                    None => "closed without status".to_string(),
                };
                self.on_loss(code, reason, &mut effects);
            }
            LinkInput::Failed(reason) => self.on_loss(None, reason, &mut effects),
            LinkInput::CloseRequested => {
                self.halted = true;
                self.cancel_retry(&mut effects);
                if matches!(
                    self.state,
                    ConnectionState::Connecting | ConnectionState::Connected
                ) {
                    effects.push(LinkEffect::Close(CLOSE_NORMAL));
                }
                self.transition(ConnectionState::Disconnected, &mut effects);
            }
        }

        effects
    }

    fn request_connect(&mut self, explicit: bool, effects: &mut Vec<LinkEffect>) {
        if matches!(
            self.state,
            ConnectionState::Connecting | ConnectionState::Connected
        ) {
            debug!("Connect ignored: already {}", self.state);
            return;
        }

        if !explicit {
            // Audio nudges only revive an idle transport. While a retry is
            // armed the timer owns the next attempt, or the delay is lost.
            if self.halted {
                debug!("Reconnect suppressed: transport is halted");
                return;
            }
            if self.retry_armed || self.state != ConnectionState::Disconnected {
                debug!("Reconnect deferred to the retry timer ({})", self.state);
                return;
            }
        } else if self.halted {
            self.halted = false;
            self.attempt = 0;
        }

        self.open(effects);
    }

    fn open(&mut self, effects: &mut Vec<LinkEffect>) {
        self.cancel_retry(effects);
        effects.push(LinkEffect::Open);
        self.transition(ConnectionState::Connecting, effects);
    }

    fn on_loss(&mut self, code: Option<u16>, reason: String, effects: &mut Vec<LinkEffect>) {
        if !matches!(
            self.state,
            ConnectionState::Connecting | ConnectionState::Connected
        ) {
            debug!("Ignoring '{}' while {}", reason, self.state);
            return;
        }

        effects.push(LinkEffect::Release);

        if is_normal_closure(code) {
            info!("Connection closed normally: {}", reason);
            self.cancel_retry(effects);
            self.transition(ConnectionState::Disconnected, effects);
            return;
        }

        // Abnormal: count it. attempt N means N retries scheduled since the last open.
        self.attempt += 1;
        if self.attempt > self.max_attempts {
            error!(
                "Connection lost ({}); giving up after {} attempts",
                reason, self.max_attempts
            );
            self.halted = true;
            self.cancel_retry(effects);
            self.transition(ConnectionState::Disconnected, effects);
            effects.push(LinkEffect::Record(PipelineEvent::RetriesExhausted));
            effects.push(LinkEffect::Emit(TransportEvent::Fatal(
                StreamError::MaxRetriesExceeded(self.max_attempts),
            )));
            return;
        }

        warn!(
            "Connection lost ({}); retry {}/{} in {:?}",
            reason, self.attempt, self.max_attempts, self.retry_delay
        );
        self.transition(
            ConnectionState::Reconnecting {
                attempt: self.attempt,
            },
            effects,
        );
        self.retry_armed = true;
        effects.push(LinkEffect::ArmRetry(self.retry_delay));
        effects.push(LinkEffect::Record(PipelineEvent::ReconnectScheduled {
            attempt: self.attempt,
        }));
    }

    fn cancel_retry(&mut self, effects: &mut Vec<LinkEffect>) {
        if self.retry_armed {
            self.retry_armed = false;
            effects.push(LinkEffect::CancelRetry);
        }
    }

    fn transition(&mut self, next: ConnectionState, effects: &mut Vec<LinkEffect>) {
        if self.state == next {
            return;
        }
        debug!("Connection state: {} -> {}", self.state, next);
        self.state = next;
        effects.push(LinkEffect::Emit(TransportEvent::StatusChanged(next)));
    }
}
