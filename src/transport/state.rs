use std::fmt;

use super::message::WireMessage;
use crate::error::StreamError;

/// Connection lifecycle. Only the transport task changes it; everyone else observes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ConnectionState {
    #[default]
    Disconnected,
    Connecting,
    Connected,
    /// Waiting out the retry delay before attempt number `attempt`.
    Reconnecting { attempt: u32 },
}

impl fmt::Display for ConnectionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConnectionState::Disconnected => write!(f, "disconnected"),
            ConnectionState::Connecting => write!(f, "connecting"),
            ConnectionState::Connected => write!(f, "connected"),
            ConnectionState::Reconnecting { attempt } => write!(f, "reconnecting ({})", attempt),
        }
    }
}

/// What the transport reports upward.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TransportEvent {
    StatusChanged(ConnectionState),
    /// A decoded inbound message. Local decode failures also arrive here as
    /// `WireMessage::Error`.
    Message(WireMessage),
    /// The session cannot continue without a manual restart.
    Fatal(StreamError),
}
