use thiserror::Error;

/// Every failure the pipeline can report.
///
/// Audio-path failures never cross the frame callback as errors; they degrade
/// to dropped frames and show up in telemetry instead.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum StreamError {
    /// Permission denied, no input device, unsupported format. Fatal for the capture session.
    #[error("audio device error: {0}")]
    Device(String),

    #[error("capture session is already recording")]
    AlreadyActive,

    /// A control message could not be delivered because no connection is open.
    #[error("not connected: {0} was not delivered")]
    NotConnected(&'static str),

    #[error("malformed message: {0}")]
    MalformedMessage(String),

    #[error("connection lost: {0}")]
    ConnectionLost(String),

    #[error("gave up reconnecting after {0} attempts")]
    MaxRetriesExceeded(u32),

    #[error("invalid configuration: {0}")]
    Config(String),

    /// The transport task has shut down and no longer accepts commands.
    #[error("transport closed")]
    Closed,
}

impl From<serde_json::Error> for StreamError {
    fn from(e: serde_json::Error) -> Self {
        StreamError::MalformedMessage(e.to_string())
    }
}

impl From<base64::DecodeError> for StreamError {
    fn from(e: base64::DecodeError) -> Self {
        StreamError::MalformedMessage(format!("audio payload: {}", e))
    }
}

pub type Result<T> = std::result::Result<T, StreamError>;
