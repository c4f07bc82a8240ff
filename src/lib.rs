pub mod audio;
pub mod config;
pub mod error;
pub mod session;
pub mod telemetry;
pub mod transport;

pub use config::Config;
pub use error::{Result, StreamError};
pub use session::LiveSession;
pub use transport::{ConnectionState, Transport, TransportEvent, TransportHandle, WireMessage};
