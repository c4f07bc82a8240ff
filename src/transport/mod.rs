//! Message transport to the recognition service.
//!
//! [`Transport`] owns the connection on its own task; callers talk to it
//! through a cloneable [`TransportHandle`] and observe it through
//! [`TransportEvent`]s and a `watch` on [`ConnectionState`].

pub mod client;
pub mod link;
pub mod machine;
pub mod message;
pub mod state;

pub use client::{Transport, TransportHandle};
pub use link::{Connector, Link, LinkEvent, LinkPeer, Outbound, WsConnector};
pub use machine::{ConnectionMachine, LinkEffect, LinkInput};
pub use message::WireMessage;
pub use state::{ConnectionState, TransportEvent};
