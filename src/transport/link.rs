use futures_util::future::BoxFuture;
use futures_util::{SinkExt, StreamExt};
use tokio::sync::mpsc;
use tokio_tungstenite::connect_async;
use tokio_tungstenite::tungstenite::protocol::frame::coding::CloseCode;
use tokio_tungstenite::tungstenite::protocol::{CloseFrame, Message};
use tracing::{debug, info, warn};

use crate::error::{Result, StreamError};

pub const CLOSE_NORMAL: u16 = 1000;
pub const CLOSE_GOING_AWAY: u16 = 1001;

/// Normal and going-away closures end the session quietly; anything else is a loss.
pub fn is_normal_closure(code: Option<u16>) -> bool {
    matches!(code, Some(CLOSE_NORMAL) | Some(CLOSE_GOING_AWAY))
}

/// Something that happened on an open connection.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LinkEvent {
    Message(String),
    Closed { code: Option<u16>, reason: String },
    Failed(String),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Outbound {
    Text(String),
    Close(u16),
}

/// Local end of one message-framed duplex connection.
///
/// Backends pump their socket into the matching [`LinkPeer`]; the transport
/// only ever sees these channels.
#[derive(Debug)]
pub struct Link {
    outbound: mpsc::UnboundedSender<Outbound>,
    inbound: mpsc::UnboundedReceiver<LinkEvent>,
}

/// Backend end of a [`Link`].
#[derive(Debug)]
pub struct LinkPeer {
    pub outbound: mpsc::UnboundedReceiver<Outbound>,
    pub inbound: mpsc::UnboundedSender<LinkEvent>,
}

impl Link {
    pub fn channel() -> (Link, LinkPeer) {
        let (out_tx, out_rx) = mpsc::unbounded_channel();
        let (in_tx, in_rx) = mpsc::unbounded_channel();
        (
            Link {
                outbound: out_tx,
                inbound: in_rx,
            },
            LinkPeer {
                outbound: out_rx,
                inbound: in_tx,
            },
        )
    }

    pub fn send_text(&self, text: String) -> Result<()> {
        self.outbound
            .send(Outbound::Text(text))
            .map_err(|_| StreamError::ConnectionLost("connection task ended".into()))
    }

    pub fn close(self, code: u16) {
        let _ = self.outbound.send(Outbound::Close(code));
    }

    /// Next event; a vanished backend reads as an abnormal close.
    pub async fn next_event(&mut self) -> LinkEvent {
        self.inbound.recv().await.unwrap_or(LinkEvent::Closed {
            code: None,
            reason: "connection task ended".into(),
        })
    }
}

/// Opens connections. One call, one connection attempt.
pub trait Connector: Send + Sync + 'static {
    fn connect(&self) -> BoxFuture<'static, Result<Link>>;
}

/// WebSocket connector over tokio-tungstenite.
#[derive(Debug, Clone)]
pub struct WsConnector {
    url: String,
}

impl WsConnector {
    pub fn new(url: impl Into<String>) -> Self {
        Self { url: url.into() }
    }

    pub fn url(&self) -> &str {
        &self.url
    }
}

impl Connector for WsConnector {
    fn connect(&self) -> BoxFuture<'static, Result<Link>> {
        let url = self.url.clone();

        Box::pin(async move {
            debug!("Opening WebSocket to {}", url);
            let (ws_stream, _) = connect_async(url.as_str())
                .await
                .map_err(|e| StreamError::ConnectionLost(e.to_string()))?;
            info!("WebSocket handshake complete: {}", url);

            // Writer and reader run as separate tasks; the transport only sees channels.
            let (mut writer, mut reader) = ws_stream.split();
            let (link, peer) = Link::channel();
            let LinkPeer {
                outbound: mut outbound_rx,
                inbound: inbound_tx,
            } = peer;

            tokio::spawn(async move {
                while let Some(out) = outbound_rx.recv().await {
                    match out {
                        Outbound::Text(text) => {
                            if let Err(e) = writer.send(Message::text(text)).await {
                                warn!("WebSocket send failed: {}", e);
                                break;
                            }
                        }
                        Outbound::Close(code) => {
                            let frame = CloseFrame {
                                code: CloseCode::from(code),
                                reason: "".into(),
                            };
                            if let Err(e) = writer.send(Message::Close(Some(frame))).await {
                                debug!("WebSocket close frame not sent: {}", e);
                            }
                            break;
                        }
                    }
                }
            });

            tokio::spawn(async move {
                loop {
                    let next = tokio::select! {
                        _ = inbound_tx.closed() => break,
                        next = reader.next() => next,
                    };

                    let event = match next {
                        Some(Ok(Message::Text(text))) => LinkEvent::Message(text.as_str().to_owned()),
                        Some(Ok(Message::Binary(bytes))) => {
                            LinkEvent::Message(String::from_utf8_lossy(&bytes).into_owned())
                        }
                        Some(Ok(Message::Close(frame))) => {
                            let (code, reason) = match frame {
                                Some(f) => (Some(u16::from(f.code)), f.reason.as_str().to_owned()),
                                None => (None, String::new()),
                            };
                            let _ = inbound_tx.send(LinkEvent::Closed { code, reason });
                            break;
                        }
                        // Ping/Pong are answered by tungstenite itself.
                        Some(Ok(_)) => continue,
                        Some(Err(e)) => {
                            let _ = inbound_tx.send(LinkEvent::Failed(e.to_string()));
                            break;
                        }
                        None => {
                            let _ = inbound_tx.send(LinkEvent::Closed {
                                code: None,
                                reason: "stream ended".into(),
                            });
                            break;
                        }
                    };

                    if inbound_tx.send(event).is_err() {
                        break;
                    }
                }
            });

            Ok(link)
        })
    }
}
