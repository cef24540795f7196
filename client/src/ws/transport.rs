//! Transport abstraction for the live feed.
//!
//! The connection manager talks to a [`TransportLink`]: a pair of channels
//! carrying text frames out and transport events in. A [`Connector`] opens
//! links; [`TungsteniteConnector`] is the production implementation.

use std::future::Future;

use futures_util::{SinkExt, StreamExt};
use tokio::sync::mpsc;
use tokio_tungstenite::tungstenite::Message;
use tracing::{debug, warn};

use super::error::WsError;

/// Event delivered by a transport.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TransportEvent {
    /// A text frame.
    Frame(String),
    /// The transport closed, with an optional reason.
    Closed(Option<String>),
}

/// Client side of an open transport.
///
/// Dropping `outbound` closes the transport.
#[derive(Debug)]
pub struct TransportLink {
    /// Frames to send.
    pub outbound: mpsc::UnboundedSender<String>,
    /// Frames and close notifications received.
    pub inbound: mpsc::UnboundedReceiver<TransportEvent>,
}

/// Remote side of a [`TransportLink`], held by the transport driver.
#[derive(Debug)]
pub struct TransportPeer {
    /// Frames the client asked to send.
    pub outbound: mpsc::UnboundedReceiver<String>,
    /// Sink for received frames and close notifications.
    pub inbound: mpsc::UnboundedSender<TransportEvent>,
}

impl TransportLink {
    /// Creates a connected link/peer pair.
    #[must_use]
    pub fn pair() -> (Self, TransportPeer) {
        let (outbound_tx, outbound_rx) = mpsc::unbounded_channel();
        let (inbound_tx, inbound_rx) = mpsc::unbounded_channel();

        (
            Self {
                outbound: outbound_tx,
                inbound: inbound_rx,
            },
            TransportPeer {
                outbound: outbound_rx,
                inbound: inbound_tx,
            },
        )
    }
}

/// Opens transport links.
pub trait Connector: Send + Sync + 'static {
    /// Opens a link to `url`.
    fn connect(&self, url: &str) -> impl Future<Output = Result<TransportLink, WsError>> + Send;
}

/// WebSocket connector backed by tokio-tungstenite.
#[derive(Debug, Clone, Copy, Default)]
pub struct TungsteniteConnector;

impl Connector for TungsteniteConnector {
    async fn connect(&self, url: &str) -> Result<TransportLink, WsError> {
        let (ws_stream, _) = tokio_tungstenite::connect_async(url)
            .await
            .map_err(WsError::from)?;

        let (mut sink, mut source) = ws_stream.split();
        let (link, peer) = TransportLink::pair();
        let TransportPeer {
            mut outbound,
            inbound,
        } = peer;

        tokio::spawn(async move {
            while let Some(text) = outbound.recv().await {
                if let Err(e) = sink.send(Message::Text(text.into())).await {
                    warn!("WebSocket send failed: {}", e);
                    return;
                }
            }
            debug!("Outbound channel closed, closing WebSocket");
            let _ = sink.send(Message::Close(None)).await;
        });

        tokio::spawn(async move {
            while let Some(result) = source.next().await {
                match result {
                    Ok(Message::Text(text)) => {
                        if inbound
                            .send(TransportEvent::Frame(text.as_str().to_owned()))
                            .is_err()
                        {
                            return;
                        }
                    }
                    Ok(Message::Close(frame)) => {
                        let reason = frame.map(|f| f.reason.as_str().to_owned());
                        let _ = inbound.send(TransportEvent::Closed(reason));
                        return;
                    }
                    Ok(_) => {}
                    Err(e) => {
                        let _ = inbound.send(TransportEvent::Closed(Some(e.to_string())));
                        return;
                    }
                }
            }
            let _ = inbound.send(TransportEvent::Closed(None));
        });

        Ok(link)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_link_pair_carries_frames() {
        let (mut link, mut peer) = TransportLink::pair();

        link.outbound.send("hello".to_string()).expect("send");
        assert_eq!(peer.outbound.recv().await, Some("hello".to_string()));

        peer.inbound
            .send(TransportEvent::Frame("world".to_string()))
            .expect("send");
        assert_eq!(
            link.inbound.recv().await,
            Some(TransportEvent::Frame("world".to_string()))
        );
    }

    #[tokio::test]
    async fn test_dropping_link_closes_peer() {
        let (link, mut peer) = TransportLink::pair();
        drop(link);
        assert_eq!(peer.outbound.recv().await, None);
        assert!(peer.inbound.send(TransportEvent::Closed(None)).is_err());
    }

    #[tokio::test]
    async fn test_tungstenite_connect_refused() {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
            .await
            .expect("bind");
        let addr = listener.local_addr().expect("addr");
        drop(listener);

        let result = TungsteniteConnector
            .connect(&format!("ws://{}/ws/client", addr))
            .await;
        assert!(matches!(result, Err(WsError::Connection(_))));
    }
}
