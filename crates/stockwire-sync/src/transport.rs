//! # WebSocket Transport
//!
//! The seam between the connection driver and the network. The driver only
//! ever sees a [`Connector`] that dials and a [`Connection`] that yields text
//! frames; the production pair wraps `tokio-tungstenite`.
//!
//! ```text
//! ┌──────────────────┐  connect(url)   ┌──────────────┐
//! │ ConnectionManager│ ──────────────► │  Connector   │
//! │   (driver task)  │                 └──────┬───────┘
//! │                  │  next_frame()          │ Connection
//! │                  │ ◄───────────────────── ▼
//! │                  │  send_text / ping / close
//! └──────────────────┘
//! ```
//!
//! Control frames (ping/pong) and binary frames never reach the driver.
//! A close frame and the end of the stream both read as `None`.

use futures_util::{SinkExt, StreamExt};
use std::future::Future;
use tokio::net::TcpStream;
use tokio_tungstenite::tungstenite::Message as WsMessage;
use tokio_tungstenite::{connect_async, MaybeTlsStream, WebSocketStream};
use tracing::{debug, info, warn};

use crate::error::SyncResult;

// =============================================================================
// Transport Seam
// =============================================================================

/// Opens connections to the inventory feed.
pub trait Connector: Send + Sync + 'static {
    type Connection: Connection;

    /// Dials `url`. The driver bounds this with the connect timeout.
    fn connect(&self, url: &str) -> impl Future<Output = SyncResult<Self::Connection>> + Send;
}

/// One open feed connection.
pub trait Connection: Send + 'static {
    /// Sends one text frame.
    fn send_text(&mut self, text: String) -> impl Future<Output = SyncResult<()>> + Send;

    /// Waits for the next text frame. `None` once the connection is closed.
    ///
    /// Must be cancel-safe: the driver drops this future whenever another
    /// event wins the race.
    fn next_frame(&mut self) -> impl Future<Output = Option<SyncResult<String>>> + Send;

    /// Sends a keepalive ping.
    fn ping(&mut self) -> impl Future<Output = SyncResult<()>> + Send;

    /// Closes the connection. Errors are ignored.
    fn close(&mut self) -> impl Future<Output = ()> + Send;
}

// =============================================================================
// tokio-tungstenite Implementation
// =============================================================================

/// Production connector over `tokio-tungstenite` (ws:// and wss://).
#[derive(Debug, Clone, Copy, Default)]
pub struct WsConnector;

impl Connector for WsConnector {
    type Connection = WsConnection;

    async fn connect(&self, url: &str) -> SyncResult<WsConnection> {
        let (stream, response) = connect_async(url).await?;
        debug!(status = ?response.status(), "WebSocket handshake complete");
        Ok(WsConnection { stream })
    }
}

/// An open WebSocket.
pub struct WsConnection {
    stream: WebSocketStream<MaybeTlsStream<TcpStream>>,
}

impl Connection for WsConnection {
    async fn send_text(&mut self, text: String) -> SyncResult<()> {
        self.stream.send(WsMessage::Text(text.into())).await?;
        Ok(())
    }

    async fn next_frame(&mut self) -> Option<SyncResult<String>> {
        loop {
            match self.stream.next().await? {
                Ok(WsMessage::Text(text)) => return Some(Ok(text.as_str().to_owned())),
                Ok(WsMessage::Close(frame)) => {
                    info!(?frame, "Received close frame");
                    return None;
                }
                Ok(WsMessage::Ping(_)) => {
                    // tungstenite queues the pong itself
                    debug!("Received ping");
                }
                Ok(WsMessage::Pong(_)) => {
                    debug!("Received pong");
                }
                Ok(WsMessage::Binary(_)) => {
                    warn!("Received unexpected binary message");
                }
                Ok(WsMessage::Frame(_)) => {
                    // Raw frame, ignore
                }
                Err(e) => return Some(Err(e.into())),
            }
        }
    }

    async fn ping(&mut self) -> SyncResult<()> {
        self.stream.send(WsMessage::Ping(Vec::new().into())).await?;
        debug!("Sent ping");
        Ok(())
    }

    async fn close(&mut self) {
        if let Err(e) = self.stream.close(None).await {
            debug!(error = %e, "Error while closing WebSocket");
        }
    }
}
