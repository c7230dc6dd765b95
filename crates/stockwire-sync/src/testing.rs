//! In-memory transport for driving the connection manager in tests.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use tokio::sync::mpsc;

use crate::error::{SyncError, SyncResult};
use crate::transport::{Connection, Connector};

/// How the next dial attempts behave.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Dial {
    Accept,
    Refuse,
    /// Never completes; only the connect timeout ends it.
    Hang,
}

/// Scripted connector. Every accepted dial hands a [`MockServer`] to the test.
pub(crate) struct MockConnector {
    dial: Arc<Mutex<Dial>>,
    attempts: Arc<AtomicUsize>,
    servers: mpsc::UnboundedSender<MockServer>,
}

/// Test-side controls for a [`MockConnector`].
pub(crate) struct MockControl {
    dial: Arc<Mutex<Dial>>,
    attempts: Arc<AtomicUsize>,
    pub servers: mpsc::UnboundedReceiver<MockServer>,
}

impl MockConnector {
    pub fn new(dial: Dial) -> (Self, MockControl) {
        let dial = Arc::new(Mutex::new(dial));
        let attempts = Arc::new(AtomicUsize::new(0));
        let (servers_tx, servers_rx) = mpsc::unbounded_channel();
        (
            MockConnector {
                dial: dial.clone(),
                attempts: attempts.clone(),
                servers: servers_tx,
            },
            MockControl {
                dial,
                attempts,
                servers: servers_rx,
            },
        )
    }
}

impl MockControl {
    pub fn set_dial(&self, dial: Dial) {
        *self.dial.lock().unwrap() = dial;
    }

    /// Number of connect calls so far.
    pub fn attempts(&self) -> usize {
        self.attempts.load(Ordering::SeqCst)
    }

    /// Waits for the next accepted connection.
    pub async fn accept(&mut self) -> MockServer {
        self.servers.recv().await.expect("connector dropped")
    }
}

impl Connector for MockConnector {
    type Connection = MockConnection;

    async fn connect(&self, _url: &str) -> SyncResult<MockConnection> {
        self.attempts.fetch_add(1, Ordering::SeqCst);
        let dial = *self.dial.lock().unwrap();

        match dial {
            Dial::Refuse => Err(SyncError::ConnectionFailed("connection refused".into())),
            Dial::Hang => std::future::pending().await,
            Dial::Accept => {
                let (frames_tx, frames_rx) = mpsc::unbounded_channel();
                let (sent_tx, sent_rx) = mpsc::unbounded_channel();
                let pings = Arc::new(AtomicUsize::new(0));
                let _ = self.servers.send(MockServer {
                    frames: frames_tx,
                    sent: sent_rx,
                    pings: pings.clone(),
                });
                Ok(MockConnection {
                    frames: frames_rx,
                    sent: sent_tx,
                    pings,
                })
            }
        }
    }
}

enum ServerEvent {
    Frame(String),
    Fail,
}

/// Server end of one mock connection. Dropping it closes the connection.
pub(crate) struct MockServer {
    frames: mpsc::UnboundedSender<ServerEvent>,
    sent: mpsc::UnboundedReceiver<String>,
    pings: Arc<AtomicUsize>,
}

impl MockServer {
    /// Pushes one text frame to the client.
    pub fn push(&self, frame: impl Into<String>) {
        let _ = self.frames.send(ServerEvent::Frame(frame.into()));
    }

    /// Breaks the connection with a transport error.
    pub fn fail(&self) {
        let _ = self.frames.send(ServerEvent::Fail);
    }

    /// Next frame the client sent, `None` once the client hung up.
    pub async fn next_sent(&mut self) -> Option<String> {
        self.sent.recv().await
    }

    /// Frames the client has sent and that have not been read yet.
    pub fn drain_sent(&mut self) -> Vec<String> {
        let mut frames = Vec::new();
        while let Ok(frame) = self.sent.try_recv() {
            frames.push(frame);
        }
        frames
    }

    pub fn pings(&self) -> usize {
        self.pings.load(Ordering::SeqCst)
    }
}

/// Client end of one mock connection.
pub(crate) struct MockConnection {
    frames: mpsc::UnboundedReceiver<ServerEvent>,
    sent: mpsc::UnboundedSender<String>,
    pings: Arc<AtomicUsize>,
}

impl Connection for MockConnection {
    async fn send_text(&mut self, text: String) -> SyncResult<()> {
        self.sent.send(text).map_err(|_| SyncError::Disconnected)
    }

    async fn next_frame(&mut self) -> Option<SyncResult<String>> {
        match self.frames.recv().await? {
            ServerEvent::Frame(text) => Some(Ok(text)),
            ServerEvent::Fail => Some(Err(SyncError::ConnectionFailed(
                "connection reset by peer".into(),
            ))),
        }
    }

    async fn ping(&mut self) -> SyncResult<()> {
        self.pings.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    async fn close(&mut self) {
        self.frames.close();
    }
}
