//! # Connection Manager
//!
//! The only public entry point of the inventory client. Owns the connection
//! lifecycle and composes the decoder, the store and the command channel.
//!
//! ## Manager Architecture
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                    ConnectionManager Architecture                       │
//! │                                                                         │
//! │  CALLER THREADS (never wait on the network)                            │
//! │  ──────────────────────────────────────────                            │
//! │  snapshot() / connection_state() / last_error() / subscribe()          │
//! │        │ read                                                           │
//! │        ▼                                                                │
//! │  ┌──────────────┐   send_command()   ┌──────────────┐                  │
//! │  │ ReplicaStore │ ◄───────────────── │CommandChannel│ ── try_send ──┐  │
//! │  └──────▲───────┘   (state check)    └──────────────┘               │  │
//! │         │ apply / set_connection_state / record_error               │  │
//! │         │                                                           ▼  │
//! │  ┌──────┴──────────────────────────────────────────────────────────────┐│
//! │  │  DRIVER TASK (one per client, sole writer)                          ││
//! │  │                                                                     ││
//! │  │  ConnectionMachine ── Connecting ─► dial (connect timeout)          ││
//! │  │                    ── Connected  ─► frames → decode → apply         ││
//! │  │                                     commands → send_text            ││
//! │  │                                     keepalive ping                  ││
//! │  │                    ── Backoff    ─► retry timer                     ││
//! │  │                    ── Failed     ─► wait for resync()               ││
//! │  └──────▲──────────────────────────────────────────────────────────────┘│
//! │         │ Control::{Resync, Shutdown}                                   │
//! │  resync() / shutdown()                                                  │
//! │                                                                         │
//! │  STATUS EVENTS (InventoryEventEmitter):                                │
//! │  • emit_status(state)            every state change                    │
//! │  • emit_error(err, retryable)    transport/protocol errors (true)      │
//! │                                  exhausted retries (false)             │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! Every input the driver reacts to (socket frame, timer, command, control
//! request) is handled to completion before the next one, so replica writes
//! and state transitions never interleave.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio::time::{interval_at, timeout, Instant, MissedTickBehavior};
use tracing::{debug, error, info, info_span, warn, Instrument};
use uuid::Uuid;

use stockwire_core::{Replica, UpdateEvent};

use crate::command::CommandChannel;
use crate::config::ClientConfig;
use crate::error::{SyncError, SyncResult};
use crate::machine::{ConnectionMachine, ConnectionState, Transition};
use crate::protocol::{decode_frame, preview, Command};
use crate::store::{ReplicaStore, StoreSnapshot, Subscription};
use crate::transport::{Connection, Connector, WsConnector};

// =============================================================================
// Event Emitter Trait
// =============================================================================

/// Trait for surfacing client events to a host (UI toasts, status bars).
pub trait InventoryEventEmitter: Send + Sync {
    /// Emits a connection state change.
    fn emit_status(&self, state: ConnectionState);

    /// Emits an error. `retryable` is false only when the client gave up.
    fn emit_error(&self, error: &SyncError, retryable: bool);
}

/// No-op event emitter.
pub struct NoOpEmitter;

impl InventoryEventEmitter for NoOpEmitter {
    fn emit_status(&self, _state: ConnectionState) {}
    fn emit_error(&self, _error: &SyncError, _retryable: bool) {}
}

// =============================================================================
// Connection Manager
// =============================================================================

/// Requests from the public API to the driver task.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Control {
    Resync,
    Shutdown,
}

/// Flags shared between the manager and its driver.
#[derive(Debug, Default)]
struct DriverFlags {
    /// Set once shutdown begins; late frames and transitions are discarded.
    closing: AtomicBool,
    /// True while a backoff timer is armed.
    retry_pending: AtomicBool,
}

impl DriverFlags {
    fn is_closing(&self) -> bool {
        self.closing.load(Ordering::SeqCst)
    }
}

/// Everything the driver takes ownership of on `start()`.
struct DriverParts<C> {
    connector: C,
    command_rx: mpsc::Receiver<Command>,
    control_rx: mpsc::UnboundedReceiver<Control>,
}

/// Inventory feed client.
///
/// ## Usage
/// ```rust,ignore
/// let config = ClientConfig::load(None)?;
/// let client = ConnectionManager::new(config)?;
///
/// let _subscription = client.subscribe(|snapshot| {
///     println!("{} items ({})", snapshot.replica.len(), snapshot.connection);
/// });
/// client.start()?;
///
/// // Later: manual refresh, then teardown
/// client.send_command(Command::GetInventory)?;
/// client.shutdown().await?;
/// ```
pub struct ConnectionManager<C: Connector = WsConnector> {
    /// Client identity (tracing span field).
    id: Uuid,

    /// Validated configuration.
    config: ClientConfig,

    store: Arc<ReplicaStore>,

    commands: CommandChannel,

    control_tx: mpsc::UnboundedSender<Control>,

    emitter: Arc<dyn InventoryEventEmitter>,

    flags: Arc<DriverFlags>,

    /// Present until `start()` hands it to the driver.
    parts: Mutex<Option<DriverParts<C>>>,

    /// Driver task handle (set after start).
    task: Mutex<Option<JoinHandle<()>>>,
}

impl ConnectionManager<WsConnector> {
    /// Creates a WebSocket client. Nothing connects until [`start`](Self::start).
    pub fn new(config: ClientConfig) -> SyncResult<Self> {
        Self::with_connector(config, WsConnector)
    }
}

impl<C: Connector> ConnectionManager<C> {
    /// Creates a client dialing through `connector`.
    pub fn with_connector(config: ClientConfig, connector: C) -> SyncResult<Self> {
        config.validate()?;

        let store = ReplicaStore::new();
        let (commands, command_rx) = CommandChannel::new(store.clone());
        let (control_tx, control_rx) = mpsc::unbounded_channel();

        Ok(ConnectionManager {
            id: Uuid::new_v4(),
            config,
            store,
            commands,
            control_tx,
            emitter: Arc::new(NoOpEmitter),
            flags: Arc::new(DriverFlags::default()),
            parts: Mutex::new(Some(DriverParts {
                connector,
                command_rx,
                control_rx,
            })),
            task: Mutex::new(None),
        })
    }

    /// Replaces the event emitter. Takes effect at [`start`](Self::start).
    pub fn with_emitter(mut self, emitter: Arc<dyn InventoryEventEmitter>) -> Self {
        self.emitter = emitter;
        self
    }

    // =========================================================================
    // Lifecycle
    // =========================================================================

    /// Spawns the driver task and begins connecting. Idempotent.
    ///
    /// Must be called from within a tokio runtime.
    pub fn start(&self) -> SyncResult<()> {
        if self.flags.is_closing() {
            return Err(SyncError::ShuttingDown);
        }

        let runtime = tokio::runtime::Handle::try_current()
            .map_err(|e| SyncError::Internal(format!("No tokio runtime: {}", e)))?;

        let url = self
            .config
            .url()
            .ok_or_else(|| SyncError::InvalidConfig("server.url is required".into()))?
            .to_string();

        let Some(parts) = lock(&self.parts).take() else {
            debug!(client_id = %self.id, "Inventory client already started");
            return Ok(());
        };

        info!(client_id = %self.id, url = %url, "Starting inventory client");

        let driver = Driver {
            url,
            connect_timeout: self.config.connect_timeout(),
            ping_interval: self.config.ping_interval(),
            connector: parts.connector,
            machine: ConnectionMachine::new(self.config.reconnect),
            store: self.store.clone(),
            commands: self.commands.clone(),
            command_rx: parts.command_rx,
            control_rx: parts.control_rx,
            emitter: self.emitter.clone(),
            flags: self.flags.clone(),
        };

        let span = info_span!("inventory_client", client_id = %self.id);
        *lock(&self.task) = Some(runtime.spawn(driver.run().instrument(span)));

        Ok(())
    }

    /// Manual resync.
    ///
    /// Leaves `Failed` with a fresh attempt budget, cuts a pending backoff
    /// short, or re-requests the snapshot when already connected. Starts the
    /// client if it was never started.
    pub fn resync(&self) -> SyncResult<()> {
        if self.flags.is_closing() {
            return Err(SyncError::ShuttingDown);
        }

        if lock(&self.parts).is_some() {
            return self.start();
        }

        self.control_tx
            .send(Control::Resync)
            .map_err(|_| SyncError::ChannelError("Connection task stopped".into()))
    }

    /// Stops the client: cancels any retry timer, closes the socket and
    /// discards the replica. Safe to call any number of times.
    pub async fn shutdown(&self) -> SyncResult<()> {
        let first = !self.flags.closing.swap(true, Ordering::SeqCst);
        if first {
            info!(client_id = %self.id, "Shutting down inventory client");
        }

        let _ = self.control_tx.send(Control::Shutdown);
        lock(&self.parts).take();

        let task = lock(&self.task).take();
        if let Some(task) = task {
            if let Err(e) = task.await {
                warn!(client_id = %self.id, error = %e, "Connection task ended abnormally");
            }
        }

        self.flags.retry_pending.store(false, Ordering::SeqCst);

        let was = self.store.connection_state();
        self.store.reset();
        if was != ConnectionState::Disconnected {
            self.emitter.emit_status(ConnectionState::Disconnected);
        }

        if first {
            info!(client_id = %self.id, "Inventory client stopped");
        }
        Ok(())
    }

    // =========================================================================
    // Commands
    // =========================================================================

    /// Sends `command` if connected. Never waits; see [`CommandChannel::send`].
    pub fn send_command(&self, command: Command) -> SyncResult<()> {
        if self.flags.is_closing() {
            return Err(SyncError::ShuttingDown);
        }
        self.commands.send(command)
    }

    // =========================================================================
    // Queries
    // =========================================================================

    /// Current replica.
    pub fn snapshot(&self) -> Arc<Replica> {
        self.store.snapshot()
    }

    pub fn connection_state(&self) -> ConnectionState {
        self.store.connection_state()
    }

    /// Most recently recorded error, if any.
    pub fn last_error(&self) -> Option<SyncError> {
        self.store.last_error()
    }

    /// Registers `listener` for replica and connection changes.
    pub fn subscribe<F>(&self, listener: F) -> Subscription
    where
        F: Fn(&StoreSnapshot) + Send + Sync + 'static,
    {
        self.store.subscribe(listener)
    }

    /// Returns true while a backoff timer is armed.
    pub fn has_pending_retry(&self) -> bool {
        self.flags.retry_pending.load(Ordering::SeqCst)
    }

    pub fn client_id(&self) -> Uuid {
        self.id
    }

    pub fn config(&self) -> &ClientConfig {
        &self.config
    }

    /// The underlying store.
    pub fn store(&self) -> &Arc<ReplicaStore> {
        &self.store
    }
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

// =============================================================================
// Driver Task
// =============================================================================

/// What the run loop does after a phase ends.
enum Step {
    Continue,
    Stop,
}

enum SessionEvent {
    Control(Option<Control>),
    Frame(Option<SyncResult<String>>),
    Command(Command),
    Keepalive,
}

struct Driver<C: Connector> {
    url: String,
    connect_timeout: Duration,
    ping_interval: Duration,
    connector: C,
    machine: ConnectionMachine,
    store: Arc<ReplicaStore>,
    commands: CommandChannel,
    command_rx: mpsc::Receiver<Command>,
    control_rx: mpsc::UnboundedReceiver<Control>,
    emitter: Arc<dyn InventoryEventEmitter>,
    flags: Arc<DriverFlags>,
}

impl<C: Connector> Driver<C> {
    /// Main driver loop.
    async fn run(mut self) {
        let t = self.machine.start();
        self.publish(t);

        loop {
            let step = match self.machine.state() {
                ConnectionState::Connecting => self.connect().await,
                ConnectionState::Backoff { delay_ms, .. } => self.backoff(delay_ms).await,
                ConnectionState::Failed => self.failed().await,
                ConnectionState::Connected | ConnectionState::Disconnected => Step::Stop,
            };
            if let Step::Stop = step {
                break;
            }
        }

        let t = self.machine.shutdown();
        self.publish(t);
        self.flags.retry_pending.store(false, Ordering::SeqCst);
        info!("Connection task stopped");
    }

    /// `Connecting`: dial with a timeout, then run the session.
    async fn connect(&mut self) -> Step {
        debug!(
            url = %self.url,
            attempt = self.machine.failures() + 1,
            "Connecting to inventory feed"
        );

        let result = {
            let dial = timeout(self.connect_timeout, self.connector.connect(&self.url));
            tokio::pin!(dial);

            loop {
                tokio::select! {
                    biased;

                    control = self.control_rx.recv() => match control {
                        Some(Control::Resync) => debug!("Resync ignored: already connecting"),
                        Some(Control::Shutdown) | None => return Step::Stop,
                    },

                    result = &mut dial => break result,
                }
            }
        };

        match result {
            Ok(Ok(connection)) => {
                let t = self.machine.on_open();
                // Callers cannot queue for this connection until it is published.
                self.reject_queued(t.from);
                self.publish(t);
                self.request_snapshot();
                self.session(connection).await
            }
            Ok(Err(e)) => {
                self.transport_error(e);
                self.lose_connection();
                Step::Continue
            }
            Err(_) => {
                self.transport_error(SyncError::Timeout(self.connect_timeout.as_secs()));
                self.lose_connection();
                Step::Continue
            }
        }
    }

    /// `Connected`: frames in, commands out, keepalive, control.
    async fn session(&mut self, mut connection: C::Connection) -> Step {
        let mut keepalive = interval_at(Instant::now() + self.ping_interval, self.ping_interval);
        keepalive.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            let event = tokio::select! {
                biased;

                control = self.control_rx.recv() => SessionEvent::Control(control),
                frame = connection.next_frame() => SessionEvent::Frame(frame),
                Some(command) = self.command_rx.recv() => SessionEvent::Command(command),
                _ = keepalive.tick() => SessionEvent::Keepalive,
            };

            match event {
                SessionEvent::Control(Some(Control::Resync)) => {
                    info!("Resync requested while connected");
                    self.request_snapshot();
                }
                SessionEvent::Control(Some(Control::Shutdown) | None) => {
                    connection.close().await;
                    return Step::Stop;
                }
                SessionEvent::Frame(Some(Ok(text))) => self.handle_frame(&text),
                SessionEvent::Frame(Some(Err(e))) => {
                    self.transport_error(e);
                    self.lose_connection();
                    return Step::Continue;
                }
                SessionEvent::Frame(None) => {
                    info!("Inventory feed closed the connection");
                    self.transport_error(SyncError::Disconnected);
                    self.lose_connection();
                    return Step::Continue;
                }
                SessionEvent::Command(command) => {
                    let json = match command.to_json() {
                        Ok(json) => json,
                        Err(e) => {
                            let err = SyncError::from(e);
                            warn!(command = command.type_name(), error = %err, "Failed to encode command");
                            self.store.record_error(err);
                            continue;
                        }
                    };

                    debug!(command = command.type_name(), "Sending command");
                    if let Err(e) = connection.send_text(json).await {
                        self.transport_error(e);
                        self.lose_connection();
                        return Step::Continue;
                    }
                }
                SessionEvent::Keepalive => {
                    if let Err(e) = connection.ping().await {
                        self.transport_error(e);
                        self.lose_connection();
                        return Step::Continue;
                    }
                }
            }
        }
    }

    /// `Backoff`: wait out the delay unless a control request arrives.
    async fn backoff(&mut self, delay_ms: u64) -> Step {
        debug!(delay_ms, "Waiting before reconnect");

        let sleep = tokio::time::sleep(Duration::from_millis(delay_ms));
        tokio::pin!(sleep);

        tokio::select! {
            biased;

            control = self.control_rx.recv() => match control {
                Some(Control::Resync) => {
                    info!("Resync requested during backoff");
                    let t = self.machine.resync();
                    self.publish(t);
                    Step::Continue
                }
                Some(Control::Shutdown) | None => Step::Stop,
            },

            _ = &mut sleep => {
                let t = self.machine.on_retry_due();
                self.publish(t);
                Step::Continue
            }
        }
    }

    /// `Failed`: nothing happens until a manual resync.
    async fn failed(&mut self) -> Step {
        match self.control_rx.recv().await {
            Some(Control::Resync) => {
                info!("Manual resync after giving up");
                let t = self.machine.resync();
                self.publish(t);
                Step::Continue
            }
            Some(Control::Shutdown) | None => Step::Stop,
        }
    }

    // =========================================================================
    // Effects
    // =========================================================================

    fn handle_frame(&self, text: &str) {
        if self.flags.is_closing() {
            debug!("Discarding frame received during shutdown");
            return;
        }

        let event = decode_frame(text);
        if let UpdateEvent::Malformed { raw, reason } = &event {
            warn!(reason = %reason, frame = %preview(raw), "Malformed inventory frame");
            let err = SyncError::Protocol {
                reason: reason.clone(),
            };
            self.store.record_error(err.clone());
            self.emitter.emit_error(&err, true);
            return;
        }

        debug!(kind = event.kind(), items = event.item_count(), "Applying inventory update");
        self.store.apply(&event);
    }

    fn request_snapshot(&self) {
        if self.flags.is_closing() {
            return;
        }
        match self.commands.send(Command::GetInventory) {
            Ok(()) => debug!("Requested inventory snapshot"),
            Err(e) => warn!(error = %e, "Could not request inventory snapshot"),
        }
    }

    fn transport_error(&self, err: SyncError) {
        if self.flags.is_closing() {
            return;
        }
        warn!(error = %err, "Inventory feed connection error");
        self.store.record_error(err.clone());
        self.emitter.emit_error(&err, err.is_retryable());
    }

    /// Feeds a connection loss to the machine. Commands still queued for the
    /// lost connection are rejected.
    fn lose_connection(&mut self) {
        let t = self.machine.on_connection_lost();
        self.publish(t);
        self.reject_queued(t.to);
    }

    /// Drops every queued command; none of them may reach another connection.
    fn reject_queued(&mut self, state: ConnectionState) {
        while let Ok(command) = self.command_rx.try_recv() {
            self.commands.reject(command, state);
        }
    }

    /// Applies a transition's side effects.
    fn publish(&self, t: Transition) {
        if !t.changed() {
            return;
        }

        self.flags.retry_pending.store(
            matches!(t.to, ConnectionState::Backoff { .. }),
            Ordering::SeqCst,
        );

        if self.flags.is_closing() {
            return;
        }

        info!(from = %t.from, to = %t.to, "Connection state changed");
        self.store.set_connection_state(t.to);
        self.emitter.emit_status(t.to);

        if t.entered_failed() {
            let err = SyncError::ExhaustedRetries {
                attempts: self.machine.failures(),
            };
            error!(attempts = self.machine.failures(), "Giving up on inventory feed; resync required");
            self.store.record_error(err.clone());
            self.emitter.emit_error(&err, false);
        }
    }
}
