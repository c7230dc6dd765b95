//! # Reconnect State Machine
//!
//! The connection lifecycle as a plain, synchronous transition table. The
//! async driver in [`crate::manager`] feeds it inputs (socket opened, socket
//! lost, timer fired, ...) and performs whatever the entered state implies.
//! Nothing here touches a socket or a clock.
//!
//! ## Connection Lifecycle
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                    Inventory Connection States                          │
//! │                                                                         │
//! │  ┌────────────┐    start()      ┌────────────┐   on_open()              │
//! │  │Disconnected│ ──────────────► │ Connecting │ ──────────┐              │
//! │  └────────────┘                 └─────┬──────┘           ▼              │
//! │        ▲                              │          ┌────────────┐         │
//! │        │                  on_connection_lost()   │ Connected  │         │
//! │        │                              │          └─────┬──────┘         │
//! │    shutdown()                         ▼                │                │
//! │   (any state)                   ┌────────────┐         │                │
//! │                                 │  Backoff   │ ◄───────┘                │
//! │                                 │ (n, delay) │   on_connection_lost()   │
//! │                                 └─────┬──────┘                          │
//! │                      on_retry_due()   │   n == max_attempts             │
//! │                      → Connecting     ▼                                 │
//! │                                 ┌────────────┐   resync()               │
//! │                                 │   Failed   │ ──────────► Connecting   │
//! │                                 └────────────┘                          │
//! │                                                                         │
//! │  BACKOFF STRATEGY (ExponentialBackoff, no jitter)                      │
//! │  ─────────────────────────────────────────────────                     │
//! │  delay(n) = min(base_delay_ms * 2^n, max_delay_ms), n = failures so far│
//! │  base 1000 / max 30000: 1s, 2s, 4s, 8s, 16s, 30s, 30s ...              │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! The failure that reaches `max_attempts` moves straight to `Failed`: no
//! retry timer is armed for it, so `Backoff(max_attempts, _)` is never
//! observable.

use backoff::backoff::Backoff;
use backoff::ExponentialBackoff;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::time::Duration;

// =============================================================================
// Connection State
// =============================================================================

/// Connection state of the inventory client.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum ConnectionState {
    /// Not connected (initial state, and after shutdown).
    #[default]
    Disconnected,
    /// Attempting to connect.
    Connecting,
    /// Connected and receiving updates.
    Connected,
    /// Waiting `delay_ms` before reconnect attempt number `attempt`.
    Backoff { attempt: u32, delay_ms: u64 },
    /// Gave up reconnecting; a manual resync is required.
    Failed,
}

impl ConnectionState {
    /// Returns true if currently connected.
    pub fn is_connected(&self) -> bool {
        matches!(self, ConnectionState::Connected)
    }

    /// Returns true in the terminal failure state.
    pub fn is_failed(&self) -> bool {
        matches!(self, ConnectionState::Failed)
    }
}

impl fmt::Display for ConnectionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConnectionState::Disconnected => write!(f, "disconnected"),
            ConnectionState::Connecting => write!(f, "connecting"),
            ConnectionState::Connected => write!(f, "connected"),
            ConnectionState::Backoff { attempt, delay_ms } => {
                write!(f, "backoff (attempt {}, retry in {}ms)", attempt, delay_ms)
            }
            ConnectionState::Failed => write!(f, "failed"),
        }
    }
}

// =============================================================================
// Reconnect Policy
// =============================================================================

/// Backoff configuration for reconnection.
///
/// ## Example Config Section
/// ```toml
/// [reconnect]
/// base_delay_ms = 1000
/// max_delay_ms = 30000
/// max_attempts = 5   # 0 = retry forever
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReconnectPolicy {
    /// Delay before the first retry (milliseconds).
    #[serde(default = "default_base_delay")]
    pub base_delay_ms: u64,

    /// Upper bound on any single delay (milliseconds).
    #[serde(default = "default_max_delay")]
    pub max_delay_ms: u64,

    /// Consecutive failures before giving up. Set to 0 for infinite retries.
    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,
}

fn default_base_delay() -> u64 {
    1000
}

fn default_max_delay() -> u64 {
    30_000
}

fn default_max_attempts() -> u32 {
    5
}

impl Default for ReconnectPolicy {
    fn default() -> Self {
        ReconnectPolicy {
            base_delay_ms: default_base_delay(),
            max_delay_ms: default_max_delay(),
            max_attempts: default_max_attempts(),
        }
    }
}

impl ReconnectPolicy {
    /// Builds the delay generator for this policy.
    ///
    /// Jitter is disabled and there is no elapsed-time limit; giving up is
    /// decided by `max_attempts` alone.
    pub fn backoff(&self) -> ExponentialBackoff {
        ExponentialBackoff {
            current_interval: Duration::from_millis(self.base_delay_ms),
            initial_interval: Duration::from_millis(self.base_delay_ms),
            max_interval: Duration::from_millis(self.max_delay_ms),
            multiplier: 2.0,
            randomization_factor: 0.0,
            max_elapsed_time: None,
            ..Default::default()
        }
    }

    /// Returns true once `failures` consecutive failures exhaust the budget.
    pub fn is_exhausted(&self, failures: u32) -> bool {
        self.max_attempts != 0 && failures >= self.max_attempts
    }
}

// =============================================================================
// Transitions
// =============================================================================

/// Result of feeding one input to the machine.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Transition {
    pub from: ConnectionState,
    pub to: ConnectionState,
}

impl Transition {
    /// Returns true if the input moved the machine.
    pub fn changed(&self) -> bool {
        self.from != self.to
    }

    /// Returns true if this transition just established the connection.
    pub fn entered_connected(&self) -> bool {
        self.changed() && self.to.is_connected()
    }

    /// Returns true if this transition just gave up reconnecting.
    pub fn entered_failed(&self) -> bool {
        self.changed() && self.to.is_failed()
    }
}

/// The reconnect transition table.
#[derive(Debug)]
pub struct ConnectionMachine {
    policy: ReconnectPolicy,
    state: ConnectionState,
    /// Consecutive failures since the last successful open.
    failures: u32,
    backoff: ExponentialBackoff,
}

impl ConnectionMachine {
    /// Creates a machine in `Disconnected`.
    pub fn new(policy: ReconnectPolicy) -> Self {
        ConnectionMachine {
            backoff: policy.backoff(),
            policy,
            state: ConnectionState::Disconnected,
            failures: 0,
        }
    }

    pub fn state(&self) -> ConnectionState {
        self.state
    }

    pub fn failures(&self) -> u32 {
        self.failures
    }

    pub fn policy(&self) -> &ReconnectPolicy {
        &self.policy
    }

    /// `Disconnected → Connecting`.
    pub fn start(&mut self) -> Transition {
        match self.state {
            ConnectionState::Disconnected => self.move_to(ConnectionState::Connecting),
            _ => self.stay(),
        }
    }

    /// `Connecting → Connected`; clears the failure count.
    pub fn on_open(&mut self) -> Transition {
        match self.state {
            ConnectionState::Connecting => {
                self.reset_backoff();
                self.move_to(ConnectionState::Connected)
            }
            _ => self.stay(),
        }
    }

    /// `Connecting | Connected → Backoff(n + 1, delay(n))`, or `Failed` once
    /// the failure budget is spent.
    pub fn on_connection_lost(&mut self) -> Transition {
        match self.state {
            ConnectionState::Connecting | ConnectionState::Connected => {
                self.failures = self.failures.saturating_add(1);

                if self.policy.is_exhausted(self.failures) {
                    self.move_to(ConnectionState::Failed)
                } else {
                    let delay_ms = self.next_delay_ms();
                    self.move_to(ConnectionState::Backoff {
                        attempt: self.failures,
                        delay_ms,
                    })
                }
            }
            _ => self.stay(),
        }
    }

    /// `Backoff → Connecting` when the retry timer fires.
    pub fn on_retry_due(&mut self) -> Transition {
        match self.state {
            ConnectionState::Backoff { .. } => self.move_to(ConnectionState::Connecting),
            _ => self.stay(),
        }
    }

    /// Manual resync.
    ///
    /// - `Failed → Connecting` with a fresh failure budget
    /// - `Backoff → Connecting` immediately, failure count kept
    /// - `Disconnected → Connecting` (same as `start`)
    /// - other states are left alone; the caller re-requests the snapshot
    pub fn resync(&mut self) -> Transition {
        match self.state {
            ConnectionState::Failed => {
                self.reset_backoff();
                self.move_to(ConnectionState::Connecting)
            }
            ConnectionState::Backoff { .. } | ConnectionState::Disconnected => {
                self.move_to(ConnectionState::Connecting)
            }
            ConnectionState::Connecting | ConnectionState::Connected => self.stay(),
        }
    }

    /// Any state `→ Disconnected`. Idempotent.
    pub fn shutdown(&mut self) -> Transition {
        self.reset_backoff();
        self.move_to(ConnectionState::Disconnected)
    }

    fn reset_backoff(&mut self) {
        self.failures = 0;
        self.backoff.reset();
    }

    /// Next retry delay in whole milliseconds.
    fn next_delay_ms(&mut self) -> u64 {
        // Without an elapsed-time limit the generator never runs dry.
        let delay = self
            .backoff
            .next_backoff()
            .unwrap_or(self.backoff.max_interval);
        u64::try_from(delay.as_millis())
            .unwrap_or(u64::MAX)
            .min(self.policy.max_delay_ms)
    }

    fn move_to(&mut self, to: ConnectionState) -> Transition {
        let from = self.state;
        self.state = to;
        Transition { from, to }
    }

    fn stay(&self) -> Transition {
        Transition {
            from: self.state,
            to: self.state,
        }
    }
}
