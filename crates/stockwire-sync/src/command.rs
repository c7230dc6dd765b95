//! # Command Channel
//!
//! Outbound requests travelling on the feed connection. Commands are handed
//! to the connection task through a bounded channel and are only accepted
//! while the client is `Connected`. Nothing is queued for later delivery:
//! a command issued in any other state is dropped and recorded as
//! `CommandRejected`.

use std::sync::Arc;
use tokio::sync::mpsc;
use tracing::{debug, warn};

use crate::error::{SyncError, SyncResult};
use crate::machine::ConnectionState;
use crate::protocol::Command;
use crate::store::ReplicaStore;

/// Capacity of the command queue between callers and the connection task.
pub const COMMAND_BUFFER: usize = 100;

/// Sending half of the command path. Cheap to clone.
#[derive(Clone)]
pub struct CommandChannel {
    tx: mpsc::Sender<Command>,
    store: Arc<ReplicaStore>,
}

impl CommandChannel {
    /// Creates the channel and the receiver the connection task drains.
    pub fn new(store: Arc<ReplicaStore>) -> (Self, mpsc::Receiver<Command>) {
        let (tx, rx) = mpsc::channel(COMMAND_BUFFER);
        (CommandChannel { tx, store }, rx)
    }

    /// Hands `command` to the connection task. Never waits.
    ///
    /// Fails with `CommandRejected` unless the client is `Connected`, and with
    /// `ChannelError` if the connection task is gone or saturated. Either
    /// failure is also recorded as the client's last error.
    pub fn send(&self, command: Command) -> SyncResult<()> {
        let state = self.store.connection_state();
        if !state.is_connected() {
            return Err(self.reject(command, state));
        }

        match self.tx.try_send(command) {
            Ok(()) => {
                debug!(command = command.type_name(), "Command queued");
                Ok(())
            }
            Err(mpsc::error::TrySendError::Full(_)) => {
                Err(self.fail(SyncError::ChannelError("Command queue full".into())))
            }
            Err(mpsc::error::TrySendError::Closed(_)) => Err(self.fail(SyncError::ChannelError(
                "Connection task stopped".into(),
            ))),
        }
    }

    /// Records a command the connection task could not deliver.
    pub(crate) fn reject(&self, command: Command, state: ConnectionState) -> SyncError {
        warn!(
            command = command.type_name(),
            state = %state,
            "Command dropped: not connected"
        );
        self.fail(SyncError::CommandRejected {
            command: command.type_name(),
            state,
        })
    }

    fn fail(&self, error: SyncError) -> SyncError {
        self.store.record_error(error.clone());
        error
    }
}
