//! Observable supervisor state for external callers.

use crate::server::{Diagnosis, ServerState, ServerStatus};

use std::sync::Arc;
use std::sync::atomic::{AtomicU16, Ordering};

use tokio::sync::{broadcast, watch};
use tracing::error;

const NOTIFICATION_CAPACITY: usize = 32;

/// Events broadcast to subscribers.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Notification {
    /// Published on every transition into or out of `Running`
    StatusChanged(ServerStatus),
    /// The server failed and the cause was diagnosed
    Failure(Diagnosis),
}

/// Single writer of `ServerState`.
///
/// Only the supervisor holds a publisher; callers get receivers.
#[derive(Clone)]
pub struct StatusPublisher {
    state_tx: watch::Sender<ServerState>,
    events_tx: broadcast::Sender<Notification>,
    active_port: Arc<AtomicU16>,
}

impl StatusPublisher {
    pub fn new() -> Self {
        let (state_tx, _) = watch::channel(ServerState::Stopped);
        let (events_tx, _) = broadcast::channel(NOTIFICATION_CAPACITY);

        Self {
            state_tx,
            events_tx,
            active_port: Arc::new(AtomicU16::new(0)),
        }
    }

    /// Apply a state transition if the edge is valid.
    ///
    /// Returns false (and changes nothing) for edges outside the
    /// transition graph.
    pub(crate) fn transition(&self, next: ServerState, port: u16) -> bool {
        let mut previous = None;

        let applied = self.state_tx.send_if_modified(|current| {
            if current.can_transition_to(next) {
                previous = Some(*current);
                *current = next;
                true
            } else {
                error!(
                    "Rejected invalid state transition {} -> {}",
                    current.as_str(),
                    next.as_str()
                );
                false
            }
        });

        if !applied {
            return false;
        }

        if next == ServerState::Starting {
            self.active_port.store(port, Ordering::SeqCst);
        }

        let was_running = previous.is_some_and(ServerState::is_running);
        if was_running != next.is_running() {
            let _ = self
                .events_tx
                .send(Notification::StatusChanged(ServerStatus {
                    running: next.is_running(),
                    port,
                }));
        }

        true
    }

    /// Publish a diagnosed failure.
    pub(crate) fn report(&self, diagnosis: Diagnosis) {
        let _ = self.events_tx.send(Notification::Failure(diagnosis));
    }

    pub fn state(&self) -> ServerState {
        *self.state_tx.borrow()
    }

    /// Port of the current (or most recent) launch.
    pub fn active_port(&self) -> u16 {
        self.active_port.load(Ordering::SeqCst)
    }

    /// Subscribe to state changes.
    pub fn subscribe_state(&self) -> watch::Receiver<ServerState> {
        self.state_tx.subscribe()
    }

    /// Subscribe to status and failure notifications.
    pub fn subscribe(&self) -> broadcast::Receiver<Notification> {
        self.events_tx.subscribe()
    }
}

impl Default for StatusPublisher {
    fn default() -> Self {
        Self::new()
    }
}
