//! Connection registry
//!
//! Thread-safe map from user id to at most one live delivery channel.
//! All locking is internal; callers never coordinate. Registering over
//! an existing entry is last-writer-wins and does not close the
//! superseded channel - that channel's own close callback removes it
//! later (see DESIGN.md for the accepted hazard).

use std::collections::HashMap;
use std::sync::RwLock;
use tokio::sync::mpsc;
use tracing::debug;
use uuid::Uuid;

/// Sendable handle to one live connection's writer task.
///
/// The handle is open as long as the writer task still holds the
/// receiving end of the channel.
#[derive(Debug, Clone)]
pub struct ConnectionHandle {
    connection_id: Uuid,
    sender: mpsc::UnboundedSender<String>,
}

impl ConnectionHandle {
    pub fn new(sender: mpsc::UnboundedSender<String>) -> Self {
        Self {
            connection_id: Uuid::new_v4(),
            sender,
        }
    }

    pub fn connection_id(&self) -> Uuid {
        self.connection_id
    }

    /// True while the connection's writer task is still running
    pub fn is_open(&self) -> bool {
        !self.sender.is_closed()
    }

    /// Queue a text payload for the connection's writer task
    pub fn send(&self, payload: String) -> Result<(), mpsc::error::SendError<String>> {
        self.sender.send(payload)
    }
}

/// Single-slot-per-user directory of live real-time channels
#[derive(Debug, Default)]
pub struct ConnectionRegistry {
    connections: RwLock<HashMap<String, ConnectionHandle>>,
}

impl ConnectionRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a connection, unconditionally replacing any existing
    /// entry for the user.
    pub fn register(&self, user_id: &str, handle: ConnectionHandle) {
        let mut connections = self.connections.write().expect("registry lock poisoned");
        if let Some(previous) = connections.insert(user_id.to_string(), handle) {
            debug!(
                user_id,
                superseded = %previous.connection_id(),
                "replaced existing connection registration"
            );
        }
    }

    /// Look up the user's channel, filtering entries whose writer task
    /// has already gone away. Closed entries are not swept here; the
    /// connection's own close callback removes them.
    pub fn lookup(&self, user_id: &str) -> Option<ConnectionHandle> {
        let connections = self.connections.read().expect("registry lock poisoned");
        connections
            .get(user_id)
            .filter(|handle| handle.is_open())
            .cloned()
    }

    /// Remove the user's entry unconditionally (used on close/error)
    pub fn unregister(&self, user_id: &str) {
        let mut connections = self.connections.write().expect("registry lock poisoned");
        connections.remove(user_id);
    }

    /// Number of registered entries (open or not)
    pub fn len(&self) -> usize {
        self.connections.read().expect("registry lock poisoned").len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
