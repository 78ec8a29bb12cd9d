//! Connection registry implementation
//!
//! The only source of truth for who is online right now: a map from session
//! id to the connection's handle and registered identity.

use std::collections::HashMap;

use tokio::sync::RwLock;

use crate::protocol::Identity;

use super::client::{ClientHandle, SessionId};

/// One registered connection
#[derive(Debug, Clone)]
pub struct RegisteredClient {
    /// Handle for delivery, liveness and forced close
    pub handle: ClientHandle,
    /// The identity the connection registered under
    pub identity: Identity,
}

/// In-memory registry of live, registered connections
///
/// Keyed by session id, not by user attributes: one user on two devices is
/// two independent entries. Entries are removed synchronously when a
/// connection closes, errors, or is evicted by the liveness monitor, never
/// left dangling.
pub struct ConnectionRegistry {
    clients: RwLock<HashMap<SessionId, RegisteredClient>>,
}

impl ConnectionRegistry {
    /// Create an empty registry
    pub fn new() -> Self {
        Self {
            clients: RwLock::new(HashMap::new()),
        }
    }

    /// Register a connection under an identity
    ///
    /// Registering an already-registered connection overwrites its previous
    /// identity. An empty `user_id` is accepted as an anonymous client; it
    /// stays unreachable through any filter that specifies a user.
    pub async fn register(&self, handle: ClientHandle, identity: Identity) {
        let id = handle.id();

        if identity.is_anonymous() {
            tracing::warn!(session_id = id, "registering anonymous client (empty user_id)");
        }

        let mut clients = self.clients.write().await;
        let previous = clients.insert(id, RegisteredClient { handle, identity });

        match previous {
            Some(prev) => tracing::info!(
                session_id = id,
                previous = %prev.identity,
                "client re-registered"
            ),
            None => tracing::info!(session_id = id, total = clients.len(), "client registered"),
        }
    }

    /// Remove a connection's registration
    ///
    /// Idempotent: unregistering an unknown session id is a no-op.
    pub async fn unregister(&self, id: SessionId) {
        let mut clients = self.clients.write().await;

        if let Some(removed) = clients.remove(&id) {
            tracing::info!(
                session_id = id,
                identity = %removed.identity,
                total = clients.len(),
                "client unregistered"
            );
        }
    }

    /// Snapshot of the current registry state
    ///
    /// The returned pairs are clones; iterating them is isolated from any
    /// concurrent register/unregister.
    pub async fn snapshot(&self) -> Vec<(ClientHandle, Identity)> {
        let clients = self.clients.read().await;
        clients
            .values()
            .map(|c| (c.handle.clone(), c.identity.clone()))
            .collect()
    }

    /// Number of registered connections
    pub async fn len(&self) -> usize {
        self.clients.read().await.len()
    }

    /// Whether no connection is registered
    pub async fn is_empty(&self) -> bool {
        self.clients.read().await.is_empty()
    }
}

impl Default for ConnectionRegistry {
    fn default() -> Self {
        Self::new()
    }
}
