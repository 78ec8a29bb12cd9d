//! Relay server listener
//!
//! Handles the TCP accept loop and spawns one task per connection.

use std::net::SocketAddr;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use tokio::net::{TcpListener, TcpStream};
use tokio::sync::Semaphore;

use crate::error::Result;
use crate::queue::{DurableQueue, FileStore};
use crate::registry::ConnectionRegistry;

use super::config::ServerConfig;
use super::connection::Connection;
use super::dispatcher::Dispatcher;
use super::heartbeat::spawn_heartbeat_task;

/// Notification relay server
pub struct RelayServer {
    config: ServerConfig,
    registry: Arc<ConnectionRegistry>,
    queue: Arc<DurableQueue>,
    dispatcher: Arc<Dispatcher>,
    next_session_id: AtomicU64,
    connection_semaphore: Option<Arc<Semaphore>>,
}

impl RelayServer {
    /// Create a server with a file-backed pending queue at the configured path
    pub fn new(config: ServerConfig) -> Self {
        let queue = Arc::new(DurableQueue::open(FileStore::new(&config.queue_path)));
        Self::with_queue(config, queue)
    }

    /// Create a server over an externally constructed queue
    ///
    /// This is how an alternative queue backend (database, remote API) is
    /// plugged in.
    pub fn with_queue(config: ServerConfig, queue: Arc<DurableQueue>) -> Self {
        let connection_semaphore = if config.max_connections > 0 {
            Some(Arc::new(Semaphore::new(config.max_connections)))
        } else {
            None
        };

        let registry = Arc::new(ConnectionRegistry::new());
        let dispatcher = Arc::new(Dispatcher::new(Arc::clone(&registry), Arc::clone(&queue)));

        Self {
            config,
            registry,
            queue,
            dispatcher,
            next_session_id: AtomicU64::new(1),
            connection_semaphore,
        }
    }

    /// Get a reference to the connection registry
    pub fn registry(&self) -> &Arc<ConnectionRegistry> {
        &self.registry
    }

    /// Get a reference to the pending queue
    pub fn queue(&self) -> &Arc<DurableQueue> {
        &self.queue
    }

    /// Get the bind address
    pub fn bind_addr(&self) -> SocketAddr {
        self.config.bind_addr
    }

    /// Run the server
    ///
    /// This method blocks until the server is shut down.
    pub async fn run(&self) -> Result<()> {
        let listener = TcpListener::bind(self.config.bind_addr).await?;
        tracing::info!(addr = %self.config.bind_addr, "relay server listening");

        let _heartbeat_handle =
            spawn_heartbeat_task(Arc::clone(&self.registry), self.config.heartbeat_interval);

        self.accept_loop(&listener).await
    }

    /// Run the server with graceful shutdown
    pub async fn run_until<F>(&self, shutdown: F) -> Result<()>
    where
        F: std::future::Future<Output = ()>,
    {
        let listener = TcpListener::bind(self.config.bind_addr).await?;
        tracing::info!(addr = %self.config.bind_addr, "relay server listening");

        let heartbeat_handle =
            spawn_heartbeat_task(Arc::clone(&self.registry), self.config.heartbeat_interval);

        let result = tokio::select! {
            _ = shutdown => {
                tracing::info!("shutdown signal received");
                Ok(())
            }
            result = self.accept_loop(&listener) => result,
        };

        heartbeat_handle.abort();

        result
    }

    async fn accept_loop(&self, listener: &TcpListener) -> Result<()> {
        loop {
            match listener.accept().await {
                Ok((socket, peer_addr)) => {
                    self.handle_connection(socket, peer_addr).await;
                }
                Err(e) => {
                    tracing::error!(error = %e, "failed to accept connection");
                }
            }
        }
    }

    async fn handle_connection(&self, socket: TcpStream, peer_addr: SocketAddr) {
        // Check connection limit; the permit travels with the task so the
        // slot is held for the connection's whole lifetime.
        let permit = if let Some(ref sem) = self.connection_semaphore {
            match sem.clone().try_acquire_owned() {
                Ok(permit) => Some(permit),
                Err(_) => {
                    tracing::warn!(peer = %peer_addr, "connection rejected: limit reached");
                    return;
                }
            }
        } else {
            None
        };

        let session_id = self.next_session_id.fetch_add(1, Ordering::Relaxed);

        tracing::debug!(session_id = session_id, peer = %peer_addr, "new connection");

        if self.config.tcp_nodelay {
            if let Err(e) = socket.set_nodelay(true) {
                tracing::debug!(error = %e, "failed to set TCP_NODELAY");
            }
        }

        let dispatcher = Arc::clone(&self.dispatcher);
        let registry = Arc::clone(&self.registry);

        tokio::spawn(async move {
            let _permit = permit;
            Connection::new(session_id, socket, peer_addr, dispatcher, registry)
                .run()
                .await;
        });
    }
}

#[cfg(test)]
mod tests {
    use crate::queue::MemoryStore;

    use super::*;

    #[tokio::test]
    async fn test_server_construction() {
        let config = ServerConfig::with_addr("127.0.0.1:0".parse().unwrap()).max_connections(8);
        let queue = Arc::new(DurableQueue::open(MemoryStore::new()));
        let server = RelayServer::with_queue(config, queue);

        assert_eq!(server.bind_addr().port(), 0);
        assert!(server.registry().is_empty().await);
        assert!(server.queue().is_empty().await);
    }
}
