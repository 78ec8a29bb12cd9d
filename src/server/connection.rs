//! Per-connection handling
//!
//! Each accepted socket gets one [`Connection`]: a read loop that feeds the
//! dispatcher one line at a time (per-connection in-order processing) and a
//! writer task that owns the write half and confirms each delivery back to
//! whoever queued it. Close, error and forced eviction all funnel into the
//! same exit path, which removes the registry entry before the task ends.

use std::net::SocketAddr;
use std::sync::Arc;

use tokio::io::{AsyncBufReadExt, AsyncWrite, AsyncWriteExt, BufReader};
use tokio::net::TcpStream;
use tokio::sync::mpsc;

use crate::registry::{ClientHandle, ConnectionRegistry, DeliveryError, Outgoing, SessionId};

use super::dispatcher::Dispatcher;

/// One live client connection
pub struct Connection {
    id: SessionId,
    socket: TcpStream,
    peer_addr: SocketAddr,
    handle: ClientHandle,
    outbox: mpsc::UnboundedReceiver<Outgoing>,
    dispatcher: Arc<Dispatcher>,
    registry: Arc<ConnectionRegistry>,
}

impl Connection {
    /// Wrap an accepted socket
    pub fn new(
        id: SessionId,
        socket: TcpStream,
        peer_addr: SocketAddr,
        dispatcher: Arc<Dispatcher>,
        registry: Arc<ConnectionRegistry>,
    ) -> Self {
        let (handle, outbox) = ClientHandle::new(id);

        Self {
            id,
            socket,
            peer_addr,
            handle,
            outbox,
            dispatcher,
            registry,
        }
    }

    /// The handle other components use to reach this connection
    pub fn handle(&self) -> &ClientHandle {
        &self.handle
    }

    /// Drive the connection until it closes
    ///
    /// Returns after EOF, an I/O error, or a forced close; the registry
    /// entry is gone by the time this returns.
    pub async fn run(self) {
        let Connection {
            id,
            socket,
            peer_addr,
            handle,
            outbox,
            dispatcher,
            registry,
        } = self;

        tracing::debug!(session_id = id, peer = %peer_addr, "connection open");

        let (read_half, write_half) = socket.into_split();
        let writer = tokio::spawn(writer_task(write_half, outbox));

        let close = handle.close_signal();
        let mut lines = BufReader::new(read_half).lines();

        loop {
            tokio::select! {
                _ = close.notified() => {
                    tracing::debug!(session_id = id, "connection force-closed");
                    break;
                }
                line = lines.next_line() => match line {
                    Ok(Some(line)) => {
                        // Any inbound traffic counts as a probe response.
                        handle.mark_alive();
                        dispatcher.dispatch(&handle, &line).await;
                    }
                    Ok(None) => {
                        tracing::debug!(session_id = id, "connection closed by peer");
                        break;
                    }
                    Err(e) => {
                        tracing::debug!(session_id = id, error = %e, "connection read error");
                        break;
                    }
                }
            }
        }

        // Remove the registry entry before the task exits so no later
        // broadcast can select a connection that is already gone.
        registry.unregister(id).await;
        writer.abort();

        tracing::debug!(session_id = id, peer = %peer_addr, "connection closed");
    }
}

/// Writer task: owns the write half, reports each write outcome on the ack
///
/// A write failure acks the failed message with the error and stops; every
/// delivery queued after that fails with `Closed` when the channel drops.
async fn writer_task<W>(mut writer: W, mut outbox: mpsc::UnboundedReceiver<Outgoing>)
where
    W: AsyncWrite + Unpin,
{
    while let Some(Outgoing { message, ack }) = outbox.recv().await {
        let mut line = match serde_json::to_string(&message) {
            Ok(line) => line,
            Err(e) => {
                let _ = ack.send(Err(DeliveryError::Transport(e.to_string())));
                continue;
            }
        };
        line.push('\n');

        match writer.write_all(line.as_bytes()).await {
            Ok(()) => {
                let _ = ack.send(Ok(()));
            }
            Err(e) => {
                let _ = ack.send(Err(DeliveryError::Transport(e.to_string())));
                break;
            }
        }
    }
}
