//! Liveness monitor
//!
//! Runs on a fixed interval, independent of connection message handling.
//! Per tick, every registered connection still `Pending` from the previous
//! cycle is force-closed and unregistered; the rest are flipped to
//! `Pending` and sent a probe. Any inbound traffic on a connection flips it
//! back to `Alive` (see the connection read loop), so a client that answers
//! probes (or talks for any other reason) is never evicted.

use std::sync::Arc;
use std::time::Duration;

use crate::protocol::OutboundMessage;
use crate::registry::{ConnectionRegistry, Liveness};

/// Run one probe/evict cycle over the registry
pub(crate) async fn run_tick(registry: &ConnectionRegistry) {
    for (handle, identity) in registry.snapshot().await {
        match handle.liveness() {
            Liveness::Pending => {
                // No response since the previous probe: the transport is
                // presumed dead.
                tracing::warn!(
                    session_id = handle.id(),
                    identity = %identity,
                    "liveness probe unanswered, evicting connection"
                );
                handle.close();
                registry.unregister(handle.id()).await;
            }
            Liveness::Alive => {
                handle.mark_pending();

                if handle.deliver(OutboundMessage::Ping).await.is_err() {
                    // The probe itself could not be sent; no point waiting
                    // a full cycle for an answer that cannot come.
                    tracing::warn!(
                        session_id = handle.id(),
                        identity = %identity,
                        "liveness probe undeliverable, evicting connection"
                    );
                    handle.close();
                    registry.unregister(handle.id()).await;
                }
            }
        }
    }
}

/// Spawn the periodic liveness task
///
/// Returns a handle that can be used to abort the task on shutdown.
pub fn spawn_heartbeat_task(
    registry: Arc<ConnectionRegistry>,
    interval: Duration,
) -> tokio::task::JoinHandle<()> {
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(interval);
        // The first tick of a tokio interval fires immediately; skip it so
        // freshly started servers do not probe an empty registry.
        ticker.tick().await;

        loop {
            ticker.tick().await;
            run_tick(&registry).await;
        }
    })
}
