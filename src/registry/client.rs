//! Client handles and per-connection liveness state
//!
//! A [`ClientHandle`] is the registry's view of one live connection: a way
//! to deliver outbound messages with confirmation, a liveness flag shared
//! with the connection's read loop, and a close signal for forced eviction.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use tokio::sync::{mpsc, oneshot, Notify};

use crate::protocol::OutboundMessage;

/// Identifier for one accepted connection
pub type SessionId = u64;

/// Liveness state of a connection, driven by the heartbeat monitor
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Liveness {
    /// Responded (or sent any traffic) since the last probe
    Alive,
    /// Probed, no response yet; found like this at the next tick it is evicted
    Pending,
}

/// Shared liveness flag
///
/// Transitions: the heartbeat monitor flips `Alive -> Pending` when it sends
/// a probe; any inbound traffic on the connection flips it back to `Alive`.
/// Nothing else touches it.
#[derive(Debug)]
pub struct LivenessFlag(AtomicBool);

impl LivenessFlag {
    /// New connections start out alive
    pub fn new() -> Self {
        Self(AtomicBool::new(true))
    }

    /// Record inbound traffic
    pub fn mark_alive(&self) {
        self.0.store(true, Ordering::Relaxed);
    }

    /// Record an outstanding probe
    pub fn mark_pending(&self) {
        self.0.store(false, Ordering::Relaxed);
    }

    /// Current state
    pub fn get(&self) -> Liveness {
        if self.0.load(Ordering::Relaxed) {
            Liveness::Alive
        } else {
            Liveness::Pending
        }
    }
}

impl Default for LivenessFlag {
    fn default() -> Self {
        Self::new()
    }
}

/// Why a delivery attempt failed
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DeliveryError {
    /// The connection's writer task is gone (connection closed)
    Closed,
    /// The transport reported a write failure
    Transport(String),
}

impl std::fmt::Display for DeliveryError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            DeliveryError::Closed => write!(f, "connection closed"),
            DeliveryError::Transport(e) => write!(f, "transport error: {}", e),
        }
    }
}

impl std::error::Error for DeliveryError {}

/// One outbound message queued to a connection's writer task
///
/// The writer reports the actual write outcome on `ack`, which is what turns
/// fire-and-forget channel sends into confirmed deliveries.
pub struct Outgoing {
    /// The message to put on the wire
    pub message: OutboundMessage,
    /// Where the writer reports the write outcome
    pub ack: oneshot::Sender<Result<(), DeliveryError>>,
}

/// Handle to one live connection
///
/// Cheap to clone; all clones refer to the same connection. Held by the
/// registry and by the connection task itself.
#[derive(Clone)]
pub struct ClientHandle {
    id: SessionId,
    tx: mpsc::UnboundedSender<Outgoing>,
    liveness: Arc<LivenessFlag>,
    close: Arc<Notify>,
}

impl ClientHandle {
    /// Create a handle plus the receiving end for its writer task
    pub fn new(id: SessionId) -> (Self, mpsc::UnboundedReceiver<Outgoing>) {
        let (tx, rx) = mpsc::unbounded_channel();
        let handle = Self {
            id,
            tx,
            liveness: Arc::new(LivenessFlag::new()),
            close: Arc::new(Notify::new()),
        };
        (handle, rx)
    }

    /// Session id of the underlying connection
    pub fn id(&self) -> SessionId {
        self.id
    }

    /// Deliver one message and wait for the transport's confirmation
    ///
    /// Both failure shapes land here: a connection that is already gone
    /// fails the channel send, a transport that dies mid-write fails the
    /// ack. Callers decide between requeue and drop based on this result.
    pub async fn deliver(&self, message: OutboundMessage) -> Result<(), DeliveryError> {
        let (ack, confirmed) = oneshot::channel();

        self.tx
            .send(Outgoing { message, ack })
            .map_err(|_| DeliveryError::Closed)?;

        match confirmed.await {
            Ok(result) => result,
            // Writer dropped the ack without reporting: treat as closed.
            Err(_) => Err(DeliveryError::Closed),
        }
    }

    /// Record inbound traffic for the liveness monitor
    pub fn mark_alive(&self) {
        self.liveness.mark_alive();
    }

    /// Record an outstanding liveness probe
    pub fn mark_pending(&self) {
        self.liveness.mark_pending();
    }

    /// Current liveness state
    pub fn liveness(&self) -> Liveness {
        self.liveness.get()
    }

    /// Signal the connection task to shut down
    ///
    /// `notify_one` stores a permit, so the signal is not lost if the
    /// connection task is mid-dispatch rather than parked on the notifier.
    pub fn close(&self) {
        self.close.notify_one();
    }

    /// The notifier the connection task waits on for forced closes
    pub fn close_signal(&self) -> Arc<Notify> {
        Arc::clone(&self.close)
    }
}

impl std::fmt::Debug for ClientHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ClientHandle")
            .field("id", &self.id)
            .field("liveness", &self.liveness.get())
            .finish()
    }
}
