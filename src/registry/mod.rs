//! Live-connection registry
//!
//! Tracks which connections are online and what identity each registered
//! under. The dispatcher fans broadcasts out over [`ConnectionRegistry::snapshot`],
//! and the heartbeat monitor walks the same snapshot to probe and evict dead
//! connections.
//!
//! ```text
//!                   Arc<ConnectionRegistry>
//!               ┌────────────────────────────┐
//!               │ clients: HashMap<          │
//!               │   SessionId,               │
//!               │   RegisteredClient {       │
//!               │     handle, identity,      │
//!               │   }                        │
//!               │ >                          │
//!               └─────────────┬──────────────┘
//!                             │ snapshot()
//!            ┌────────────────┼────────────────┐
//!            ▼                ▼                ▼
//!       [Dispatcher]    [Heartbeat]      [Connection]
//!       broadcast        probe/evict      unregister on close
//! ```

pub mod client;
pub mod store;

pub use client::{ClientHandle, DeliveryError, Liveness, LivenessFlag, Outgoing, SessionId};
pub use store::{ConnectionRegistry, RegisteredClient};
