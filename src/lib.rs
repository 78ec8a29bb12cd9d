//! Real-time notification relay server
//!
//! Clients open a persistent connection, register an identity (domain,
//! platform, user, role), and receive notifications pushed by `broadcast`
//! messages whose filter matches their identity. Notifications that cannot
//! be delivered live (no matching client online, or a send that fails)
//! are parked in a durable queue and replayed to the next matching
//! registration, giving at-least-once delivery.
//!
//! # Architecture
//!
//! ```text
//!  TCP accept loop ──► Connection task (one per socket)
//!                         │  read loop: line ──► Dispatcher
//!                         │  writer task: confirmed deliveries
//!                         ▼
//!        ┌──────────────────────────────────┐
//!        │ Dispatcher                       │
//!        │   register ──► Registry + replay │
//!        │   broadcast ─► fan-out / enqueue │
//!        └───────┬──────────────┬───────────┘
//!                ▼              ▼
//!        ConnectionRegistry   DurableQueue ──► QueueStore (JSON file)
//!                ▲
//!        Heartbeat task (probe / evict)
//! ```
//!
//! # Example
//!
//! ```no_run
//! use relay_rs::{RelayServer, ServerConfig};
//!
//! #[tokio::main]
//! async fn main() -> relay_rs::Result<()> {
//!     let config = ServerConfig::default().bind("127.0.0.1:3001".parse().unwrap());
//!     RelayServer::new(config).run().await
//! }
//! ```

pub mod error;
pub mod protocol;
pub mod queue;
pub mod registry;
pub mod server;

pub use error::{Error, Result};
pub use protocol::{Filter, Identity, InboundMessage, OutboundMessage};
pub use queue::{DurableQueue, FileStore, MemoryStore, PendingNotification, QueueStore};
pub use registry::{ClientHandle, ConnectionRegistry};
pub use server::{RelayServer, ServerConfig};
