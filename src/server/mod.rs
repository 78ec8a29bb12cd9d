//! Relay server: listener, per-connection handling, dispatch, liveness
//!
//! One logical event loop per process: the accept loop spawns a task per
//! connection, each connection processes its own messages in order, and the
//! heartbeat task ticks independently. The registry and queue are the only
//! shared state, each serialized behind its own lock.

pub mod config;
pub mod connection;
pub mod dispatcher;
pub mod heartbeat;
pub mod listener;

pub use config::{ServerConfig, DEFAULT_HEARTBEAT_INTERVAL};
pub use connection::Connection;
pub use dispatcher::Dispatcher;
pub use heartbeat::spawn_heartbeat_task;
pub use listener::RelayServer;
