//! Durable pending-notification queue
//!
//! Notifications that could not be delivered live are parked here and handed
//! back out when a matching client registers. The queue guarantees
//! at-least-once delivery: an entry leaves permanently only through a
//! successful `take_matching`, and failed redeliveries put it back via
//! `requeue`.

pub mod durable;
pub mod pending;
pub mod store;

pub use durable::DurableQueue;
pub use pending::PendingNotification;
pub use store::{FileStore, MemoryStore, QueueStore, StoreError};
