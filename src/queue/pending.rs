//! Pending notification record

use std::time::{SystemTime, UNIX_EPOCH};

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::protocol::Filter;

/// A durably stored notification awaiting a matching registration
///
/// Created when a broadcast finds no live match or a delivery attempt fails;
/// removed permanently only after a confirmed successful delivery. Owned
/// exclusively by the queue; the dispatcher hands records back via
/// `requeue` rather than retaining copies.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PendingNotification {
    /// Unique id, monotonic within and across process restarts
    pub id: u64,

    /// The filter the notification was queued under
    pub filter: Filter,

    /// Opaque broadcast payload
    pub message: Value,

    /// Creation time, unix milliseconds
    pub created_at: u64,

    /// Number of delivery attempts made so far
    pub attempts: u32,
}

impl PendingNotification {
    /// Create a fresh record with zero attempts
    pub fn new(id: u64, filter: Filter, message: Value) -> Self {
        Self {
            id,
            filter,
            message,
            created_at: unix_millis(),
            attempts: 0,
        }
    }
}

/// Current wall-clock time as unix milliseconds
pub(crate) fn unix_millis() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis() as u64)
        .unwrap_or(0)
}
