//! Wire protocol: identities, filters, and the JSON message envelope
//!
//! The transport is newline-delimited JSON over a duplex stream; one object
//! per line in both directions, discriminated by a `type` field. This module
//! defines those objects plus the identity/filter model that drives
//! recipient selection.

pub mod identity;
pub mod message;

pub use identity::{Filter, Identity};
pub use message::{decode, BroadcastRequest, DecodeError, InboundMessage, OutboundMessage};
