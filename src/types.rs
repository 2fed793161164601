//! Basic type definitions for the chat server
//!
//! - `ConnectionId`: UUID-based identifier attached to each accepted connection
//! - `MessageId`: per-room sequence id
//! - `BROADCAST_ROOM`: the room whose posts reach every room

use uuid::Uuid;

/// Per-room message sequence id
pub type MessageId = u64;

/// Name of the broadcast room
///
/// Posts to this room fan out to every registered room, and posts to any
/// other room are mirrored into it.
pub const BROADCAST_ROOM: &str = "all";

/// Unique connection identifier (newtype pattern)
///
/// Wraps a UUID v4 so log lines from one request/response cycle can be
/// correlated across the accept loop and the worker that served it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ConnectionId(pub Uuid);

impl ConnectionId {
    /// Create a new random connection ID
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for ConnectionId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for ConnectionId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}
