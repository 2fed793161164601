//! Connection handle
//!
//! One accepted TCP connection, owned by exactly one worker for a single
//! request/response cycle.

use std::net::SocketAddr;

use tokio::net::TcpStream;

use crate::types::ConnectionId;

/// An accepted connection waiting in (or taken from) the task queue
#[derive(Debug)]
pub struct Connection {
    /// Identifier used in log spans
    pub id: ConnectionId,
    /// Underlying stream, closed when the connection is dropped
    pub stream: TcpStream,
    /// Remote address
    pub peer: SocketAddr,
}

impl Connection {
    /// Wrap a freshly accepted stream
    pub fn new(stream: TcpStream, peer: SocketAddr) -> Self {
        Self {
            id: ConnectionId::new(),
            stream,
            peer,
        }
    }
}
