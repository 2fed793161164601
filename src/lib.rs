//! Long-Poll Room Chat Server Library
//!
//! A small HTTP chat server: clients load a room page, post short messages
//! and long-poll for new ones. Rooms are created on first use.
//!
//! # Features
//! - Named rooms with a bounded history (32 messages) and sequence ids
//! - Long-poll reads that wait up to 15 seconds for new messages
//! - Broadcast room `all`: its posts reach every room, and every other
//!   room's posts are mirrored into it
//! - Fixed worker pool fed by a shared task queue
//!
//! # Architecture
//! - The accept loop only enqueues connections into a `TaskQueue`
//! - `WorkerPool` runs a fixed number of workers, each serving one
//!   connection at a time through `handle_connection`
//! - `ChatServer` resolves rooms through the `RoomRegistry` (one lock for the
//!   map) and each `RoomState` has its own lock paired with a notifier
//!
//! # Example
//! ```ignore
//! use std::sync::Arc;
//! use tokio::net::TcpListener;
//! use chat_server::{serve, ChatServer, Config};
//!
//! #[tokio::main]
//! async fn main() {
//!     let config = Config::default();
//!     let listener = TcpListener::bind(config.socket_addr_string()).await.unwrap();
//!     let server = Arc::new(ChatServer::new(config.room_settings()));
//!
//!     serve(listener, server, &config, std::future::pending()).await.unwrap();
//! }
//! ```

pub mod config;
pub mod connection;
pub mod error;
pub mod handler;
pub mod message;
pub mod pool;
pub mod queue;
pub mod registry;
pub mod room;
pub mod server;
pub mod types;

// Re-export main types for convenience
pub use config::Config;
pub use connection::Connection;
pub use error::AppError;
pub use handler::{dispatch, handle_connection};
pub use message::{Request, Response};
pub use pool::WorkerPool;
pub use queue::TaskQueue;
pub use registry::RoomRegistry;
pub use room::{RoomSettings, RoomState};
pub use server::{serve, ChatServer};
pub use types::{ConnectionId, MessageId, BROADCAST_ROOM};
