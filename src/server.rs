//! ChatServer core and accept loop
//!
//! `ChatServer` holds the room registry and exposes the three operations the
//! HTTP layer needs: load a room, post a message, pull messages. `serve`
//! accepts connections and hands them to the worker pool through the task
//! queue.

use std::future::Future;
use std::sync::Arc;

use tokio::net::TcpListener;
use tracing::{debug, error, info};

use crate::config::Config;
use crate::connection::Connection;
use crate::error::AppError;
use crate::handler::handle_connection;
use crate::pool::WorkerPool;
use crate::queue::TaskQueue;
use crate::registry::RoomRegistry;
use crate::room::{RoomSettings, RoomState};
use crate::types::{MessageId, BROADCAST_ROOM};

/// Shared chat state and the operations served over HTTP
#[derive(Debug, Default)]
pub struct ChatServer {
    registry: RoomRegistry,
}

impl ChatServer {
    /// Create a server with no rooms
    pub fn new(settings: RoomSettings) -> Self {
        Self {
            registry: RoomRegistry::new(settings),
        }
    }

    /// The underlying room registry
    pub fn registry(&self) -> &RoomRegistry {
        &self.registry
    }

    /// Make sure `room` exists
    pub fn load_room(&self, room: &str) -> Arc<RoomState> {
        self.registry.get_or_create(room)
    }

    /// Post `text` to `room`
    ///
    /// A post to the broadcast room is appended to every room registered at
    /// that moment, the broadcast room included. Any other post goes to its
    /// room and is mirrored into the broadcast room. Each append is
    /// independent; there is no cross-room atomicity.
    ///
    /// Returns the number of rooms that received the message.
    pub fn post_message(&self, room: &str, text: &str) -> usize {
        if room == BROADCAST_ROOM {
            self.registry.get_or_create(BROADCAST_ROOM);
            let targets = self.registry.snapshot();
            for target in &targets {
                target.append(text);
            }
            info!("Broadcast to {} rooms", targets.len());
            return targets.len();
        }

        let target = self.registry.get_or_create(room);
        let broadcast = self.registry.get_or_create(BROADCAST_ROOM);
        let id = target.append(text);
        broadcast.append(text);
        debug!("Posted message {} to '{}'", id, room);
        2
    }

    /// Messages in `room` newer than `last`, newest first
    ///
    /// Long-polls up to the room's poll timeout when nothing newer exists.
    pub async fn pull_since(&self, room: &str, last: MessageId) -> String {
        let state = self.registry.get_or_create(room);
        state.read_since(last).await
    }
}

/// Accept connections on `listener` until `shutdown` resolves
///
/// The accept loop only enqueues; all request processing happens on the
/// fixed pool of `config.workers` workers.
pub async fn serve<F>(
    listener: TcpListener,
    server: Arc<ChatServer>,
    config: &Config,
    shutdown: F,
) -> Result<(), AppError>
where
    F: Future<Output = ()>,
{
    let queue = Arc::new(TaskQueue::new());
    let request_timeout = config.request_timeout;
    let pool = {
        let server = server.clone();
        WorkerPool::spawn(config.workers, queue.clone(), move |conn: Connection| {
            handle_connection(conn, server.clone(), request_timeout)
        })
    };

    info!("Accepting connections on {}", listener.local_addr()?);
    tokio::pin!(shutdown);

    loop {
        tokio::select! {
            _ = &mut shutdown => {
                info!("Shutdown requested, {} connections still queued", queue.len());
                break;
            }
            accepted = listener.accept() => match accepted {
                Ok((stream, addr)) => {
                    let conn = Connection::new(stream, addr);
                    debug!("Queued connection {} from {}", conn.id, addr);
                    queue.enqueue(conn);
                }
                Err(e) => {
                    error!("Failed to accept connection: {}", e);
                }
            },
        }
    }

    pool.shutdown();
    Ok(())
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use super::*;

    fn quick_server() -> ChatServer {
        ChatServer::new(RoomSettings {
            poll_timeout: Duration::from_millis(100),
            ..RoomSettings::default()
        })
    }

    #[tokio::test]
    async fn test_lobby_scenario() {
        let server = quick_server();

        let lobby = server.load_room("lobby");
        assert_eq!(lobby.messages(), vec!["Hello lobby!".to_string()]);
        assert_eq!(lobby.sequence(), 0);

        server.post_message("lobby", "hi");
        assert_eq!(lobby.sequence(), 1);
        assert_eq!(
            lobby.messages(),
            vec!["Hello lobby!".to_string(), "hi".to_string()]
        );
        assert_eq!(server.pull_since("lobby", 0).await, "1: hi\n");

        for n in 0..31 {
            server.post_message("lobby", &format!("msg {}", n));
        }
        assert_eq!(lobby.len(), 32);
        assert_eq!(lobby.sequence(), 32);

        let out = server.pull_since("lobby", 0).await;
        let ids: Vec<u64> = out
            .lines()
            .map(|line| line.split(": ").next().unwrap().parse().unwrap())
            .collect();
        assert_eq!(ids, (1..=32).rev().collect::<Vec<u64>>());
        assert!(out.starts_with("32: msg 30\n"));
        assert!(out.ends_with("1: hi\n"));
    }

    #[test]
    fn test_post_mirrors_into_broadcast_room() {
        let server = quick_server();

        assert_eq!(server.post_message("a", "hello"), 2);

        let all = server.registry().get(BROADCAST_ROOM).unwrap();
        assert_eq!(all.sequence(), 1);
        assert_eq!(all.messages().last().unwrap(), "hello");
        assert_eq!(server.registry().get("a").unwrap().sequence(), 1);
    }

    #[test]
    fn test_broadcast_fans_out() {
        let server = quick_server();
        let a = server.load_room("a");
        let b = server.load_room("b");

        let delivered = server.post_message(BROADCAST_ROOM, "M");

        assert_eq!(delivered, 3);
        assert_eq!(a.messages().last().unwrap(), "M");
        assert_eq!(b.messages().last().unwrap(), "M");
        let all = server.registry().get(BROADCAST_ROOM).unwrap();
        assert_eq!(all.messages().last().unwrap(), "M");
        assert_eq!(all.sequence(), 1);
    }

    #[test]
    fn test_broadcast_with_no_rooms_reaches_broadcast_room() {
        let server = quick_server();

        assert_eq!(server.post_message(BROADCAST_ROOM, "first"), 1);
        assert_eq!(server.registry().len(), 1);
    }

    #[tokio::test]
    async fn test_pull_creates_room_and_times_out() {
        let server = quick_server();

        assert_eq!(server.pull_since("new", 0).await, "");
        assert!(server.registry().get("new").is_some());
    }

    #[tokio::test]
    async fn test_pull_wakes_on_post() {
        let server = Arc::new(ChatServer::new(RoomSettings {
            poll_timeout: Duration::from_secs(10),
            ..RoomSettings::default()
        }));
        server.load_room("lobby");

        let pull = {
            let server = server.clone();
            tokio::spawn(async move { server.pull_since("lobby", 0).await })
        };
        tokio::time::sleep(Duration::from_millis(50)).await;
        server.post_message("lobby", "wake up");

        let out = tokio::time::timeout(Duration::from_secs(2), pull)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(out, "1: wake up\n");
    }
}
