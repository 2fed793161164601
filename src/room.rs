//! Room state definition
//!
//! A room keeps a bounded history of its most recent messages and a sequence
//! counter. Readers long-poll: they wait until the counter moves past the id
//! they last saw, or until the poll timeout elapses.

use std::collections::VecDeque;
use std::fmt::Write as _;
use std::sync::{Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use tokio::sync::Notify;
use tokio::time::{timeout_at, Instant};
use tracing::debug;

use crate::types::MessageId;

/// Default number of retained messages per room
pub const DEFAULT_HISTORY_CAPACITY: usize = 32;

/// Default long-poll timeout
pub const DEFAULT_POLL_TIMEOUT: Duration = Duration::from_secs(15);

/// Per-room tunables shared by every room of a registry
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RoomSettings {
    /// Maximum retained messages (oldest evicted first)
    pub history_capacity: usize,
    /// Longest time a read waits for new messages
    pub poll_timeout: Duration,
}

impl Default for RoomSettings {
    fn default() -> Self {
        Self {
            history_capacity: DEFAULT_HISTORY_CAPACITY,
            poll_timeout: DEFAULT_POLL_TIMEOUT,
        }
    }
}

/// History and sequence counter, always mutated together under one lock
#[derive(Debug)]
struct History {
    messages: VecDeque<String>,
    /// Id of the newest retained message
    sequence: MessageId,
}

impl History {
    /// Render every retained entry newer than `last_seen`, newest first
    fn render_since(&self, last_seen: MessageId) -> String {
        let mut out = String::new();
        let newest = self.messages.len().saturating_sub(1);
        for (pos, text) in self.messages.iter().enumerate().rev() {
            // len <= sequence + 1, so this never underflows
            let id = self.sequence - (newest - pos) as MessageId;
            if id <= last_seen {
                break;
            }
            let _ = writeln!(out, "{}: {}", id, text);
        }
        out
    }
}

/// A named chat room
///
/// Appends and reads are serialized by the room's own lock. Blocked readers
/// are woken through `changed`, which is paired with that lock.
#[derive(Debug)]
pub struct RoomState {
    name: String,
    history: Mutex<History>,
    changed: Notify,
    settings: RoomSettings,
}

impl RoomState {
    /// Create a room seeded with its welcome message (id 0)
    pub fn new(name: impl Into<String>, settings: RoomSettings) -> Self {
        let name = name.into();
        let mut messages = VecDeque::with_capacity(settings.history_capacity);
        messages.push_back(format!("Hello {}!", name));
        Self {
            name,
            history: Mutex::new(History {
                messages,
                sequence: 0,
            }),
            changed: Notify::new(),
            settings,
        }
    }

    /// Room name
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Id of the newest message
    pub fn sequence(&self) -> MessageId {
        self.lock().sequence
    }

    /// Number of retained messages
    pub fn len(&self) -> usize {
        self.lock().messages.len()
    }

    /// True only before anything was retained, which never happens after `new`
    pub fn is_empty(&self) -> bool {
        self.lock().messages.is_empty()
    }

    /// Retained messages, oldest first
    pub fn messages(&self) -> Vec<String> {
        self.lock().messages.iter().cloned().collect()
    }

    /// Append a message and wake every blocked reader
    ///
    /// Evicts the oldest entry when the history is full. Returns the id
    /// assigned to the message.
    pub fn append(&self, message: impl Into<String>) -> MessageId {
        let id = {
            let mut history = self.lock();
            if history.messages.len() >= self.settings.history_capacity {
                history.messages.pop_front();
            }
            history.messages.push_back(message.into());
            history.sequence += 1;
            history.sequence
        };
        self.changed.notify_waiters();
        debug!("Room '{}' appended message {}", self.name, id);
        id
    }

    /// Messages newer than `last_seen`, newest first, one `"<id>: <text>"` per line
    ///
    /// Waits up to the poll timeout when nothing newer exists yet. A timeout
    /// yields an empty string. Ids that were already evicted are skipped.
    pub async fn read_since(&self, last_seen: MessageId) -> String {
        let deadline = Instant::now() + self.settings.poll_timeout;
        loop {
            let notified = self.changed.notified();
            tokio::pin!(notified);
            // Register before checking so an append between the check and
            // the await still wakes us.
            notified.as_mut().enable();

            {
                let history = self.lock();
                if history.sequence > last_seen {
                    return history.render_since(last_seen);
                }
            }

            if timeout_at(deadline, notified).await.is_err() {
                debug!("Room '{}' poll timed out at id {}", self.name, last_seen);
                return self.lock().render_since(last_seen);
            }
        }
    }

    fn lock(&self) -> MutexGuard<'_, History> {
        // History is updated in place with no partial states, so a poisoned
        // lock still guards consistent data.
        self.history.lock().unwrap_or_else(PoisonError::into_inner)
    }
}
