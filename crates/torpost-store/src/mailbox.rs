//! Per-peer message mailboxes.
//!
//! A [`Mailbox`] maps peer ids to FIFO queues of undelivered messages. It
//! models a mailbox, not a cache: there is no eviction, entries live for the
//! lifetime of the process, and a peer record persists even after its queue
//! drains so repeated polling stays well-defined.
//!
//! Every operation takes the single store mutex, which makes the id set and
//! each queue's head/tail linearizable across connection tasks.

use std::collections::{HashMap, VecDeque};
use std::sync::{Arc, Mutex};

use chrono::Utc;
use tracing::debug;

use torpost_shared::constants::DATE_FORMAT;
use torpost_shared::WireCommand;

use crate::error::{Result, StoreError};

/// One undelivered message, owned by its peer's queue until polled.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoredMessage {
    /// Message payload.
    pub content: String,
    /// The wire tag the message arrived with (`RECV`, `FILEPORT`, ...).
    pub tag: WireCommand,
    /// String-formatted creation timestamp.
    pub date: String,
}

/// Shared handle to the id → queue map. Clones are cheap and refer to the
/// same underlying store.
#[derive(Debug, Clone, Default)]
pub struct Mailbox {
    inner: Arc<Mutex<HashMap<String, VecDeque<StoredMessage>>>>,
}

impl Mailbox {
    /// Create an empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Whether a peer record exists for `id`.
    pub fn peer_exists(&self, id: &str) -> bool {
        self.lock().contains_key(id)
    }

    /// Create an empty-queue peer record. Returns `false` without touching
    /// the existing queue when the id is already present.
    pub fn insert_peer(&self, id: &str) -> bool {
        if id.is_empty() {
            return false;
        }
        let mut map = self.lock();
        if map.contains_key(id) {
            return false;
        }
        map.insert(id.to_string(), VecDeque::new());
        debug!(peer = %id, "New peer record");
        true
    }

    /// Append a message to the tail of `id`'s queue, creating the peer record
    /// first if absent. The date is stamped now when the caller has none.
    pub fn enqueue(
        &self,
        id: &str,
        content: impl Into<String>,
        tag: WireCommand,
        date: Option<String>,
    ) -> Result<()> {
        if id.is_empty() {
            return Err(StoreError::EmptyPeerId);
        }
        let message = StoredMessage {
            content: content.into(),
            tag,
            date: date.unwrap_or_else(|| Utc::now().format(DATE_FORMAT).to_string()),
        };
        let mut map = self.lock();
        map.entry(id.to_string()).or_default().push_back(message);
        Ok(())
    }

    /// Remove and return the oldest message for `id`, or `None` when the peer
    /// is unknown or its queue is empty. This is the sole consumption path;
    /// there is no peek.
    pub fn dequeue_oldest(&self, id: &str) -> Option<StoredMessage> {
        self.lock().get_mut(id).and_then(VecDeque::pop_front)
    }

    /// Comma-joined list of all known peer ids; empty string when there are
    /// none. Order is map order, stable within one enumeration.
    pub fn list_peer_ids(&self) -> String {
        self.lock()
            .keys()
            .cloned()
            .collect::<Vec<_>>()
            .join(",")
    }

    /// Number of pending messages for `id` (0 when unknown).
    pub fn pending_count(&self, id: &str) -> usize {
        self.lock().get(id).map_or(0, VecDeque::len)
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, HashMap<String, VecDeque<StoredMessage>>> {
        // A poisoned store mutex means a panic mid-operation; the queues hold
        // plain owned data, so continuing with the inner value is sound.
        self.inner.lock().unwrap_or_else(|e| e.into_inner())
    }
}
