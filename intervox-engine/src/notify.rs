//! Per-user notification sink
//!
//! Fire-and-forget push of user events (for example "your question timed
//! out") to whichever SSE connection the user currently holds. Each user has
//! at most one bounded channel; `push` never blocks, and events are dropped
//! when the channel is full or no consumer is registered.

use intervox_common::events::UserEvent;
use std::collections::HashMap;
use std::sync::Mutex;
use tokio::sync::mpsc;
use tracing::debug;

/// Capacity of each per-user channel
const CHANNEL_CAPACITY: usize = 10;

/// Registry of per-user notification channels
#[derive(Default)]
pub struct Notifier {
    channels: Mutex<HashMap<u64, mpsc::Sender<UserEvent>>>,
}

impl Notifier {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a consumer for a user, replacing any previous channel.
    ///
    /// Returns the receiving half for the SSE stream to drain.
    pub fn register(&self, user_id: u64) -> mpsc::Receiver<UserEvent> {
        let (tx, rx) = mpsc::channel(CHANNEL_CAPACITY);
        self.channels.lock().unwrap().insert(user_id, tx);
        debug!(user_id, "Registered notification channel");
        rx
    }

    /// Remove a user's channel, typically on SSE disconnect.
    pub fn unregister(&self, user_id: u64) {
        self.channels.lock().unwrap().remove(&user_id);
        debug!(user_id, "Unregistered notification channel");
    }

    /// Non-blocking push. Returns false when the event was dropped because
    /// the user has no consumer or the channel is full.
    pub fn push(&self, user_id: u64, event: UserEvent) -> bool {
        let sender = {
            let channels = self.channels.lock().unwrap();
            channels.get(&user_id).cloned()
        };
        match sender {
            Some(tx) => match tx.try_send(event) {
                Ok(()) => true,
                Err(_) => {
                    debug!(user_id, "Notification channel full, dropping event");
                    false
                }
            },
            None => {
                debug!(user_id, "No notification consumer registered, dropping event");
                false
            }
        }
    }
}
