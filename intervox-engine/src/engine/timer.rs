//! Per-question answer deadline timers
//!
//! One cancellable timer per open question, keyed `"interview_id:index"`.
//! The manager guarantees at-most-once delivery of the timeout callback per
//! `start`: if `cancel` wins the race the handler never runs, and if the
//! timer wins the handler runs exactly once before the key is removed.

use futures::future::BoxFuture;
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::sync::oneshot;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

/// How long `cancel` waits for a firing timer to finish before giving up
const CANCEL_WAIT: Duration = Duration::from_millis(100);

/// Timeout callback: `(interview_id, question_index, user_id)`
pub type TimeoutHandler =
    Box<dyn FnOnce(String, i32, u64) -> BoxFuture<'static, ()> + Send + 'static>;

struct TimerEntry {
    timer_id: u64,
    user_id: u64,
    started_at: Instant,
    cancel: CancellationToken,
    done: oneshot::Receiver<()>,
}

/// Keyed, cancellable deadline timers with a shared timeout value
pub struct TimerManager {
    timers: Arc<Mutex<HashMap<String, TimerEntry>>>,
    timeout: Duration,
    next_id: AtomicU64,
}

/// Key for a question's timer.
pub fn timer_key(interview_id: &str, question_index: i32) -> String {
    format!("{}:{}", interview_id, question_index)
}

impl TimerManager {
    pub fn new(timeout: Duration) -> Self {
        TimerManager {
            timers: Arc::new(Mutex::new(HashMap::new())),
            timeout,
            next_id: AtomicU64::new(1),
        }
    }

    /// Arm a timer for a question, replacing any existing one for the key.
    ///
    /// `on_timeout` runs on its own task after the shared timeout unless the
    /// timer is cancelled first.
    pub async fn start(
        &self,
        interview_id: &str,
        question_index: i32,
        user_id: u64,
        on_timeout: TimeoutHandler,
    ) {
        let key = timer_key(interview_id, question_index);
        self.cancel(&key).await;

        let timer_id = self.next_id.fetch_add(1, Ordering::Relaxed);
        let cancel = CancellationToken::new();
        let (done_tx, done_rx) = oneshot::channel();

        self.timers.lock().unwrap().insert(
            key.clone(),
            TimerEntry {
                timer_id,
                user_id,
                started_at: Instant::now(),
                cancel: cancel.clone(),
                done: done_rx,
            },
        );

        let timers = Arc::clone(&self.timers);
        let timeout = self.timeout;
        let interview_id = interview_id.to_string();
        tokio::spawn(async move {
            tokio::select! {
                _ = cancel.cancelled() => {
                    debug!(interview_id = %interview_id, question_index, "Timer cancelled");
                }
                _ = tokio::time::sleep(timeout) => {
                    // Claim the key under the lock so a racing cancel either
                    // beats us (entry gone, handler skipped) or loses cleanly.
                    let claimed = {
                        let mut map = timers.lock().unwrap();
                        match map.get(&key) {
                            Some(entry) if entry.timer_id == timer_id => {
                                map.remove(&key);
                                true
                            }
                            _ => false,
                        }
                    };
                    if claimed {
                        info!(
                            interview_id = %interview_id,
                            question_index,
                            user_id,
                            "Question timeout reached"
                        );
                        on_timeout(interview_id, question_index, user_id).await;
                    }
                }
            }
            let _ = done_tx.send(());
        });
    }

    /// Cancel a timer if it exists.
    ///
    /// Waits briefly for the timer task to finish so callers do not race a
    /// handler that is already firing. Returns whether a timer was found.
    pub async fn cancel(&self, key: &str) -> bool {
        let entry = self.timers.lock().unwrap().remove(key);
        match entry {
            Some(entry) => {
                entry.cancel.cancel();
                match tokio::time::timeout(CANCEL_WAIT, entry.done).await {
                    Ok(_) => debug!(key, "Timer cancelled cleanly"),
                    Err(_) => warn!(key, "Timer cancellation wait elapsed"),
                }
                true
            }
            None => false,
        }
    }

    /// Remaining time for a question's timer; zero when absent or elapsed.
    pub fn remaining(&self, interview_id: &str, question_index: i32) -> Duration {
        let key = timer_key(interview_id, question_index);
        let timers = self.timers.lock().unwrap();
        match timers.get(&key) {
            Some(entry) => self.timeout.saturating_sub(entry.started_at.elapsed()),
            None => Duration::ZERO,
        }
    }

    /// Cancel every timer belonging to one interview.
    pub async fn cleanup_interview(&self, interview_id: &str) {
        let prefix = format!("{}:", interview_id);
        let keys: Vec<String> = {
            let timers = self.timers.lock().unwrap();
            timers
                .keys()
                .filter(|k| k.starts_with(&prefix))
                .cloned()
                .collect()
        };
        for key in keys {
            self.cancel(&key).await;
        }
    }

    /// Cancel all timers.
    pub async fn shutdown(&self) {
        info!("Shutting down question timer manager");
        let keys: Vec<String> = self.timers.lock().unwrap().keys().cloned().collect();
        for key in keys {
            self.cancel(&key).await;
        }
    }

    /// Number of armed timers; test hook.
    pub fn active_count(&self) -> usize {
        self.timers.lock().unwrap().len()
    }

    /// User a timer was armed for; test hook.
    pub fn timer_user(&self, interview_id: &str, question_index: i32) -> Option<u64> {
        let key = timer_key(interview_id, question_index);
        self.timers.lock().unwrap().get(&key).map(|e| e.user_id)
    }
}
