//! Question preparation worker pool
//!
//! Bounded queue of preparation jobs drained by N workers. Enqueue never
//! blocks a client call for more than `max_task_wait_time`; overflow past
//! that is dropped and counted, because the next question fetch re-enqueues.
//! Idle workers exit, so the pool is elastic within `[0, N]`;
//! `ensure_workers` respawns the complement before the next enqueue.

use intervox_common::config::WorkerConfig;
use intervox_common::models::{Interview, Question};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, Weak};
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::sync::mpsc::error::TrySendError;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use async_trait::async_trait;

/// A unit of asynchronous work that ensures a rendered question is persisted
/// for `(interview_id, next_question_index)`.
#[derive(Debug, Clone)]
pub struct PreparationJob {
    pub interview_id: String,
    pub user_id: u64,
    pub next_question_index: i32,
    /// Interview snapshot taken at enqueue time
    pub interview: Interview,
    /// Initial questions to insert first (the start path); empty otherwise
    pub seed_questions: Vec<Question>,
    pub enqueued_at: Instant,
}

impl PreparationJob {
    pub fn new(
        interview: &Interview,
        user_id: u64,
        next_question_index: i32,
        seed_questions: Vec<Question>,
    ) -> Self {
        PreparationJob {
            interview_id: interview.id.clone(),
            user_id,
            next_question_index,
            interview: interview.clone(),
            seed_questions,
            enqueued_at: Instant::now(),
        }
    }
}

/// Executes preparation jobs; satisfied by the session engine.
///
/// The pool only holds a weak handle, so dropping the engine tears the
/// workers down with it.
#[async_trait]
pub trait PrepareQuestions: Send + Sync {
    async fn prepare(&self, job: PreparationJob);
}

/// Atomic pool counters
#[derive(Default)]
pub struct PoolMetrics {
    pub enqueued: AtomicU64,
    pub processed: AtomicU64,
    pub dropped: AtomicU64,
    pub active_workers: AtomicU64,
}

/// Bounded worker pool for preparation jobs
pub struct PreparationPool {
    tx: mpsc::Sender<PreparationJob>,
    rx: Arc<tokio::sync::Mutex<mpsc::Receiver<PreparationJob>>>,
    worker_count: usize,
    max_idle: Duration,
    max_wait: Duration,
    shutdown: CancellationToken,
    handler: Mutex<Option<Weak<dyn PrepareQuestions>>>,
    pub metrics: Arc<PoolMetrics>,
}

impl PreparationPool {
    pub fn new(config: &WorkerConfig) -> Self {
        let (tx, rx) = mpsc::channel(config.queue_capacity());
        PreparationPool {
            tx,
            rx: Arc::new(tokio::sync::Mutex::new(rx)),
            worker_count: config.size.max(1),
            max_idle: config.max_idle(),
            max_wait: config.max_wait(),
            shutdown: CancellationToken::new(),
            handler: Mutex::new(None),
            metrics: Arc::new(PoolMetrics::default()),
        }
    }

    /// Start the workers against the given job executor.
    pub fn start(&self, handler: Weak<dyn PrepareQuestions>) {
        info!(
            workers = self.worker_count,
            queue_capacity = self.tx.max_capacity(),
            "Starting question preparation pool"
        );
        let mut slot = self.handler.lock().unwrap();
        *slot = Some(handler.clone());
        for worker_id in 0..self.worker_count {
            self.spawn_worker(worker_id, handler.clone());
        }
    }

    /// Respawn the worker complement if the pool has shrunk to zero.
    ///
    /// Called before each enqueue; a job arriving after shrinkage only
    /// observes the respawn latency.
    pub fn ensure_workers(&self) {
        let slot = self.handler.lock().unwrap();
        let Some(handler) = slot.as_ref() else {
            return;
        };
        if self.metrics.active_workers.load(Ordering::SeqCst) == 0 {
            debug!("Preparation pool empty, respawning workers");
            for worker_id in 0..self.worker_count {
                self.spawn_worker(worker_id, handler.clone());
            }
        }
    }

    fn spawn_worker(&self, worker_id: usize, handler: Weak<dyn PrepareQuestions>) {
        let rx = Arc::clone(&self.rx);
        let metrics = Arc::clone(&self.metrics);
        let shutdown = self.shutdown.clone();
        let max_idle = self.max_idle;

        metrics.active_workers.fetch_add(1, Ordering::SeqCst);
        tokio::spawn(async move {
            let mut jobs_processed: u64 = 0;
            loop {
                let received = tokio::select! {
                    _ = shutdown.cancelled() => {
                        debug!(worker_id, jobs_processed, "Worker stopping, pool shut down");
                        break;
                    }
                    _ = tokio::time::sleep(max_idle) => {
                        info!(worker_id, jobs_processed, "Worker idle timeout, exiting");
                        break;
                    }
                    job = async { rx.lock().await.recv().await } => job,
                };

                let Some(job) = received else {
                    debug!(worker_id, "Worker stopping, queue closed");
                    break;
                };

                let Some(handler) = handler.upgrade() else {
                    debug!(worker_id, "Worker stopping, engine dropped");
                    break;
                };

                let wait = job.enqueued_at.elapsed();
                let started = Instant::now();
                debug!(
                    worker_id,
                    interview_id = %job.interview_id,
                    question_index = job.next_question_index,
                    wait_ms = wait.as_millis() as u64,
                    "Worker processing job"
                );

                handler.prepare(job).await;

                metrics.processed.fetch_add(1, Ordering::SeqCst);
                jobs_processed += 1;
                debug!(
                    worker_id,
                    processing_ms = started.elapsed().as_millis() as u64,
                    "Worker completed job"
                );
            }
            metrics.active_workers.fetch_sub(1, Ordering::SeqCst);
        });
    }

    /// Enqueue a job: immediate try-send, then a bounded wait, then drop.
    ///
    /// Returns whether the job was accepted. A dropped job is only logged;
    /// the next fetch of the same question re-enqueues it.
    pub async fn enqueue(&self, mut job: PreparationJob) -> bool {
        job.enqueued_at = Instant::now();
        debug!(
            interview_id = %job.interview_id,
            question_index = job.next_question_index,
            "Enqueuing question preparation job"
        );

        let job = match self.tx.try_send(job) {
            Ok(()) => {
                self.metrics.enqueued.fetch_add(1, Ordering::SeqCst);
                return true;
            }
            Err(TrySendError::Full(job)) => job,
            Err(TrySendError::Closed(_)) => {
                self.metrics.dropped.fetch_add(1, Ordering::SeqCst);
                warn!("Preparation queue closed, dropping job");
                return false;
            }
        };

        match self.tx.send_timeout(job, self.max_wait).await {
            Ok(()) => {
                self.metrics.enqueued.fetch_add(1, Ordering::SeqCst);
                true
            }
            Err(e) => {
                self.metrics.dropped.fetch_add(1, Ordering::SeqCst);
                warn!(
                    wait_ms = self.max_wait.as_millis() as u64,
                    active_workers = self.metrics.active_workers.load(Ordering::SeqCst),
                    error = %e,
                    "Preparation queue full, dropping job"
                );
                false
            }
        }
    }

    /// Cancel the workers; in-flight jobs finish, queued jobs are abandoned.
    pub fn shutdown(&self) {
        info!("Shutting down question preparation pool");
        self.shutdown.cancel();
    }
}
