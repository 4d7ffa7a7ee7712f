//! Reconcile scheduler
//!
//! The Controller turns key notifications into reconcile runs:
//!
//! - **Coalescing**: repeated notifications for a queued key become one run
//! - **Worker pool**: at most `workers` reconciles run at once
//! - **Per-key ordering**: a key never runs twice concurrently; a
//!   notification that arrives while it runs marks it dirty and it is re-run
//!   once the current run finishes
//! - **Requeue**: `RequeueAfter` arms a timer, `RequeueNow` re-queues at once
//! - **Backoff**: failures are retried after `base * 2^(n-1)`, capped at `max`
//!
//! ## Shutdown
//!
//! Cancelling the token passed to [`Controller::run`] stops dispatching,
//! propagates cancellation to running reconciles and waits for them to
//! return. `run` also returns once every [`ControllerHandle`] is dropped and
//! no work or timer is left.

use std::collections::{HashMap, HashSet, VecDeque};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::task::JoinSet;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use crate::config::ReconcilerConfig;
use crate::error::{Error, Result};
use crate::model::ObjectKey;
use crate::reconciler::{Reconcile, ReconcileAction};

/// Sends key notifications to a running [`Controller`]
#[derive(Debug, Clone)]
pub struct ControllerHandle {
    tx: mpsc::UnboundedSender<ObjectKey>,
}

impl ControllerHandle {
    /// Request a reconcile of `key`
    ///
    /// Returns `false` when the controller has stopped.
    pub fn enqueue(&self, key: ObjectKey) -> bool {
        self.tx.send(key).is_ok()
    }
}

/// Delay before retry number `failures` (1-based)
pub fn backoff_delay(failures: u32, base: Duration, max: Duration) -> Duration {
    let exponent = failures.saturating_sub(1).min(31);
    base.saturating_mul(1u32 << exponent).min(max)
}

pub struct Controller {
    reconciler: Arc<dyn Reconcile>,
    rx: mpsc::UnboundedReceiver<ObjectKey>,
    workers: usize,
    backoff_base: Duration,
    backoff_max: Duration,
}

impl Controller {
    pub fn new(reconciler: Arc<dyn Reconcile>, config: &ReconcilerConfig) -> (Self, ControllerHandle) {
        let (tx, rx) = mpsc::unbounded_channel();
        let controller = Self {
            reconciler,
            rx,
            workers: config.workers.max(1),
            backoff_base: config.backoff_base(),
            backoff_max: config.backoff_max(),
        };
        (controller, ControllerHandle { tx })
    }

    /// Run until `cancel` fires, or until all handles are gone and the queue is idle
    pub async fn run(mut self, cancel: CancellationToken) -> Result<()> {
        let mut queue = WorkQueue::default();
        let mut running: JoinSet<(ObjectKey, Result<ReconcileAction>)> = JoinSet::new();
        let mut inbox_open = true;

        info!("Controller started with {} workers", self.workers);

        loop {
            while running.len() < self.workers {
                let Some(key) = queue.next_ready() else {
                    break;
                };
                debug!("Reconciling {}", key);
                running.spawn(run_one(self.reconciler.clone(), key, cancel.child_token()));
            }

            if !inbox_open && running.is_empty() && queue.is_idle() {
                debug!("All handles dropped and queue drained");
                break;
            }

            let next_timer = queue.next_timer();

            tokio::select! {
                biased;

                _ = cancel.cancelled() => {
                    info!("Controller shutting down");
                    break;
                }

                Some(joined) = running.join_next(), if !running.is_empty() => match joined {
                    Ok((key, result)) => self.complete(&mut queue, key, result),
                    Err(e) => error!("Reconcile worker failed: {}", e),
                },

                received = self.rx.recv(), if inbox_open => match received {
                    Some(key) => queue.notify(key),
                    None => inbox_open = false,
                },

                _ = tokio::time::sleep_until(next_timer.unwrap_or_else(Instant::now)), if next_timer.is_some() => {
                    queue.fire_due_timers(Instant::now());
                }
            }
        }

        // Running reconciles observe the cancelled child tokens
        while let Some(joined) = running.join_next().await {
            if let Err(e) = joined {
                warn!("Reconcile task failed during shutdown: {}", e);
            }
        }

        info!("Controller stopped");
        Ok(())
    }

    fn complete(&self, queue: &mut WorkQueue, key: ObjectKey, result: Result<ReconcileAction>) {
        match result {
            Ok(ReconcileAction::RequeueAfter(delay)) => {
                debug!("Reconciled {}, next run in {:?}", key, delay);
                queue.finish(&key, Some(delay), true);
            }
            Ok(ReconcileAction::RequeueNow) => {
                debug!("Reconciled {}, requeued immediately", key);
                queue.finish(&key, Some(Duration::ZERO), true);
            }
            Ok(ReconcileAction::AwaitChange) => {
                debug!("Reconciled {}, waiting for changes", key);
                queue.finish(&key, None, true);
            }
            Err(Error::Cancelled) => {
                debug!("Reconcile of {} cancelled", key);
                queue.finish(&key, None, false);
            }
            Err(e) if !e.is_transient() => {
                // Retrying sooner cannot help until the source or key changes
                let failures = queue.record_failure(&key);
                error!(
                    "Reconcile of {} failed permanently (attempt {}), retrying in {:?}: {}",
                    key, failures, self.backoff_max, e
                );
                queue.finish(&key, Some(self.backoff_max), false);
            }
            Err(e) => {
                let failures = queue.record_failure(&key);
                let delay = backoff_delay(failures, self.backoff_base, self.backoff_max);
                error!(
                    "Reconcile of {} failed (attempt {}), retrying in {:?}: {}",
                    key, failures, delay, e
                );
                queue.finish(&key, Some(delay), false);
            }
        }
    }
}

/// Reconcile `key`, reporting a panic as an error instead of losing the key
async fn run_one(
    reconciler: Arc<dyn Reconcile>,
    key: ObjectKey,
    cancel: CancellationToken,
) -> (ObjectKey, Result<ReconcileAction>) {
    let task_key = key.clone();
    let task = tokio::spawn(async move { reconciler.reconcile(&task_key, &cancel).await });

    let result = match task.await {
        Ok(result) => result,
        Err(e) => Err(Error::Other(format!("reconcile of {key} panicked: {e}"))),
    };
    (key, result)
}

/// Roughly 30 years; stands in for delays `Instant` cannot represent
const FAR_FUTURE: Duration = Duration::from_secs(86400 * 365 * 30);

/// `now + delay`, saturating instead of overflowing
fn deadline_after(delay: Duration) -> Instant {
    let now = Instant::now();
    now.checked_add(delay)
        .or_else(|| now.checked_add(FAR_FUTURE))
        .unwrap_or(now)
}

/// Scheduling state, owned by the controller loop
#[derive(Debug, Default)]
struct WorkQueue {
    /// Ready keys, in notification order
    pending: VecDeque<ObjectKey>,
    /// Keys present in `pending`
    queued: HashSet<ObjectKey>,
    /// Keys with a reconcile in flight
    active: HashSet<ObjectKey>,
    /// Active keys notified again while running
    dirty: HashSet<ObjectKey>,
    /// Delayed requeues
    timers: HashMap<ObjectKey, Instant>,
    /// Consecutive failures per key
    failures: HashMap<ObjectKey, u32>,
}

impl WorkQueue {
    fn notify(&mut self, key: ObjectKey) {
        if self.active.contains(&key) {
            self.dirty.insert(key);
            return;
        }
        self.timers.remove(&key);
        if self.queued.insert(key.clone()) {
            self.pending.push_back(key);
        }
    }

    /// Pop the next key and mark it active
    fn next_ready(&mut self) -> Option<ObjectKey> {
        let key = self.pending.pop_front()?;
        self.queued.remove(&key);
        self.active.insert(key.clone());
        Some(key)
    }

    fn record_failure(&mut self, key: &ObjectKey) -> u32 {
        let failures = self.failures.entry(key.clone()).or_insert(0);
        *failures += 1;
        *failures
    }

    /// Release an active key and schedule its next run
    fn finish(&mut self, key: &ObjectKey, requeue: Option<Duration>, succeeded: bool) {
        self.active.remove(key);
        if succeeded {
            self.failures.remove(key);
        }

        if self.dirty.remove(key) {
            self.notify(key.clone());
            return;
        }

        match requeue {
            Some(delay) if delay.is_zero() => self.notify(key.clone()),
            Some(delay) => {
                self.timers.insert(key.clone(), deadline_after(delay));
            }
            None => {}
        }
    }

    fn next_timer(&self) -> Option<Instant> {
        self.timers.values().min().copied()
    }

    fn fire_due_timers(&mut self, now: Instant) {
        let due: Vec<ObjectKey> = self
            .timers
            .iter()
            .filter(|(_, at)| **at <= now)
            .map(|(key, _)| key.clone())
            .collect();
        for key in due {
            self.timers.remove(&key);
            self.notify(key);
        }
    }

    fn is_idle(&self) -> bool {
        self.pending.is_empty() && self.active.is_empty() && self.timers.is_empty()
    }
}
