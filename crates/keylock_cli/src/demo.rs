//! Worker loop contending for one lock.

use keylock_lock::{DistributedLock, LockError};
use std::time::Duration;
use tracing::{info, warn};

/// One demo worker.
#[derive(Debug, Clone)]
pub struct Worker {
    /// Client id used as lock owner
    pub id: String,
    /// Time spent holding the lock per round
    pub work: Duration,
}

impl Worker {
    /// Workers `worker-1..N`, one per work duration
    pub fn from_durations(work_ms: &[u64]) -> Vec<Self> {
        work_ms
            .iter()
            .enumerate()
            .map(|(i, ms)| Self {
                id: format!("worker-{}", i + 1),
                work: Duration::from_millis(*ms),
            })
            .collect()
    }
}

/// Lock, work, unlock, forever.
///
/// Failed acquisitions are retried after `retry`. A failed release is retried
/// until it goes through, unless the worker no longer owns the lock.
pub async fn run_worker(lock: DistributedLock, worker: Worker, retry: Duration) {
    loop {
        info!(worker = %worker.id, lock = lock.name(), "trying to lock");
        if let Err(err) = lock.lock(&worker.id).await {
            warn!(worker = %worker.id, error = %err, "lock failed, retrying");
            tokio::time::sleep(retry).await;
            continue;
        }

        info!(worker = %worker.id, work = ?worker.work, "locked, working");
        tokio::time::sleep(worker.work).await;

        loop {
            match lock.unlock(&worker.id).await {
                Ok(()) => {
                    info!(worker = %worker.id, "unlocked");
                    break;
                }
                Err(err @ LockError::NotOwner { .. }) => {
                    warn!(worker = %worker.id, error = %err, "lock lost while working");
                    break;
                }
                Err(err) => {
                    warn!(worker = %worker.id, error = %err, "unlock failed, retrying");
                    tokio::time::sleep(retry).await;
                }
            }
        }
    }
}
