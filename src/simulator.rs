//! Fake payment confirmation for non-production runs.
//!
//! After a registration, a one-shot task flips `paymentStatus` to true once
//! the configured delay has passed. At most one task is pending per machine
//! id: scheduling again aborts the previous one.

use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;
use tokio::task::AbortHandle;
use tracing::{debug, error, info, warn};

use crate::models::UserPatch;
use crate::store::DocumentStore;

struct PendingConfirmation {
    attempt: u64,
    handle: AbortHandle,
}

type PendingMap = Arc<Mutex<HashMap<String, PendingConfirmation>>>;

pub struct PaymentSimulator {
    store: Arc<dyn DocumentStore>,
    delay: Duration,
    next_attempt: AtomicU64,
    pending: PendingMap,
}

impl PaymentSimulator {
    pub fn new(store: Arc<dyn DocumentStore>, delay: Duration) -> Self {
        Self {
            store,
            delay,
            next_attempt: AtomicU64::new(1),
            pending: Arc::new(Mutex::new(HashMap::new())),
        }
    }

    pub fn delay(&self) -> Duration {
        self.delay
    }

    /// Schedules a confirmation for `machine_id`, replacing any pending one.
    /// Returns the attempt id of the new task.
    pub fn schedule(&self, machine_id: &str) -> u64 {
        let attempt = self.next_attempt.fetch_add(1, Ordering::Relaxed);
        let store = Arc::clone(&self.store);
        let pending = Arc::clone(&self.pending);
        let delay = self.delay;
        let id = machine_id.to_owned();

        // Held across spawn so the task cannot finish and clean up before its
        // entry is registered.
        let mut registry = self.pending.lock();
        let task = tokio::spawn(async move {
            tokio::time::sleep(delay).await;

            match store.update_user(&id, &UserPatch::payment_confirmed()).await {
                Ok(Some(_)) => info!(machine_id = %id, attempt, "simulated payment confirmed"),
                Ok(None) => warn!(machine_id = %id, attempt, "simulated payment for unknown user"),
                Err(e) => error!(machine_id = %id, attempt, error = %e, "simulated payment failed"),
            }

            let mut registry = pending.lock();
            if registry.get(&id).map(|p| p.attempt) == Some(attempt) {
                registry.remove(&id);
            }
        });

        let entry = PendingConfirmation {
            attempt,
            handle: task.abort_handle(),
        };
        if let Some(previous) = registry.insert(machine_id.to_owned(), entry) {
            previous.handle.abort();
            debug!(
                machine_id,
                replaced = previous.attempt,
                attempt,
                "replaced pending simulated payment"
            );
        } else {
            debug!(machine_id, attempt, delay_secs = delay.as_secs(), "scheduled simulated payment");
        }

        attempt
    }

    /// Aborts the pending confirmation for `machine_id`, if any.
    pub fn cancel(&self, machine_id: &str) -> bool {
        match self.pending.lock().remove(machine_id) {
            Some(previous) => {
                previous.handle.abort();
                debug!(machine_id, attempt = previous.attempt, "cancelled simulated payment");
                true
            }
            None => false,
        }
    }

    pub fn is_pending(&self, machine_id: &str) -> bool {
        self.pending.lock().contains_key(machine_id)
    }

    pub fn pending_count(&self) -> usize {
        self.pending.lock().len()
    }

    /// Aborts every pending confirmation.
    pub fn shutdown(&self) {
        let mut registry = self.pending.lock();
        let count = registry.len();
        for (_, pending) in registry.drain() {
            pending.handle.abort();
        }
        if count > 0 {
            info!(count, "aborted pending simulated payments");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::reconciler::{Registration, UserReconciler};
    use crate::store::memory::MemoryStore;

    const DELAY: Duration = Duration::from_secs(15);

    async fn registered(store: &Arc<MemoryStore>, machine_id: &str) {
        let reconciler = UserReconciler::new(store.clone(), None);
        reconciler
            .reconcile(Registration::new(machine_id, "0xabc"))
            .await
            .unwrap();
    }

    async fn payment_status(store: &MemoryStore, machine_id: &str) -> bool {
        store
            .find_user(machine_id)
            .await
            .unwrap()
            .unwrap()
            .payment_status
    }

    #[tokio::test(start_paused = true)]
    async fn test_confirms_after_delay() {
        let store = Arc::new(MemoryStore::new());
        registered(&store, "m1").await;
        let simulator = PaymentSimulator::new(store.clone(), DELAY);

        simulator.schedule("m1");
        assert!(simulator.is_pending("m1"));

        tokio::time::sleep(DELAY - Duration::from_secs(1)).await;
        assert!(!payment_status(&store, "m1").await);

        tokio::time::sleep(Duration::from_secs(2)).await;
        assert!(payment_status(&store, "m1").await);
        assert!(!simulator.is_pending("m1"));
    }

    #[tokio::test(start_paused = true)]
    async fn test_reschedule_replaces_pending_task() {
        let store = Arc::new(MemoryStore::new());
        registered(&store, "m1").await;
        let simulator = PaymentSimulator::new(store.clone(), DELAY);

        let first = simulator.schedule("m1");
        tokio::time::sleep(Duration::from_secs(10)).await;
        let second = simulator.schedule("m1");
        assert!(second > first);
        assert_eq!(simulator.pending_count(), 1);

        // The first task would have fired here.
        tokio::time::sleep(Duration::from_secs(6)).await;
        assert!(!payment_status(&store, "m1").await);
        assert!(simulator.is_pending("m1"));

        tokio::time::sleep(Duration::from_secs(10)).await;
        assert!(payment_status(&store, "m1").await);
        assert_eq!(simulator.pending_count(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_cancel_prevents_confirmation() {
        let store = Arc::new(MemoryStore::new());
        registered(&store, "m1").await;
        let simulator = PaymentSimulator::new(store.clone(), DELAY);

        simulator.schedule("m1");
        assert!(simulator.cancel("m1"));
        assert!(!simulator.cancel("m1"));

        tokio::time::sleep(DELAY * 2).await;
        assert!(!payment_status(&store, "m1").await);
    }

    #[tokio::test(start_paused = true)]
    async fn test_unknown_user_is_logged_not_created() {
        let store = Arc::new(MemoryStore::new());
        let simulator = PaymentSimulator::new(store.clone(), DELAY);

        simulator.schedule("ghost");
        tokio::time::sleep(DELAY * 2).await;
        assert_eq!(store.user_count(), 0);
        assert_eq!(simulator.pending_count(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_shutdown_aborts_everything() {
        let store = Arc::new(MemoryStore::new());
        registered(&store, "m1").await;
        registered(&store, "m2").await;
        let simulator = PaymentSimulator::new(store.clone(), DELAY);

        simulator.schedule("m1");
        simulator.schedule("m2");
        simulator.shutdown();
        assert_eq!(simulator.pending_count(), 0);

        tokio::time::sleep(DELAY * 2).await;
        assert!(!payment_status(&store, "m1").await);
        assert!(!payment_status(&store, "m2").await);
    }
}
