//! Bounded admission for backend-bound query requests.
//!
//! The gate holds a fixed number of slots. A request takes one before it is
//! validated and forwarded, and gives it back when its response body has been
//! fully streamed or the attempt fails.

use std::future::Future;
use std::sync::Arc;

use tokio::sync::{OwnedSemaphorePermit, Semaphore};

use crate::error::{PromGateError, Result};

/// Counting gate limiting concurrent query requests.
///
/// Cloning shares the underlying slots.
#[derive(Debug, Clone)]
pub struct AdmissionGate {
    semaphore: Arc<Semaphore>,
    capacity: usize,
}

/// One admission slot. The slot is released on drop.
#[derive(Debug)]
pub struct AdmissionPermit {
    _permit: OwnedSemaphorePermit,
}

impl AdmissionGate {
    /// Creates a gate with `capacity` slots.
    ///
    /// # Errors
    ///
    /// Returns [`PromGateError::ConfigError`] if `capacity` is zero.
    pub fn new(capacity: usize) -> Result<Self> {
        if capacity == 0 {
            return Err(PromGateError::ConfigError(
                "max_concurrency must be greater than 0".to_string(),
            ));
        }
        if capacity > Semaphore::MAX_PERMITS {
            return Err(PromGateError::ConfigError(format!(
                "max_concurrency must not exceed {}",
                Semaphore::MAX_PERMITS
            )));
        }

        Ok(Self {
            semaphore: Arc::new(Semaphore::new(capacity)),
            capacity,
        })
    }

    /// Total number of slots.
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Number of free slots.
    pub fn available(&self) -> usize {
        self.semaphore.available_permits()
    }

    /// Number of slots currently held.
    pub fn in_flight(&self) -> usize {
        self.capacity.saturating_sub(self.available())
    }

    pub fn at_capacity(&self) -> bool {
        self.available() == 0
    }

    /// Takes a slot if one is free right now.
    pub fn try_acquire(&self) -> Option<AdmissionPermit> {
        self.semaphore
            .clone()
            .try_acquire_owned()
            .ok()
            .map(|permit| AdmissionPermit { _permit: permit })
    }

    /// Waits for a slot, giving up when `cancelled` completes first.
    ///
    /// Waiters are served in FIFO order.
    ///
    /// # Errors
    ///
    /// [`PromGateError::RequestCancelled`] if `cancelled` resolves before a
    /// slot is free, [`PromGateError::AdmissionClosed`] if the gate was closed.
    pub async fn acquire<F>(&self, cancelled: F) -> Result<AdmissionPermit>
    where
        F: Future<Output = ()>,
    {
        tokio::select! {
            biased;
            permit = self.semaphore.clone().acquire_owned() => permit
                .map(|permit| AdmissionPermit { _permit: permit })
                .map_err(|_| PromGateError::AdmissionClosed),
            () = cancelled => Err(PromGateError::RequestCancelled),
        }
    }

    /// Closes the gate. Pending and future `acquire` calls fail.
    pub fn close(&self) {
        self.semaphore.close();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::future;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    #[test]
    fn test_gate_rejects_zero_capacity() {
        assert!(matches!(
            AdmissionGate::new(0),
            Err(PromGateError::ConfigError(_))
        ));
    }

    #[test]
    fn test_gate_capacity_accounting() {
        let gate = AdmissionGate::new(2).unwrap();
        assert_eq!(gate.capacity(), 2);
        assert_eq!(gate.available(), 2);
        assert_eq!(gate.in_flight(), 0);

        let first = gate.try_acquire();
        assert!(first.is_some());
        let second = gate.try_acquire();
        assert!(second.is_some());

        assert!(gate.at_capacity());
        assert_eq!(gate.in_flight(), 2);
        assert!(gate.try_acquire().is_none());

        drop(first);
        assert!(!gate.at_capacity());
        assert!(gate.try_acquire().is_some());
    }

    #[test]
    fn test_gate_clone_shares_slots() {
        let gate = AdmissionGate::new(1).unwrap();
        let clone = gate.clone();

        let _permit = gate.try_acquire().unwrap();
        assert!(clone.at_capacity());
    }

    #[tokio::test]
    async fn test_acquire_free_slot_ignores_cancellation() {
        let gate = AdmissionGate::new(1).unwrap();
        // An already-fired signal loses to a free slot.
        let permit = gate.acquire(future::ready(())).await;
        assert!(permit.is_ok());
    }

    #[tokio::test]
    async fn test_acquire_cancelled_while_waiting() {
        let gate = AdmissionGate::new(1).unwrap();
        let _held = gate.try_acquire().unwrap();

        let result = gate
            .acquire(tokio::time::sleep(Duration::from_millis(20)))
            .await;
        assert!(matches!(result, Err(PromGateError::RequestCancelled)));
        assert_eq!(gate.in_flight(), 1);
    }

    #[tokio::test]
    async fn test_acquire_waits_for_release() {
        let gate = AdmissionGate::new(1).unwrap();
        let held = gate.try_acquire().unwrap();

        let waiter = {
            let gate = gate.clone();
            tokio::spawn(async move { gate.acquire(future::pending()).await.is_ok() })
        };

        tokio::time::sleep(Duration::from_millis(20)).await;
        assert!(!waiter.is_finished());

        drop(held);
        assert!(waiter.await.unwrap());
    }

    #[tokio::test]
    async fn test_acquire_after_close() {
        let gate = AdmissionGate::new(1).unwrap();
        gate.close();
        let result = gate.acquire(future::pending()).await;
        assert!(matches!(result, Err(PromGateError::AdmissionClosed)));
    }

    #[tokio::test]
    async fn test_at_most_capacity_run_concurrently() {
        const CAPACITY: usize = 3;
        let gate = AdmissionGate::new(CAPACITY).unwrap();
        let running = Arc::new(AtomicUsize::new(0));
        let peak = Arc::new(AtomicUsize::new(0));

        let tasks: Vec<_> = (0..CAPACITY + 1)
            .map(|_| {
                let gate = gate.clone();
                let running = running.clone();
                let peak = peak.clone();
                tokio::spawn(async move {
                    let _permit = gate.acquire(future::pending()).await.unwrap();
                    let now = running.fetch_add(1, Ordering::SeqCst) + 1;
                    peak.fetch_max(now, Ordering::SeqCst);
                    tokio::time::sleep(Duration::from_millis(30)).await;
                    running.fetch_sub(1, Ordering::SeqCst);
                })
            })
            .collect();

        for task in tasks {
            task.await.unwrap();
        }

        assert_eq!(peak.load(Ordering::SeqCst), CAPACITY);
        assert_eq!(gate.available(), CAPACITY);
    }
}
