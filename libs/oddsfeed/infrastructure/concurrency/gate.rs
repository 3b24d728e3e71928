//! Bounded, key-reentrant slot pool
//!
//! At most `size` distinct keys hold a slot at any time. Acquiring a key
//! that already holds a slot joins that slot instead of taking capacity.

use parking_lot::Mutex;
use thiserror::Error;
use tokio::sync::Semaphore;
use tracing::{trace, warn};

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum GateError {
    #[error("no gate slot is held for key '{0}'")]
    NotHeld(String),

    #[error("gate size must be at least 1")]
    InvalidSize,

    #[error("gate closed")]
    Closed,
}

pub type Result<T> = std::result::Result<T, GateError>;

#[derive(Debug, Default)]
struct Slot {
    key: Option<String>,
    usage: usize,
}

/// Invariant: available permits never exceed the number of free slots, so
/// a caller holding a permit always finds a free slot.
pub struct ConcurrencyGate {
    permits: Semaphore,
    slots: Mutex<Vec<Slot>>,
    size: usize,
}

impl ConcurrencyGate {
    pub fn new(size: usize) -> Result<Self> {
        if size == 0 {
            return Err(GateError::InvalidSize);
        }
        Ok(Self {
            permits: Semaphore::new(size),
            slots: Mutex::new((0..size).map(|_| Slot::default()).collect()),
            size,
        })
    }

    pub fn size(&self) -> usize {
        self.size
    }

    /// Number of slots not associated with any key
    pub fn available(&self) -> usize {
        self.slots.lock().iter().filter(|s| s.key.is_none()).count()
    }

    pub fn is_held(&self, key: &str) -> bool {
        self.slots.lock().iter().any(|s| s.key.as_deref() == Some(key))
    }

    /// Usage count of the slot held for `key` (0 when none)
    pub fn usage(&self, key: &str) -> usize {
        self.slots
            .lock()
            .iter()
            .find(|s| s.key.as_deref() == Some(key))
            .map_or(0, |s| s.usage)
    }

    /// Acquire a slot for `key`, waiting for capacity without blocking a thread
    ///
    /// The returned handle releases on drop.
    pub async fn acquire(&self, key: &str) -> Result<GateHandle<'_>> {
        if self.join_existing(key) {
            trace!(key, "Joined held gate slot");
            return Ok(GateHandle::new(self, key));
        }

        let permit = self.permits.acquire().await.map_err(|_| GateError::Closed)?;
        permit.forget();

        let mut slots = self.slots.lock();
        if let Some(slot) = slots.iter_mut().find(|s| s.key.as_deref() == Some(key)) {
            // Claimed by another caller while we waited for capacity
            slot.usage += 1;
            drop(slots);
            self.permits.add_permits(1);
            return Ok(GateHandle::new(self, key));
        }

        match slots.iter_mut().find(|s| s.key.is_none()) {
            Some(slot) => {
                slot.key = Some(key.to_string());
                slot.usage = 1;
                trace!(key, "Claimed free gate slot");
                Ok(GateHandle::new(self, key))
            }
            None => {
                drop(slots);
                self.permits.add_permits(1);
                warn!(key, "Gate permit held but no free slot found");
                Err(GateError::Closed)
            }
        }
    }

    fn join_existing(&self, key: &str) -> bool {
        let mut slots = self.slots.lock();
        match slots.iter_mut().find(|s| s.key.as_deref() == Some(key)) {
            Some(slot) => {
                slot.usage += 1;
                true
            }
            None => false,
        }
    }

    /// Release one usage of `key`'s slot; frees the slot at zero usage
    pub fn release(&self, key: &str) -> Result<()> {
        let mut slots = self.slots.lock();
        let slot = slots
            .iter_mut()
            .find(|s| s.key.as_deref() == Some(key))
            .ok_or_else(|| GateError::NotHeld(key.to_string()))?;

        slot.usage = slot.usage.saturating_sub(1);
        if slot.usage == 0 {
            slot.key = None;
            drop(slots);
            self.permits.add_permits(1);
            trace!(key, "Freed gate slot");
        }
        Ok(())
    }
}

/// Held usage of a gate slot
pub struct GateHandle<'a> {
    gate: &'a ConcurrencyGate,
    key: String,
}

impl<'a> GateHandle<'a> {
    fn new(gate: &'a ConcurrencyGate, key: &str) -> Self {
        Self {
            gate,
            key: key.to_string(),
        }
    }

    pub fn key(&self) -> &str {
        &self.key
    }
}

impl Drop for GateHandle<'_> {
    fn drop(&mut self) {
        if let Err(e) = self.gate.release(&self.key) {
            warn!(key = %self.key, error = %e, "Gate handle release failed");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::time::Duration;

    #[test]
    fn test_zero_size_rejected() {
        assert!(matches!(ConcurrencyGate::new(0), Err(GateError::InvalidSize)));
    }

    #[test]
    fn test_release_unheld_key_is_error() {
        let gate = ConcurrencyGate::new(2).unwrap();
        assert_eq!(gate.release("sr:match:1"), Err(GateError::NotHeld("sr:match:1".into())));
    }

    #[tokio::test]
    async fn test_same_key_shares_one_slot() {
        let gate = ConcurrencyGate::new(1).unwrap();

        let first = gate.acquire("a").await.unwrap();
        let second = gate.acquire("a").await.unwrap();
        assert_eq!(gate.usage("a"), 2);
        assert_eq!(gate.available(), 0);

        drop(first);
        assert!(gate.is_held("a"));
        drop(second);
        assert!(!gate.is_held("a"));
        assert_eq!(gate.available(), 1);
    }

    #[tokio::test]
    async fn test_extra_key_waits_for_release() {
        let gate = Arc::new(ConcurrencyGate::new(2).unwrap());

        let a = gate.acquire("a").await.unwrap();
        let _b = gate.acquire("b").await.unwrap();

        let waiter = {
            let gate = Arc::clone(&gate);
            tokio::spawn(async move {
                let _c = gate.acquire("c").await.unwrap();
            })
        };

        tokio::time::sleep(Duration::from_millis(50)).await;
        assert!(!waiter.is_finished());

        drop(a);
        tokio::time::timeout(Duration::from_secs(1), waiter)
            .await
            .expect("waiter should be unblocked")
            .unwrap();
    }

    #[tokio::test]
    async fn test_one_release_wakes_one_waiter() {
        let gate = Arc::new(ConcurrencyGate::new(1).unwrap());
        std::mem::forget(gate.acquire("a").await.unwrap());

        let (acquired_tx, mut acquired) = tokio::sync::mpsc::unbounded_channel();
        for key in ["b", "c"] {
            let gate = Arc::clone(&gate);
            let acquired_tx = acquired_tx.clone();
            tokio::spawn(async move {
                std::mem::forget(gate.acquire(key).await.unwrap());
                let _ = acquired_tx.send(key);
            });
        }

        tokio::time::sleep(Duration::from_millis(50)).await;
        assert!(acquired.try_recv().is_err());

        gate.release("a").unwrap();
        let first = tokio::time::timeout(Duration::from_secs(1), acquired.recv())
            .await
            .expect("one waiter should be unblocked")
            .unwrap();
        tokio::time::sleep(Duration::from_millis(50)).await;
        assert!(acquired.try_recv().is_err());
        assert!(gate.is_held(first));
        assert_eq!(gate.available(), 0);

        gate.release(first).unwrap();
        let second = tokio::time::timeout(Duration::from_secs(1), acquired.recv())
            .await
            .expect("second waiter should be unblocked")
            .unwrap();
        assert_ne!(first, second);

        gate.release(second).unwrap();
        assert_eq!(gate.available(), 1);
    }
}
