//! Key-scoped mutual exclusion with bounded waits
//!
//! A key is "locked" while it is present in the map. Waiters poll until the
//! key is absent; a holder that outlives the timeout is taken over with a
//! warning instead of blocking forever. Every acquisition gets a token, and
//! a guard only removes the entry it took, never a successor's.

use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{Duration, Instant};
use tracing::{debug, warn};

pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(60);
pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_millis(50);
pub const MIN_TIMEOUT: Duration = Duration::from_secs(1);
pub const MIN_POLL_INTERVAL: Duration = Duration::from_millis(10);

/// Synthetic key held by `wait_all`; blocks every other acquisition
pub const ALL_KEY: &str = "__all__";

/// Identifies one acquisition of a key
pub type LockToken = u64;

#[derive(Debug, Clone, Copy)]
struct Holder {
    token: LockToken,
    acquired: Instant,
}

pub struct KeyLockManager {
    locks: DashMap<String, Holder>,
    next_token: AtomicU64,
    timeout: Duration,
    poll_interval: Duration,
}

impl KeyLockManager {
    /// Values below the minimums fall back to the defaults
    pub fn new(timeout: Duration, poll_interval: Duration) -> Self {
        Self {
            locks: DashMap::new(),
            next_token: AtomicU64::new(1),
            timeout: effective(timeout, MIN_TIMEOUT, DEFAULT_TIMEOUT),
            poll_interval: effective(poll_interval, MIN_POLL_INTERVAL, DEFAULT_POLL_INTERVAL),
        }
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    pub fn poll_interval(&self) -> Duration {
        self.poll_interval
    }

    pub fn is_locked(&self, key: &str) -> bool {
        self.locks.contains_key(key)
    }

    pub fn len(&self) -> usize {
        self.locks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.locks.is_empty()
    }

    fn holder(&self) -> Holder {
        Holder {
            token: self.next_token.fetch_add(1, Ordering::Relaxed),
            acquired: Instant::now(),
        }
    }

    fn try_take(&self, key: &str) -> Option<LockToken> {
        if key != ALL_KEY && self.locks.contains_key(ALL_KEY) {
            return None;
        }
        match self.locks.entry(key.to_string()) {
            Entry::Vacant(entry) => {
                let holder = self.holder();
                entry.insert(holder);
                Some(holder.token)
            }
            Entry::Occupied(_) => None,
        }
    }

    fn force_take(&self, key: &str, waited: Duration) -> LockToken {
        warn!(
            key,
            waited_ms = waited.as_millis() as u64,
            "Key lock wait timed out, taking over the key"
        );
        let holder = self.holder();
        self.locks.insert(key.to_string(), holder);
        holder.token
    }

    /// Wait until `key` is free, then take it
    pub async fn wait(&self, key: &str) -> LockToken {
        self.wait_with(key, self.timeout, self.poll_interval).await
    }

    pub async fn wait_with(&self, key: &str, timeout: Duration, poll_interval: Duration) -> LockToken {
        let timeout = effective(timeout, MIN_TIMEOUT, self.timeout);
        let poll_interval = effective(poll_interval, MIN_POLL_INTERVAL, self.poll_interval);
        let started = Instant::now();

        loop {
            if let Some(token) = self.try_take(key) {
                return token;
            }
            let waited = started.elapsed();
            if waited >= timeout {
                return self.force_take(key, waited);
            }
            tokio::time::sleep(poll_interval).await;
        }
    }

    /// Blocking variant for code running on dedicated OS threads
    pub fn wait_blocking(&self, key: &str) -> LockToken {
        let started = Instant::now();

        loop {
            if let Some(token) = self.try_take(key) {
                return token;
            }
            let waited = started.elapsed();
            if waited >= self.timeout {
                return self.force_take(key, waited);
            }
            std::thread::sleep(self.poll_interval);
        }
    }

    /// Take `key` and return a guard that releases it on drop
    pub async fn lock(&self, key: &str) -> KeyLockGuard<'_> {
        let token = self.wait(key).await;
        KeyLockGuard::new(self, key, token)
    }

    pub fn lock_blocking(&self, key: &str) -> KeyLockGuard<'_> {
        let token = self.wait_blocking(key);
        KeyLockGuard::new(self, key, token)
    }

    /// Remove `key`; releasing a key that is not held is a no-op
    pub fn release(&self, key: &str) {
        if self.locks.remove(key).is_none() {
            debug!(key, "Released key lock that was not held");
        }
    }

    /// Remove `key` only while `token` still owns it
    pub fn release_token(&self, key: &str, token: LockToken) -> bool {
        let released = self
            .locks
            .remove_if(key, |_, holder| holder.token == token)
            .is_some();
        if !released {
            debug!(key, token, "Key lock no longer owned by this holder, leaving it");
        }
        released
    }

    /// Take the global barrier and wait for every held key to drain
    pub async fn wait_all(&self) {
        self.wait(ALL_KEY).await;

        let started = Instant::now();
        while self.locks.iter().any(|entry| entry.key() != ALL_KEY) {
            if started.elapsed() >= self.timeout {
                warn!(
                    held = self.locks.len().saturating_sub(1),
                    "Timed out draining key locks behind the global barrier"
                );
                break;
            }
            tokio::time::sleep(self.poll_interval).await;
        }
    }

    pub fn release_all(&self) {
        self.release(ALL_KEY);
    }

    /// Purge entries held longer than the timeout; returns how many were purged
    pub fn clean(&self) -> usize {
        let timeout = self.timeout;
        let mut purged = 0;
        self.locks.retain(|key, holder| {
            let age = holder.acquired.elapsed();
            if age >= timeout {
                warn!(key = %key, age_ms = age.as_millis() as u64, "Purging expired key lock");
                purged += 1;
                false
            } else {
                true
            }
        });
        purged
    }
}

impl Default for KeyLockManager {
    fn default() -> Self {
        Self::new(DEFAULT_TIMEOUT, DEFAULT_POLL_INTERVAL)
    }
}

fn effective(value: Duration, minimum: Duration, fallback: Duration) -> Duration {
    if value >= minimum {
        value
    } else {
        fallback
    }
}

/// Held key lock
pub struct KeyLockGuard<'a> {
    manager: &'a KeyLockManager,
    key: String,
    token: LockToken,
}

impl<'a> KeyLockGuard<'a> {
    fn new(manager: &'a KeyLockManager, key: &str, token: LockToken) -> Self {
        Self {
            manager,
            key: key.to_string(),
            token,
        }
    }

    pub fn key(&self) -> &str {
        &self.key
    }

    pub fn token(&self) -> LockToken {
        self.token
    }
}

impl Drop for KeyLockGuard<'_> {
    fn drop(&mut self) {
        self.manager.release_token(&self.key, self.token);
    }
}
