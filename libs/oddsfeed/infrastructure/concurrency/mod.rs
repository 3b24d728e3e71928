//! Concurrency primitives shared by the fetch and feed paths

pub mod gate;
pub mod key_lock;

pub use gate::{ConcurrencyGate, GateError, GateHandle};
pub use key_lock::{KeyLockGuard, KeyLockManager, LockToken, ALL_KEY};
