//! Infrastructure Layer
//!
//! Concurrency primitives, the entity cache, the REST client boundary,
//! configuration, logging and snapshot persistence.
//! This layer depends on the domain layer but not on the application layer.

pub mod cache;
pub mod client;
pub mod concurrency;
pub mod config;
pub mod logging;
pub mod snapshot_store;

pub use cache::CacheStore;
pub use client::{DataProvider, DataProviderError, HttpDataProvider, TracedDataProvider};
pub use concurrency::{ConcurrencyGate, GateError, GateHandle, KeyLockGuard, KeyLockManager};
pub use config::{ConfigError, ExceptionHandlingStrategy, FeedConfig};
pub use logging::{init_tracing, init_tracing_with_level};
pub use snapshot_store::{SnapshotError, SnapshotStore};
