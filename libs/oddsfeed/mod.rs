//! Odds Feed SDK Core
//!
//! Caching and message-processing core for a sports-odds feed client.
//!
//! ## Architecture
//!
//! - **domain**: URNs, languages, feed messages, producers, cache items and
//!   their exportable records
//! - **infrastructure**: concurrency gate, key locks, the entity cache, the
//!   REST boundary, configuration, logging and snapshot files
//! - **application**: fetch orchestration, producer registry, message
//!   receiver, processor chain, snapshots and the `OddsFeed` facade

pub mod application;
pub mod domain;
pub mod infrastructure;

// Re-export commonly used items
pub use application::{
    init_logging, init_logging_with_level, FeedSession, FetchError, MessageInterest, OddsFeed,
    ProducerRegistry, ReceiverListener, SessionListener,
};
pub use domain::{CacheItem, ExportableCacheItem, FeedMessage, Language, MessageKind, Urn};
pub use infrastructure::{DataProvider, ExceptionHandlingStrategy, FeedConfig};
