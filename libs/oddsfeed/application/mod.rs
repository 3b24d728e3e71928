//! Application Layer
//!
//! Fetch orchestration, producer tracking, message receipt and processing,
//! snapshots and the `OddsFeed` facade.
//! This layer depends on domain and infrastructure layers.

pub mod facade;
pub mod listeners;
pub mod orchestrator;
pub mod processors;
pub mod receiver;
pub mod registry;
pub mod routing;
pub mod session;
pub mod snapshot;

// Re-export application facade for binaries
pub use facade::{init_logging, init_logging_with_level, OddsFeed};

pub use listeners::{ListenerId, ListenerRegistry};
pub use orchestrator::{FetchError, FetchOrchestrator};
pub use processors::{
    CacheMessageProcessor, ChainHandler, DispatchProcessor, FeedMessageProcessor, ProcessorChain,
    SessionListener,
};
pub use receiver::{
    DropReason, FeedReceiver, FeedRoute, ReceiverListener, ReceiverMetrics, ReceiverStats,
    TIMESTAMP_HEADER,
};
pub use registry::{ProducerRegistry, RegistryError};
pub use routing::{MessageInterest, RoutingKeyError, RoutingKeyInfo};
pub use session::FeedSession;
pub use snapshot::CacheSnapshot;
