//! # FeedBus
//!
//! Broker-side plumbing for feed consumers: an abstract, ordered per-queue
//! message source with routing keys, plus the routing machinery that turns
//! raw deliveries into typed messages and hands them to sequential handlers.
//!
//! ## Features
//!
//! - **Broker boundary**: `MessageBroker` trait, `Delivery`, `QueueBinding`
//! - **In-memory topic broker**: AMQP-style `*`/`#` binding patterns, used
//!   for replay and tests
//! - **Type-state builder**: Compile-time guarantees for required configuration
//! - **Ordered consumption**: Deliveries of one queue are parsed in order and
//!   routed to per-route-key handler threads
//! - **Resubscription**: Pluggable reconnection strategies when the broker
//!   drops a subscription

pub mod core;
pub mod memory;
pub mod traits;

// Re-export all traits
pub use traits::*;

// Re-export core consumer functionality
pub use self::core::{
    builder::{states, ConsumerBuilder, RoutingBuilder},
    connection_state::{AtomicConnectionState, AtomicMetrics, ConnectionState},
    consumer::{ConsumerEvent, FeedConsumer, Metrics},
    config::ConsumerConfig,
};

pub use memory::{InMemoryBroker, TopicPattern};

/// Type alias for Result with BusError
pub type Result<T> = std::result::Result<T, traits::BusError>;
