//! # Consumer core
//!
//! The consumer subscribes one queue, parses its deliveries in order and
//! routes the typed messages to handler threads.
//!
//! ## Example
//!
//! ```rust,ignore
//! let consumer = feedbus::builder(Arc::new(InMemoryBroker::new()))
//!     .binding(QueueBinding::new("session-1", vec!["*.*.live.#".into()]))
//!     .router(MyRouter, |routing| {
//!         routing
//!             .handler(Route::System, SystemHandler::new())
//!             .handler(Route::Event, EventHandler::new())
//!     })
//!     .reconnect_strategy(ExponentialBackoff::new(
//!         Duration::from_secs(1),
//!         Duration::from_secs(60),
//!         None,
//!     ))
//!     .build()
//!     .await?;
//!
//! while let Some(event) = consumer.try_recv_event() {
//!     println!("Event: {:?}", event);
//! }
//! ```

pub mod builder;
pub mod config;
pub mod connection_state;
pub mod consumer;

// Re-export main types
pub use builder::{states, ConsumerBuilder, RoutingBuilder};
pub use config::ConsumerConfig;
pub use connection_state::{AtomicConnectionState, AtomicMetrics, ConnectionState};
pub use consumer::{ConsumerEvent, FeedConsumer, Metrics};

// Re-export traits for convenience
pub use crate::traits::*;

use std::sync::Arc;

/// Create a new consumer builder for the given broker
pub fn builder(
    broker: Arc<dyn MessageBroker>,
) -> ConsumerBuilder<builder::states::NoBinding, builder::states::NoRouter, ()> {
    ConsumerBuilder::new(broker)
}
