//! # FeedBus Traits
//!
//! Core traits and types shared by the broker boundary and the consumer:
//!
//! - **MessageBroker**: Subscribe a queue to routing-key patterns
//! - **MessageRouter**: Turn a raw delivery into a typed message
//! - **MessageHandler**: Process typed messages sequentially
//! - **ReconnectionStrategy**: Control resubscription behavior
//!
//! ## Example
//!
//! ```rust,ignore
//! use feedbus::*;
//!
//! struct TextRouter;
//!
//! #[async_trait]
//! impl MessageRouter for TextRouter {
//!     type Message = String;
//!     type RouteKey = ();
//!
//!     async fn parse(&self, delivery: Delivery) -> Result<Option<String>> {
//!         Ok(String::from_utf8(delivery.body).ok())
//!     }
//!
//!     fn route_key(&self, _message: &String) {}
//! }
//! ```

pub mod broker;
pub mod error;
pub mod reconnect;
pub mod router;

// Re-export commonly used types
pub use broker::{Delivery, MessageBroker, QueueBinding, Subscription};
pub use error::{BusError, Result};
pub use reconnect::{ExponentialBackoff, FixedDelay, NeverReconnect, ReconnectionStrategy};
pub use router::{MessageHandler, MessageRouter};
