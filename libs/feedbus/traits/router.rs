//! Message Routing System
//!
//! Core traits for turning broker deliveries into typed messages and routing
//! them to sequential handlers.
//!
//! # Architecture
//!
//! ```text
//! Broker queue → Consumer loop → Router::parse → Route Key → Channel → Handler Thread
//!                 (in order)                         ↓
//!                                             KeyA Channel → KeyA Handler (sequential)
//!                                             KeyB Channel → KeyB Handler (sequential)
//! ```
//!
//! # Ordering Guarantees
//!
//! - **Per-Queue Parse Order**: Deliveries are parsed in the order the broker
//!   hands them over; parsing is never fanned out to concurrent tasks
//! - **Per-Key Sequential**: Messages with the same route key are handled in order
//! - **Cross-Key Parallel**: Different route keys are handled concurrently

use crate::{Delivery, Result};
use async_trait::async_trait;
use std::fmt::Debug;
use std::hash::Hash;

/// Router that parses deliveries and determines routing
///
/// The router has two responsibilities:
/// 1. Parse the raw delivery into a typed message, or filter it out
/// 2. Extract a route key that determines which handler processes it
///
/// # Example
///
/// ```ignore
/// #[derive(Debug, Clone, PartialEq, Eq, Hash)]
/// enum Route {
///     System,
///     Event,
/// }
///
/// #[async_trait]
/// impl MessageRouter for FeedRouter {
///     type Message = FeedMessage;
///     type RouteKey = Route;
///
///     async fn parse(&self, delivery: Delivery) -> Result<Option<Self::Message>> {
///         // Deserialize, or return Ok(None) to drop the delivery
///     }
///
///     fn route_key(&self, message: &Self::Message) -> Self::RouteKey {
///         if message.is_event_related() { Route::Event } else { Route::System }
///     }
/// }
/// ```
#[async_trait]
pub trait MessageRouter: Send + Sync + 'static {
    /// The parsed message type
    type Message: Send + Debug + 'static;

    /// The route key type (determines which handler processes the message)
    type RouteKey: Hash + Eq + Clone + Send + Sync + Debug + 'static;

    /// Parse a raw delivery into a typed message
    ///
    /// Returns `Ok(None)` when the delivery is deliberately dropped (filtered)
    /// and `Err` when it could not be parsed. Neither outcome stops the
    /// consumer loop.
    async fn parse(&self, delivery: Delivery) -> Result<Option<Self::Message>>;

    /// Extract the route key from a parsed message
    fn route_key(&self, message: &Self::Message) -> Self::RouteKey;
}

/// Handler that processes typed messages sequentially
///
/// Each handler runs on its own dedicated OS thread and processes messages in
/// the order they were routed. Blocking inside `handle` is allowed; it only
/// delays messages sharing the same route key.
pub trait MessageHandler<M>: Send + 'static
where
    M: Send + Debug + 'static,
{
    /// Handle a parsed message
    ///
    /// # Errors
    /// If this returns an error, it will be logged but the handler thread
    /// continues processing subsequent messages.
    fn handle(&mut self, message: M) -> Result<()>;
}
