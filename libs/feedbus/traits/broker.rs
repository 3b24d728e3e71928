//! Broker boundary
//!
//! The consumer treats the broker as an ordered per-queue source of byte
//! messages tagged with routing keys. The wire protocol behind it is not
//! this crate's concern.

use crate::Result;
use async_trait::async_trait;
use std::collections::HashMap;
use tokio::sync::mpsc::UnboundedReceiver;

/// A single message handed over by the broker
#[derive(Debug, Clone, Default)]
pub struct Delivery {
    /// Routing key the message was published with
    pub routing_key: String,
    /// Raw message body
    pub body: Vec<u8>,
    /// Transport headers (e.g. `timestamp_in_ms`)
    pub headers: HashMap<String, String>,
    /// Broker-assigned, per-broker monotonically increasing tag
    pub delivery_tag: u64,
}

impl Delivery {
    pub fn new(routing_key: impl Into<String>, body: impl Into<Vec<u8>>) -> Self {
        Self {
            routing_key: routing_key.into(),
            body: body.into(),
            headers: HashMap::new(),
            delivery_tag: 0,
        }
    }

    pub fn with_header(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.insert(key.into(), value.into());
        self
    }

    pub fn header(&self, key: &str) -> Option<&str> {
        self.headers.get(key).map(String::as_str)
    }

    pub fn is_empty(&self) -> bool {
        self.body.is_empty()
    }
}

/// A named queue and the routing-key patterns bound to it
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QueueBinding {
    pub queue: String,
    pub routing_keys: Vec<String>,
}

impl QueueBinding {
    pub fn new(queue: impl Into<String>, routing_keys: Vec<String>) -> Self {
        Self {
            queue: queue.into(),
            routing_keys,
        }
    }
}

/// Ordered stream of deliveries for one queue
///
/// `next()` returning `None` means the broker closed the subscription
/// (connection loss or explicit unsubscribe).
pub struct Subscription {
    queue: String,
    receiver: UnboundedReceiver<Delivery>,
}

impl Subscription {
    pub fn new(queue: impl Into<String>, receiver: UnboundedReceiver<Delivery>) -> Self {
        Self {
            queue: queue.into(),
            receiver,
        }
    }

    pub fn queue(&self) -> &str {
        &self.queue
    }

    /// Wait for the next delivery
    pub async fn next(&mut self) -> Option<Delivery> {
        self.receiver.recv().await
    }
}

/// Message broker consumed by the feed
#[async_trait]
pub trait MessageBroker: Send + Sync + 'static {
    /// Declare `binding.queue`, bind it to every routing-key pattern and
    /// start consuming it
    async fn subscribe(&self, binding: &QueueBinding) -> Result<Subscription>;

    /// Stop consuming a queue; its subscription stream ends
    async fn unsubscribe(&self, queue: &str) -> Result<()>;
}
