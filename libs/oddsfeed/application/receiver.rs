//! Message receiver
//!
//! Turns broker deliveries into `FeedMessage`s. Runs inside the consumer's
//! parse step, so deliveries of one queue pass through here in order and
//! producer liveness is updated in delivery order.

use super::listeners::ListenerRegistry;
use super::registry::ProducerRegistry;
use super::routing::RoutingKeyInfo;
use crate::domain::{DeserializationError, FeedMessage, MessageKind};
use async_trait::async_trait;
use chrono::Utc;
use feedbus::{BusError, Delivery, MessageRouter};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tracing::{debug, warn};

/// Delivery header overriding the message's sent-at time
pub const TIMESTAMP_HEADER: &str = "timestamp_in_ms";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DropReason {
    UnknownProducer,
    InactiveProducer,
}

/// Receiver events; every method defaults to a no-op
pub trait ReceiverListener: Send + Sync {
    fn on_message_received(&self, _message: &FeedMessage, _raw: &[u8]) {}

    fn on_deserialization_failed(&self, _raw: &[u8], _error: &DeserializationError) {}

    fn on_message_dropped(&self, _message: &FeedMessage, _reason: DropReason) {}
}

/// Receiver counters
#[derive(Debug, Default)]
pub struct ReceiverMetrics {
    received: AtomicU64,
    empty_bodies: AtomicU64,
    deserialization_failures: AtomicU64,
    unknown_producer_drops: AtomicU64,
    inactive_producer_drops: AtomicU64,
    forwarded: AtomicU64,
}

/// Point-in-time copy of `ReceiverMetrics`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct ReceiverStats {
    pub received: u64,
    pub empty_bodies: u64,
    pub deserialization_failures: u64,
    pub unknown_producer_drops: u64,
    pub inactive_producer_drops: u64,
    pub forwarded: u64,
}

impl ReceiverMetrics {
    pub fn new() -> Self {
        Self::default()
    }

    #[inline]
    fn bump(counter: &AtomicU64) {
        counter.fetch_add(1, Ordering::Relaxed);
    }

    pub fn snapshot(&self) -> ReceiverStats {
        ReceiverStats {
            received: self.received.load(Ordering::Relaxed),
            empty_bodies: self.empty_bodies.load(Ordering::Relaxed),
            deserialization_failures: self.deserialization_failures.load(Ordering::Relaxed),
            unknown_producer_drops: self.unknown_producer_drops.load(Ordering::Relaxed),
            inactive_producer_drops: self.inactive_producer_drops.load(Ordering::Relaxed),
            forwarded: self.forwarded.load(Ordering::Relaxed),
        }
    }
}

/// Every forwarded message goes to the processor chain
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum FeedRoute {
    Processing,
}

pub struct FeedReceiver {
    registry: Arc<ProducerRegistry>,
    listeners: Arc<ListenerRegistry<dyn ReceiverListener>>,
    metrics: Arc<ReceiverMetrics>,
    replay: bool,
}

impl FeedReceiver {
    pub fn new(
        registry: Arc<ProducerRegistry>,
        listeners: Arc<ListenerRegistry<dyn ReceiverListener>>,
        metrics: Arc<ReceiverMetrics>,
        replay: bool,
    ) -> Self {
        Self {
            registry,
            listeners,
            metrics,
            replay,
        }
    }

    pub fn registry(&self) -> &Arc<ProducerRegistry> {
        &self.registry
    }

    pub fn metrics(&self) -> &Arc<ReceiverMetrics> {
        &self.metrics
    }

    /// Decode and vet one delivery
    ///
    /// `Ok(None)` means the delivery was dropped on purpose; `Err` means
    /// the body could not be decoded. Neither stops the consumer.
    pub fn receive(&self, delivery: &Delivery) -> Result<Option<FeedMessage>, DeserializationError> {
        ReceiverMetrics::bump(&self.metrics.received);

        if delivery.is_empty() {
            warn!(routing_key = %delivery.routing_key, "Dropping delivery with empty body");
            ReceiverMetrics::bump(&self.metrics.empty_bodies);
            return Ok(None);
        }

        let mut message = match FeedMessage::decode(&delivery.body) {
            Ok(message) => message,
            Err(e) => {
                warn!(routing_key = %delivery.routing_key, error = %e, "Failed to decode feed message");
                ReceiverMetrics::bump(&self.metrics.deserialization_failures);
                self.listeners
                    .for_each(|listener| listener.on_deserialization_failed(&delivery.body, &e));
                return Err(e);
            }
        };

        if let Some(sent_at) = delivery
            .header(TIMESTAMP_HEADER)
            .and_then(|value| value.trim().parse::<i64>().ok())
        {
            message.sent_at = sent_at;
        }
        message.received_at = Utc::now().timestamp_millis();

        if message.is_event_related() {
            match RoutingKeyInfo::parse(&delivery.routing_key) {
                Ok(info) => message.sport_id = info.sport_id,
                Err(e) => debug!(error = %e, "Routing key not parsed, sport id unknown"),
            }
        }

        if self.registry.get(message.product).is_unknown() {
            warn!(
                product = message.product,
                kind = message.kind_name(),
                "Dropping message from unknown producer"
            );
            self.drop_message(&message, DropReason::UnknownProducer);
            return Ok(None);
        }

        self.track_liveness(&message);

        if !self.replay && !self.registry.is_active(message.product) {
            debug!(
                product = message.product,
                kind = message.kind_name(),
                "Dropping message from inactive producer"
            );
            self.drop_message(&message, DropReason::InactiveProducer);
            return Ok(None);
        }

        self.registry.record_message(message.product, message.generated_at);
        ReceiverMetrics::bump(&self.metrics.forwarded);
        self.listeners
            .for_each(|listener| listener.on_message_received(&message, &delivery.body));

        Ok(Some(message))
    }

    fn track_liveness(&self, message: &FeedMessage) {
        match &message.kind {
            MessageKind::Alive(alive) if alive.subscribed => {
                self.registry.mark_up(message.product, message.received_at);
            }
            MessageKind::Alive(_) => {
                self.registry
                    .mark_down(message.product, "alive reports producer unsubscribed");
            }
            MessageKind::SnapshotComplete(_) => {
                self.registry.mark_up(message.product, message.received_at);
            }
            _ => {}
        }
    }

    fn drop_message(&self, message: &FeedMessage, reason: DropReason) {
        let counter = match reason {
            DropReason::UnknownProducer => &self.metrics.unknown_producer_drops,
            DropReason::InactiveProducer => &self.metrics.inactive_producer_drops,
        };
        ReceiverMetrics::bump(counter);
        self.listeners
            .for_each(|listener| listener.on_message_dropped(message, reason));
    }
}

#[async_trait]
impl MessageRouter for FeedReceiver {
    type Message = FeedMessage;
    type RouteKey = FeedRoute;

    async fn parse(&self, delivery: Delivery) -> feedbus::Result<Option<FeedMessage>> {
        self.receive(&delivery)
            .map_err(|e| BusError::ParseError(e.to_string()))
    }

    fn route_key(&self, _message: &FeedMessage) -> FeedRoute {
        FeedRoute::Processing
    }
}
