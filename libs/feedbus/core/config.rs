use crate::traits::*;
use std::collections::HashMap;
use std::sync::atomic::AtomicBool;
use std::sync::Arc;

/// Configuration for a FeedConsumer
///
/// Built by `ConsumerBuilder`; shared between the consumer handle and its
/// background task. Dropping the last reference closes the handler channels.
pub struct ConsumerConfig<R, M>
where
    R: MessageRouter<Message = M>,
    M: Send + std::fmt::Debug + 'static,
{
    /// Broker the queue is consumed from
    pub(crate) broker: Arc<dyn MessageBroker>,

    /// Queue name and routing-key patterns
    pub(crate) binding: QueueBinding,

    /// Router for parsing and routing deliveries
    pub(crate) router: Arc<R>,

    /// Channel senders mapped by route key
    pub(crate) route_senders: HashMap<R::RouteKey, crossbeam_channel::Sender<M>>,

    /// Resubscription strategy after the broker drops the subscription
    pub(crate) reconnect_strategy: Box<dyn ReconnectionStrategy>,

    /// Running flag - when false, the consumer stops and never resubscribes
    pub(crate) shutdown_flag: Arc<AtomicBool>,
}

impl<R, M> ConsumerConfig<R, M>
where
    R: MessageRouter<Message = M>,
    M: Send + std::fmt::Debug + 'static,
{
    pub fn queue(&self) -> &str {
        &self.binding.queue
    }

    pub fn routing_keys(&self) -> &[String] {
        &self.binding.routing_keys
    }

    /// Get the number of configured handlers
    pub fn handler_count(&self) -> usize {
        self.route_senders.len()
    }
}
