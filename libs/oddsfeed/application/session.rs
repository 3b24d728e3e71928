//! Feed sessions
//!
//! A session is one queue bound for a message interest, consumed by a
//! `FeedConsumer` whose router is the `FeedReceiver` and whose single
//! handler runs the processor chain.

use super::processors::{ChainHandler, ProcessorChain};
use super::receiver::{FeedReceiver, FeedRoute};
use super::registry::ProducerRegistry;
use super::routing::MessageInterest;
use crate::domain::FeedMessage;
use feedbus::{
    ConsumerEvent, ExponentialBackoff, FeedConsumer, MessageBroker, Metrics, QueueBinding,
};
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

pub struct FeedSession {
    interest: MessageInterest,
    consumer: FeedConsumer<FeedReceiver, FeedMessage>,
    watcher: JoinHandle<()>,
}

impl FeedSession {
    /// Bind `queue` for `interest` and start consuming
    pub async fn open(
        broker: Arc<dyn MessageBroker>,
        queue: impl Into<String>,
        interest: MessageInterest,
        node_id: Option<i32>,
        receiver: FeedReceiver,
        chain: Arc<ProcessorChain>,
    ) -> feedbus::Result<Self> {
        let queue = queue.into();
        let routing_keys = interest.routing_keys(node_id);
        info!(
            queue = %queue,
            interest = interest.name(),
            bindings = routing_keys.len(),
            "Opening feed session"
        );

        let registry = Arc::clone(receiver.registry());
        let consumer = feedbus::core::builder(broker)
            .binding(QueueBinding::new(queue, routing_keys))
            .router(receiver, |routing| {
                routing.handler(FeedRoute::Processing, ChainHandler::new(chain))
            })
            .reconnect_strategy(ExponentialBackoff::new(
                Duration::from_secs(1),
                Duration::from_secs(60),
                None,
            ))
            .build()
            .await?;

        let watcher = spawn_connection_watcher(&consumer, registry);

        Ok(Self {
            interest,
            consumer,
            watcher,
        })
    }

    pub fn interest(&self) -> &MessageInterest {
        &self.interest
    }

    pub fn queue(&self) -> &str {
        self.consumer.queue()
    }

    pub fn is_connected(&self) -> bool {
        self.consumer.is_connected()
    }

    pub fn metrics(&self) -> Metrics {
        self.consumer.metrics()
    }

    /// Unsubscribe and stop dispatching
    ///
    /// A message already handed to the processor chain still completes.
    pub async fn close(self) -> feedbus::Result<()> {
        info!(queue = %self.consumer.queue(), "Closing feed session");
        self.consumer.shutdown().await?;
        if self.watcher.await.is_err() {
            warn!("Connection watcher panicked");
        }
        Ok(())
    }
}

/// Every producer goes down when the subscription drops
fn spawn_connection_watcher(
    consumer: &FeedConsumer<FeedReceiver, FeedMessage>,
    registry: Arc<ProducerRegistry>,
) -> JoinHandle<()> {
    let events = consumer.events();
    tokio::task::spawn_blocking(move || {
        for event in events.iter() {
            match event {
                ConsumerEvent::Connected => debug!("Feed subscription established"),
                ConsumerEvent::Disconnected => {
                    let down = registry.mark_all_down("feed connection lost");
                    if !down.is_empty() {
                        warn!(producers = ?down, "Producers marked down after disconnect");
                    }
                }
                ConsumerEvent::Reconnecting(attempt) => {
                    debug!(attempt, "Resubscribing feed queue")
                }
                ConsumerEvent::Error(e) => warn!(error = %e, "Feed consumer error"),
            }
        }
    })
}
