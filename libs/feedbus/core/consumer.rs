use crate::core::config::ConsumerConfig;
use crate::core::connection_state::{AtomicConnectionState, AtomicMetrics, ConnectionState};
use crate::traits::*;
use crossbeam_channel::{unbounded, Receiver, Sender};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Notify;
use tracing::{debug, error, info, warn};

/// Events emitted by the consumer task
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConsumerEvent {
    /// Queue subscribed
    Connected,
    /// Subscription ended
    Disconnected,
    /// Resubscribing (attempt number)
    Reconnecting(usize),
    /// Error occurred
    Error(String),
}

/// Consumer metrics snapshot
#[derive(Debug, Clone)]
pub struct Metrics {
    pub deliveries_received: u64,
    pub messages_routed: u64,
    pub messages_filtered: u64,
    pub parse_errors: u64,
    pub resubscribe_count: u64,
    pub connection_state: ConnectionState,
}

/// Queue consumer with message routing
///
/// - One tokio task reads the subscription and parses deliveries in order
/// - Parsed messages go over unbounded crossbeam channels to handler threads
/// - A dropped subscription is retried according to the reconnection strategy
///
/// # Type Parameters
/// - `R`: MessageRouter implementation
/// - `M`: Message type (determined by router)
pub struct FeedConsumer<R, M>
where
    R: MessageRouter<Message = M>,
    M: Send + std::fmt::Debug + 'static,
{
    config: Arc<ConsumerConfig<R, M>>,
    state: Arc<AtomicConnectionState>,
    metrics: Arc<AtomicMetrics>,
    event_rx: Receiver<ConsumerEvent>,
    stop: Arc<Notify>,
    task_handle: Option<tokio::task::JoinHandle<()>>,
    pub(crate) handler_handles: Vec<std::thread::JoinHandle<()>>,
    shutdown_flag: Arc<AtomicBool>,
}

impl<R, M> FeedConsumer<R, M>
where
    R: MessageRouter<Message = M>,
    M: Send + std::fmt::Debug + 'static,
{
    /// Start consuming
    ///
    /// Called by the builder's `build()` method.
    pub(crate) fn start(config: ConsumerConfig<R, M>) -> Self {
        let config = Arc::new(config);
        let state = Arc::new(AtomicConnectionState::new(ConnectionState::Disconnected));
        let metrics = Arc::new(AtomicMetrics::new());
        let stop = Arc::new(Notify::new());
        let shutdown_flag = Arc::clone(&config.shutdown_flag);

        let (event_tx, event_rx) = unbounded();

        let task_handle = {
            let config = Arc::clone(&config);
            let state = Arc::clone(&state);
            let metrics = Arc::clone(&metrics);
            let stop = Arc::clone(&stop);

            tokio::spawn(async move {
                run_consumer(config, state, metrics, stop, event_tx).await;
            })
        };

        Self {
            config,
            state,
            metrics,
            event_rx,
            stop,
            task_handle: Some(task_handle),
            handler_handles: Vec::new(),
            shutdown_flag,
        }
    }

    pub fn queue(&self) -> &str {
        self.config.queue()
    }

    #[inline]
    pub fn connection_state(&self) -> ConnectionState {
        self.state.get()
    }

    #[inline]
    pub fn is_connected(&self) -> bool {
        self.state.is_connected()
    }

    pub fn metrics(&self) -> Metrics {
        Metrics {
            deliveries_received: self.metrics.deliveries_received(),
            messages_routed: self.metrics.messages_routed(),
            messages_filtered: self.metrics.messages_filtered(),
            parse_errors: self.metrics.parse_errors(),
            resubscribe_count: self.metrics.resubscribe_count(),
            connection_state: self.state.get(),
        }
    }

    /// Try to receive an event (non-blocking)
    pub fn try_recv_event(&self) -> Option<ConsumerEvent> {
        self.event_rx.try_recv().ok()
    }

    /// Clone of the event receiver, for watchers running on other tasks
    pub fn events(&self) -> Receiver<ConsumerEvent> {
        self.event_rx.clone()
    }

    /// Running flag; storing `false` stops the consumer without resubscribing
    pub fn shutdown_flag(&self) -> &Arc<AtomicBool> {
        &self.shutdown_flag
    }

    /// Stop consuming, unsubscribe the queue and wait for handlers to drain
    ///
    /// A message already handed to a handler finishes processing; nothing
    /// new is routed once this is called.
    pub async fn shutdown(mut self) -> Result<()> {
        info!(queue = %self.config.queue(), "Shutting down feed consumer");

        self.shutdown_flag.store(false, Ordering::Release);
        self.state.set(ConnectionState::ShuttingDown);
        self.stop.notify_one();

        if let Some(handle) = self.task_handle.take() {
            let _ = handle.await;
        }

        if let Err(e) = self.config.broker.unsubscribe(self.config.queue()).await {
            warn!(queue = %self.config.queue(), error = %e, "Unsubscribe failed during shutdown");
        }

        // Last config reference closes the handler channels
        drop(self.config);

        let handles = std::mem::take(&mut self.handler_handles);
        debug!("Waiting for {} handler threads to complete", handles.len());
        let joined = tokio::task::spawn_blocking(move || {
            for handle in handles {
                let _ = handle.join();
            }
        })
        .await;
        if joined.is_err() {
            warn!("Handler join task panicked");
        }

        self.state.set(ConnectionState::Disconnected);
        info!("All handlers shut down successfully");
        Ok(())
    }
}

/// Main consumer task loop
async fn run_consumer<R, M>(
    config: Arc<ConsumerConfig<R, M>>,
    state: Arc<AtomicConnectionState>,
    metrics: Arc<AtomicMetrics>,
    stop: Arc<Notify>,
    event_tx: Sender<ConsumerEvent>,
) where
    R: MessageRouter<Message = M>,
    M: Send + std::fmt::Debug + 'static,
{
    let mut attempt = 0;
    let shutdown_flag = &config.shutdown_flag;

    loop {
        if !shutdown_flag.load(Ordering::Acquire) || state.is_shutting_down() {
            debug!("Consumer stopping, exiting main loop");
            break;
        }

        state.set(if attempt == 0 {
            ConnectionState::Connecting
        } else {
            ConnectionState::Reconnecting
        });
        if attempt > 0 {
            let _ = event_tx.send(ConsumerEvent::Reconnecting(attempt));
        }

        match config.broker.subscribe(&config.binding).await {
            Ok(mut subscription) => {
                info!(
                    queue = %config.binding.queue,
                    bindings = config.binding.routing_keys.len(),
                    "Queue subscribed"
                );
                state.set(ConnectionState::Connected);
                let _ = event_tx.send(ConsumerEvent::Connected);
                attempt = 0;

                if let Err(e) = consume(&mut subscription, &config, &metrics, &stop).await {
                    error!(queue = %config.binding.queue, error = %e, "Subscription error");
                    let _ = event_tx.send(ConsumerEvent::Error(e.to_string()));
                }

                if !state.is_shutting_down() {
                    state.set(ConnectionState::Disconnected);
                }
                let _ = event_tx.send(ConsumerEvent::Disconnected);
            }
            Err(e) => {
                error!(queue = %config.binding.queue, error = %e, "Failed to subscribe");
                let _ = event_tx.send(ConsumerEvent::Error(e.to_string()));
                state.set(ConnectionState::Disconnected);
            }
        }

        if !shutdown_flag.load(Ordering::Acquire) || state.is_shutting_down() {
            break;
        }

        match config.reconnect_strategy.next_delay(attempt) {
            Some(delay) => {
                info!("Resubscribing in {:?} (attempt {})", delay, attempt + 1);
                if !interruptible_sleep(delay, shutdown_flag).await {
                    debug!("Shutdown flag set during resubscribe delay");
                    return;
                }
                attempt += 1;
                metrics.increment_resubscribes();
            }
            None => {
                warn!(queue = %config.binding.queue, "Reconnection strategy exhausted, stopping");
                let _ = event_tx.send(ConsumerEvent::Error(
                    BusError::ResubscribeFailed {
                        attempts: attempt,
                        reason: "strategy exhausted".to_string(),
                    }
                    .to_string(),
                ));
                break;
            }
        }
    }

    info!("Consumer task exiting");
}

/// Drain one subscription until it closes or the consumer stops
async fn consume<R, M>(
    subscription: &mut Subscription,
    config: &ConsumerConfig<R, M>,
    metrics: &AtomicMetrics,
    stop: &Notify,
) -> Result<()>
where
    R: MessageRouter<Message = M>,
    M: Send + std::fmt::Debug + 'static,
{
    let shutdown_flag = &config.shutdown_flag;

    loop {
        if !shutdown_flag.load(Ordering::Acquire) {
            debug!("Shutdown flag detected in consume loop");
            return Ok(());
        }

        let delivery = tokio::select! {
            _ = stop.notified() => return Ok(()),
            delivery = subscription.next() => delivery,
        };

        let Some(delivery) = delivery else {
            warn!(queue = %subscription.queue(), "Subscription stream closed");
            return Err(BusError::SubscriptionClosed("stream ended".into()));
        };

        metrics.increment_received();

        if !shutdown_flag.load(Ordering::Acquire) {
            debug!("Shutdown detected, discarding delivery");
            return Ok(());
        }

        // Parsed inline so routing preserves the queue's delivery order
        match config.router.parse(delivery).await {
            Ok(Some(message)) => {
                let route_key = config.router.route_key(&message);
                match config.route_senders.get(&route_key) {
                    Some(sender) => {
                        // Send only fails once handler threads exited during shutdown
                        if sender.send(message).is_ok() {
                            metrics.increment_routed();
                        }
                    }
                    None => {
                        warn!("No handler configured for route key: {:?}", route_key);
                    }
                }
            }
            Ok(None) => metrics.increment_filtered(),
            Err(e) => {
                metrics.increment_parse_errors();
                error!("Parse error: {}", e);
            }
        }
    }
}

/// Sleep in short slices; returns false if the running flag was cleared
async fn interruptible_sleep(duration: Duration, running: &AtomicBool) -> bool {
    let check_interval = Duration::from_millis(100);
    let mut elapsed = Duration::ZERO;

    while elapsed < duration {
        if !running.load(Ordering::Acquire) {
            return false;
        }
        let slice = std::cmp::min(check_interval, duration - elapsed);
        tokio::time::sleep(slice).await;
        elapsed += slice;
    }
    running.load(Ordering::Acquire)
}
