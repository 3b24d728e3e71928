pub mod states;

use crate::core::consumer::FeedConsumer;
use crate::core::config::ConsumerConfig;
use crate::traits::*;
use states::*;
use std::collections::HashMap;
use std::marker::PhantomData;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

/// Type-state builder for FeedConsumer
///
/// Uses the type system to enforce that the queue binding and the router
/// are set before the consumer can be built. Handlers are added per route
/// key the router produces.
pub struct ConsumerBuilder<B, Ro, R>
where
    B: BindingState,
    Ro: RouterState,
{
    _state: TypeState<B, Ro>,
    _router_type: PhantomData<R>,
    broker: Arc<dyn MessageBroker>,
    binding: Option<QueueBinding>,
    router: Option<R>,
    // RoutingBuilder<R> boxed as Any; R is unknown until `router()` is called
    routing: Option<Box<dyn std::any::Any + Send>>,
    reconnect_strategy: Option<Box<dyn ReconnectionStrategy>>,
    shutdown_flag: Option<Arc<AtomicBool>>,
}

impl ConsumerBuilder<NoBinding, NoRouter, ()> {
    pub fn new(broker: Arc<dyn MessageBroker>) -> Self {
        Self {
            _state: TypeState::new(),
            _router_type: PhantomData,
            broker,
            binding: None,
            router: None,
            routing: None,
            reconnect_strategy: None,
            shutdown_flag: None,
        }
    }
}

// Binding setting
impl<Ro, R> ConsumerBuilder<NoBinding, Ro, R>
where
    Ro: RouterState,
{
    pub fn binding(self, binding: QueueBinding) -> ConsumerBuilder<HasBinding, Ro, R> {
        ConsumerBuilder {
            _state: TypeState::new(),
            _router_type: PhantomData,
            broker: self.broker,
            binding: Some(binding),
            router: self.router,
            routing: self.routing,
            reconnect_strategy: self.reconnect_strategy,
            shutdown_flag: self.shutdown_flag,
        }
    }
}

type HandlerSlot<M> = (
    crossbeam_channel::Sender<M>,
    crossbeam_channel::Receiver<M>,
    Box<dyn MessageHandler<M>>,
);

/// Routing builder helper
///
/// Collects one handler per route key.
pub struct RoutingBuilder<R>
where
    R: MessageRouter,
{
    handlers: HashMap<R::RouteKey, HandlerSlot<R::Message>>,
}

impl<R> RoutingBuilder<R>
where
    R: MessageRouter,
{
    fn new() -> Self {
        Self {
            handlers: HashMap::new(),
        }
    }

    /// Add a handler for a specific route key
    pub fn handler<H>(mut self, route_key: R::RouteKey, handler: H) -> Self
    where
        H: MessageHandler<R::Message>,
    {
        let (sender, receiver) = crossbeam_channel::unbounded();
        self.handlers
            .insert(route_key, (sender, receiver, Box::new(handler)));
        self
    }

    /// Spawn one OS thread per handler
    fn spawn(
        self,
        shutdown_flag: Arc<AtomicBool>,
    ) -> (
        HashMap<R::RouteKey, crossbeam_channel::Sender<R::Message>>,
        Vec<std::thread::JoinHandle<()>>,
    ) {
        let mut senders = HashMap::new();
        let mut handles = Vec::new();

        for (route_key, (sender, receiver, handler)) in self.handlers {
            senders.insert(route_key.clone(), sender);
            let shutdown_flag = Arc::clone(&shutdown_flag);

            let handle = std::thread::spawn(move || {
                let mut handler = handler;

                loop {
                    match receiver.recv_timeout(Duration::from_millis(50)) {
                        Ok(message) => {
                            if let Err(e) = handler.handle(message) {
                                tracing::error!("Handler error for route {:?}: {}", route_key, e);
                            }
                        }
                        Err(crossbeam_channel::RecvTimeoutError::Timeout) => {
                            if !shutdown_flag.load(Ordering::Acquire) {
                                tracing::debug!(
                                    "Shutdown flag detected, handler thread for route {:?} exiting",
                                    route_key
                                );
                                break;
                            }
                        }
                        Err(crossbeam_channel::RecvTimeoutError::Disconnected) => {
                            tracing::debug!(
                                "Handler channel closed for route {:?}, thread exiting",
                                route_key
                            );
                            break;
                        }
                    }
                }
            });

            handles.push(handle);
        }

        (senders, handles)
    }
}

// Router setting
impl<B> ConsumerBuilder<B, NoRouter, ()>
where
    B: BindingState,
{
    pub fn router<NewR, F>(
        self,
        router: NewR,
        configure_routing: F,
    ) -> ConsumerBuilder<B, HasRouter, NewR>
    where
        NewR: MessageRouter,
        F: FnOnce(RoutingBuilder<NewR>) -> RoutingBuilder<NewR>,
    {
        let routing = configure_routing(RoutingBuilder::<NewR>::new());

        ConsumerBuilder {
            _state: TypeState::new(),
            _router_type: PhantomData,
            broker: self.broker,
            binding: self.binding,
            router: Some(router),
            routing: Some(Box::new(routing)),
            reconnect_strategy: self.reconnect_strategy,
            shutdown_flag: self.shutdown_flag,
        }
    }
}

// Optional configuration methods
impl<B, R> ConsumerBuilder<B, HasRouter, R>
where
    B: BindingState,
    R: MessageRouter,
{
    pub fn reconnect_strategy(mut self, strategy: impl ReconnectionStrategy + 'static) -> Self {
        self.reconnect_strategy = Some(Box::new(strategy));
        self
    }

    /// Share a running flag with other components
    ///
    /// When the flag is set to `false`, the consumer stops and does not
    /// resubscribe.
    pub fn shutdown_flag(mut self, flag: Arc<AtomicBool>) -> Self {
        self.shutdown_flag = Some(flag);
        self
    }
}

// Build method - only available when all required fields are set
impl<R> ConsumerBuilder<HasBinding, HasRouter, R>
where
    R: MessageRouter,
{
    pub async fn build(self) -> Result<FeedConsumer<R, R::Message>> {
        let binding = self
            .binding
            .ok_or_else(|| BusError::Configuration("queue binding must be set".into()))?;
        let router = self
            .router
            .ok_or_else(|| BusError::Configuration("router must be set".into()))?;

        if binding.routing_keys.is_empty() {
            return Err(BusError::Configuration(format!(
                "queue '{}' has no routing keys",
                binding.queue
            )));
        }

        let shutdown_flag = self
            .shutdown_flag
            .unwrap_or_else(|| Arc::new(AtomicBool::new(true)));

        let reconnect_strategy = self.reconnect_strategy.unwrap_or_else(|| {
            Box::new(ExponentialBackoff::new(
                Duration::from_secs(1),
                Duration::from_secs(60),
                Some(10),
            ))
        });

        let routing = match self.routing {
            Some(any) => *any.downcast::<RoutingBuilder<R>>().map_err(|_| {
                BusError::Configuration("routing builder type mismatch".into())
            })?,
            None => RoutingBuilder::new(),
        };
        let (route_senders, handler_handles) = routing.spawn(Arc::clone(&shutdown_flag));

        let config = ConsumerConfig {
            broker: self.broker,
            binding,
            router: Arc::new(router),
            route_senders,
            reconnect_strategy,
            shutdown_flag,
        };

        let mut consumer = FeedConsumer::start(config);
        consumer.handler_handles = handler_handles;

        Ok(consumer)
    }
}
