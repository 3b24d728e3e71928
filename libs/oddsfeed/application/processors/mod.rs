//! Message processor chain
//!
//! Forwarded messages pass through every processor in registration order.
//! Processors must tolerate re-delivery of the same message.

pub mod cache;
pub mod dispatch;

pub use cache::CacheMessageProcessor;
pub use dispatch::{DispatchProcessor, SessionListener};

use crate::domain::FeedMessage;
use feedbus::MessageHandler;
use std::sync::Arc;
use tracing::trace;

pub trait FeedMessageProcessor: Send + Sync {
    fn name(&self) -> &'static str;

    fn process(&self, message: &FeedMessage);
}

#[derive(Default)]
pub struct ProcessorChain {
    processors: Vec<Box<dyn FeedMessageProcessor>>,
}

impl ProcessorChain {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, processor: impl FeedMessageProcessor + 'static) -> Self {
        self.processors.push(Box::new(processor));
        self
    }

    pub fn len(&self) -> usize {
        self.processors.len()
    }

    pub fn is_empty(&self) -> bool {
        self.processors.is_empty()
    }

    pub fn names(&self) -> Vec<&'static str> {
        self.processors.iter().map(|p| p.name()).collect()
    }

    pub fn process(&self, message: &FeedMessage) {
        for processor in &self.processors {
            trace!(processor = processor.name(), kind = message.kind_name(), "Processing message");
            processor.process(message);
        }
    }
}

/// Runs the chain on the consumer's handler thread
pub struct ChainHandler {
    chain: Arc<ProcessorChain>,
}

impl ChainHandler {
    pub fn new(chain: Arc<ProcessorChain>) -> Self {
        Self { chain }
    }
}

impl MessageHandler<FeedMessage> for ChainHandler {
    fn handle(&mut self, message: FeedMessage) -> feedbus::Result<()> {
        self.chain.process(&message);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{Alive, MessageKind};
    use parking_lot::Mutex;

    struct Tag {
        name: &'static str,
        log: Arc<Mutex<Vec<&'static str>>>,
    }

    impl FeedMessageProcessor for Tag {
        fn name(&self) -> &'static str {
            self.name
        }

        fn process(&self, _message: &FeedMessage) {
            self.log.lock().push(self.name);
        }
    }

    #[test]
    fn test_chain_runs_in_order() {
        let log = Arc::new(Mutex::new(Vec::new()));
        let chain = ProcessorChain::new()
            .with(Tag { name: "first", log: Arc::clone(&log) })
            .with(Tag { name: "second", log: Arc::clone(&log) });
        assert_eq!(chain.names(), vec!["first", "second"]);

        let mut handler = ChainHandler::new(Arc::new(chain));
        let message = FeedMessage::new(1, None, 0, MessageKind::Alive(Alive { subscribed: true }));
        handler.handle(message.clone()).unwrap();
        handler.handle(message).unwrap();

        assert_eq!(*log.lock(), vec!["first", "second", "first", "second"]);
    }
}
