//! Common test utilities for FeedBus integration tests

#![allow(dead_code)]

use async_trait::async_trait;
use feedbus::{Delivery, MessageHandler, MessageRouter};
use parking_lot::Mutex;
use std::sync::Arc;
use std::time::{Duration, Instant};

/// Macro for verbose test output (controlled by TEST_VERBOSE env var)
#[macro_export]
macro_rules! verbose_println {
    ($($arg:tt)*) => {
        if std::env::var("TEST_VERBOSE").is_ok() {
            println!($($arg)*);
        }
    };
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum TextRoute {
    Upper,
    Lower,
}

/// Parses UTF-8 bodies; bodies starting with `drop` are filtered,
/// invalid UTF-8 is a parse error
pub struct TextRouter;

#[async_trait]
impl MessageRouter for TextRouter {
    type Message = String;
    type RouteKey = TextRoute;

    async fn parse(&self, delivery: Delivery) -> feedbus::Result<Option<String>> {
        let text = String::from_utf8(delivery.body)
            .map_err(|e| feedbus::BusError::ParseError(e.to_string()))?;
        if text.starts_with("drop") {
            return Ok(None);
        }
        Ok(Some(text))
    }

    fn route_key(&self, message: &String) -> TextRoute {
        if message.chars().next().is_some_and(|c| c.is_uppercase()) {
            TextRoute::Upper
        } else {
            TextRoute::Lower
        }
    }
}

/// Handler that records every message it sees
pub struct RecordingHandler {
    seen: Arc<Mutex<Vec<String>>>,
}

impl RecordingHandler {
    pub fn new(seen: Arc<Mutex<Vec<String>>>) -> Self {
        Self { seen }
    }
}

impl MessageHandler<String> for RecordingHandler {
    fn handle(&mut self, message: String) -> feedbus::Result<()> {
        self.seen.lock().push(message);
        Ok(())
    }
}

/// Poll `condition` until it holds or `timeout` elapses
pub async fn wait_until(timeout: Duration, condition: impl Fn() -> bool) -> bool {
    let deadline = Instant::now() + timeout;
    while Instant::now() < deadline {
        if condition() {
            return true;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    condition()
}
