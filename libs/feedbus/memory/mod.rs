//! In-memory topic broker
//!
//! Queues bind routing-key patterns exactly like an AMQP topic exchange:
//! keys are dot-separated, `*` matches one segment and `#` matches zero or
//! more segments. Used for replaying recorded feeds and for tests.

use crate::traits::{BusError, Delivery, MessageBroker, QueueBinding, Result, Subscription};
use async_trait::async_trait;
use parking_lot::RwLock;
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use tokio::sync::mpsc::{unbounded_channel, UnboundedSender};
use tracing::{debug, info};

/// Compiled routing-key binding pattern
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TopicPattern {
    raw: String,
    segments: Vec<Segment>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum Segment {
    Literal(String),
    AnyOne,
    AnyMany,
}

impl TopicPattern {
    pub fn parse(pattern: &str) -> Result<Self> {
        if pattern.is_empty() {
            return Err(BusError::InvalidPattern {
                pattern: pattern.to_string(),
                reason: "pattern is empty".to_string(),
            });
        }

        let mut segments = Vec::new();
        for part in pattern.split('.') {
            let segment = match part {
                "*" => Segment::AnyOne,
                "#" => Segment::AnyMany,
                "" => {
                    return Err(BusError::InvalidPattern {
                        pattern: pattern.to_string(),
                        reason: "empty segment".to_string(),
                    })
                }
                literal => Segment::Literal(literal.to_string()),
            };
            segments.push(segment);
        }

        Ok(Self {
            raw: pattern.to_string(),
            segments,
        })
    }

    pub fn as_str(&self) -> &str {
        &self.raw
    }

    pub fn matches(&self, routing_key: &str) -> bool {
        let words: Vec<&str> = routing_key.split('.').collect();
        match_segments(&self.segments, &words)
    }
}

fn match_segments(pattern: &[Segment], words: &[&str]) -> bool {
    match pattern.split_first() {
        None => words.is_empty(),
        Some((Segment::AnyMany, rest)) => {
            (0..=words.len()).any(|skip| match_segments(rest, &words[skip..]))
        }
        Some((Segment::AnyOne, rest)) => !words.is_empty() && match_segments(rest, &words[1..]),
        Some((Segment::Literal(literal), rest)) => {
            words.first().is_some_and(|word| word == literal) && match_segments(rest, &words[1..])
        }
    }
}

struct BoundQueue {
    patterns: Vec<TopicPattern>,
    sender: UnboundedSender<Delivery>,
}

/// Topic broker living in process memory
pub struct InMemoryBroker {
    queues: RwLock<HashMap<String, BoundQueue>>,
    next_tag: AtomicU64,
}

impl InMemoryBroker {
    pub fn new() -> Self {
        Self {
            queues: RwLock::new(HashMap::new()),
            next_tag: AtomicU64::new(1),
        }
    }

    /// Publish a delivery to every queue with a matching binding
    ///
    /// Returns the number of queues the delivery was handed to.
    pub fn publish(&self, mut delivery: Delivery) -> usize {
        delivery.delivery_tag = self.next_tag.fetch_add(1, Ordering::Relaxed);

        let queues = self.queues.read();
        let mut delivered = 0;
        for (name, queue) in queues.iter() {
            if !queue.patterns.iter().any(|p| p.matches(&delivery.routing_key)) {
                continue;
            }
            if queue.sender.send(delivery.clone()).is_ok() {
                delivered += 1;
            } else {
                debug!(queue = %name, "Queue consumer gone, delivery skipped");
            }
        }

        if delivered == 0 {
            debug!(routing_key = %delivery.routing_key, "No queue bound for routing key");
        }
        delivered
    }

    /// Drop every subscription, as a lost broker connection would
    pub fn disconnect_all(&self) {
        let mut queues = self.queues.write();
        info!(queues = queues.len(), "Disconnecting all in-memory queues");
        queues.clear();
    }

    pub fn queue_count(&self) -> usize {
        self.queues.read().len()
    }

    pub fn has_queue(&self, queue: &str) -> bool {
        self.queues.read().contains_key(queue)
    }
}

impl Default for InMemoryBroker {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl MessageBroker for InMemoryBroker {
    async fn subscribe(&self, binding: &QueueBinding) -> Result<Subscription> {
        if binding.routing_keys.is_empty() {
            return Err(BusError::Configuration(format!(
                "queue '{}' has no routing keys",
                binding.queue
            )));
        }

        let patterns = binding
            .routing_keys
            .iter()
            .map(|key| TopicPattern::parse(key))
            .collect::<Result<Vec<_>>>()?;

        let (sender, receiver) = unbounded_channel();
        let replaced = self
            .queues
            .write()
            .insert(binding.queue.clone(), BoundQueue { patterns, sender })
            .is_some();

        debug!(
            queue = %binding.queue,
            bindings = binding.routing_keys.len(),
            replaced,
            "Queue subscribed"
        );
        Ok(Subscription::new(binding.queue.clone(), receiver))
    }

    async fn unsubscribe(&self, queue: &str) -> Result<()> {
        if self.queues.write().remove(queue).is_some() {
            debug!(queue = %queue, "Queue unsubscribed");
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_star_matches_exactly_one_segment() {
        let pattern = TopicPattern::parse("*.*.live.*").unwrap();
        assert!(pattern.matches("hi.-.live.odds_change"));
        assert!(!pattern.matches("hi.-.pre.odds_change"));
        assert!(!pattern.matches("hi.-.live"));
        assert!(!pattern.matches("hi.-.live.odds_change.1"));
    }

    #[test]
    fn test_hash_matches_zero_or_more_segments() {
        let pattern = TopicPattern::parse("-.-.-.alive.#").unwrap();
        assert!(pattern.matches("-.-.-.alive"));
        assert!(pattern.matches("-.-.-.alive.-.-.-.-"));
        assert!(!pattern.matches("-.-.-.snapshot_complete.-.-.-.-"));

        let middle = TopicPattern::parse("#.sr:match.42.-").unwrap();
        assert!(middle.matches("hi.-.live.odds_change.1.sr:match.42.-"));
        assert!(!middle.matches("hi.-.live.odds_change.1.sr:match.43.-"));
    }

    #[test]
    fn test_invalid_patterns_rejected() {
        assert!(TopicPattern::parse("").is_err());
        assert!(TopicPattern::parse("a..b").is_err());
    }

    #[tokio::test]
    async fn test_publish_only_reaches_matching_queues() {
        let broker = InMemoryBroker::new();
        let mut live = broker
            .subscribe(&QueueBinding::new("live", vec!["*.*.live.#".to_string()]))
            .await
            .unwrap();
        let mut pre = broker
            .subscribe(&QueueBinding::new("pre", vec!["*.pre.#".to_string()]))
            .await
            .unwrap();

        let delivered = broker.publish(Delivery::new("hi.-.live.odds_change", b"x".to_vec()));
        assert_eq!(delivered, 1);

        let got = live.next().await.unwrap();
        assert_eq!(got.routing_key, "hi.-.live.odds_change");
        assert!(got.delivery_tag > 0);

        broker.disconnect_all();
        assert!(pre.next().await.is_none());
    }
}
