//! Keeps the entity cache in line with the feed

use super::FeedMessageProcessor;
use crate::application::orchestrator::FetchOrchestrator;
use crate::application::registry::ProducerRegistry;
use crate::domain::{FeedMessage, MessageKind};
use crate::infrastructure::cache::CacheStore;
use crate::infrastructure::concurrency::KeyLockManager;
use std::sync::Arc;
use tokio::runtime::Handle;
use tracing::debug;

/// Applies feed-owned state to cached entities
///
/// - `odds_change` with a status replaces the event status
/// - `bet_stop` and `bet_settlement` drop the event status only
/// - `fixture_change` evicts the whole entity; tournaments get their
///   schedule prefetched in the background
///
/// Every mutation holds the entity's key lock.
pub struct CacheMessageProcessor {
    store: Arc<CacheStore>,
    key_locks: Arc<KeyLockManager>,
    registry: Arc<ProducerRegistry>,
    orchestrator: Arc<FetchOrchestrator>,
    runtime: Handle,
}

impl CacheMessageProcessor {
    pub fn new(
        store: Arc<CacheStore>,
        key_locks: Arc<KeyLockManager>,
        registry: Arc<ProducerRegistry>,
        orchestrator: Arc<FetchOrchestrator>,
        runtime: Handle,
    ) -> Self {
        Self {
            store,
            key_locks,
            registry,
            orchestrator,
            runtime,
        }
    }
}

impl FeedMessageProcessor for CacheMessageProcessor {
    fn name(&self) -> &'static str {
        "cache"
    }

    fn process(&self, message: &FeedMessage) {
        let Some(event_id) = &message.event_id else {
            return;
        };
        if message.is_event_related() {
            self.registry.record_event(message.product, event_id);
        }

        let key = event_id.to_string();
        match &message.kind {
            MessageKind::OddsChange(odds) => {
                if let Some(status) = &odds.status {
                    let _lock = self.key_locks.lock_blocking(&key);
                    self.store.set_status(event_id, status.clone());
                }
            }
            MessageKind::BetStop(_) | MessageKind::BetSettlement(_) => {
                let _lock = self.key_locks.lock_blocking(&key);
                if self.store.clear_status(event_id) {
                    debug!(id = %event_id, kind = message.kind_name(), "Event status cleared");
                }
            }
            MessageKind::FixtureChange(_) => {
                {
                    let _lock = self.key_locks.lock_blocking(&key);
                    self.store.remove(event_id);
                }
                if event_id.is_tournament() {
                    self.orchestrator
                        .prefetch_schedule(&self.runtime, event_id.clone());
                }
            }
            _ => {}
        }
    }
}
