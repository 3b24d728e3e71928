//! Producer registry
//!
//! Tracks availability and recovery bookkeeping per producer. Structural
//! changes (disable, enable, disconnect timestamp) can be frozen with
//! `lock()`; liveness transitions driven by the feed stay allowed.

use crate::domain::{Producer, ProducerSettings, Urn};
use dashmap::DashMap;
use parking_lot::RwLock;
use std::collections::{BTreeSet, HashMap};
use std::sync::atomic::{AtomicBool, Ordering};
use thiserror::Error;
use tracing::{debug, info, warn};

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum RegistryError {
    #[error("producer registry is locked: {operation} on producer {id} is not allowed")]
    Locked { operation: &'static str, id: u32 },

    #[error("unknown producer {0}")]
    UnknownProducer(u32),
}

pub type Result<T> = std::result::Result<T, RegistryError>;

pub struct ProducerRegistry {
    producers: RwLock<HashMap<u32, Producer>>,
    /// Event ids seen on the feed, with the producers that mentioned them
    recorded_events: DashMap<Urn, BTreeSet<u32>>,
    locked: AtomicBool,
    max_inactivity_ms: i64,
    unknown: Producer,
}

impl ProducerRegistry {
    pub fn new(settings: &[ProducerSettings], max_inactivity_seconds: u64) -> Self {
        let producers = settings
            .iter()
            .map(|s| (s.id, Producer::from_settings(s)))
            .collect::<HashMap<_, _>>();
        debug!(count = producers.len(), "Producer registry initialised");

        Self {
            producers: RwLock::new(producers),
            recorded_events: DashMap::new(),
            locked: AtomicBool::new(false),
            max_inactivity_ms: i64::try_from(max_inactivity_seconds.saturating_mul(1000))
                .unwrap_or(i64::MAX),
            unknown: Producer::unknown(),
        }
    }

    // ---- lookup ----

    /// Producer snapshot, or the unknown sentinel
    pub fn get(&self, id: u32) -> Producer {
        self.producers
            .read()
            .get(&id)
            .cloned()
            .unwrap_or_else(|| self.unknown.clone())
    }

    /// Case-insensitive lookup by name, or the unknown sentinel
    pub fn get_by_name(&self, name: &str) -> Producer {
        self.producers
            .read()
            .values()
            .find(|p| p.name.eq_ignore_ascii_case(name))
            .cloned()
            .unwrap_or_else(|| self.unknown.clone())
    }

    pub fn exists(&self, id: u32) -> bool {
        self.producers.read().contains_key(&id)
    }

    pub fn exists_name(&self, name: &str) -> bool {
        self.producers
            .read()
            .values()
            .any(|p| p.name.eq_ignore_ascii_case(name))
    }

    /// All producers ordered by id
    pub fn all(&self) -> Vec<Producer> {
        let mut producers: Vec<Producer> = self.producers.read().values().cloned().collect();
        producers.sort_by_key(|p| p.id);
        producers
    }

    pub fn is_active(&self, id: u32) -> bool {
        self.producers
            .read()
            .get(&id)
            .is_some_and(Producer::is_active)
    }

    // ---- structural changes ----

    /// Freeze structural changes
    pub fn lock(&self) {
        if !self.locked.swap(true, Ordering::AcqRel) {
            info!("Producer registry locked");
        }
    }

    pub fn is_locked(&self) -> bool {
        self.locked.load(Ordering::Acquire)
    }

    fn mutate(&self, operation: &'static str, id: u32, change: impl FnOnce(&mut Producer)) -> Result<()> {
        if self.is_locked() {
            return Err(RegistryError::Locked { operation, id });
        }
        let mut producers = self.producers.write();
        let producer = producers
            .get_mut(&id)
            .ok_or(RegistryError::UnknownProducer(id))?;
        change(producer);
        Ok(())
    }

    pub fn disable_producer(&self, id: u32) -> Result<()> {
        self.mutate("disable", id, |p| p.is_disabled = true)?;
        info!(producer = id, "Producer disabled");
        Ok(())
    }

    pub fn enable_producer(&self, id: u32) -> Result<()> {
        self.mutate("enable", id, |p| p.is_disabled = false)?;
        info!(producer = id, "Producer enabled");
        Ok(())
    }

    /// Set the timestamp recovery should resume from
    pub fn record_disconnect_timestamp(&self, id: u32, timestamp: i64) -> Result<()> {
        self.mutate("record_disconnect_timestamp", id, |p| {
            p.last_timestamp_before_disconnect = Some(timestamp)
        })
    }

    // ---- liveness ----

    /// Producer confirmed alive; returns true if it was down
    pub fn mark_up(&self, id: u32, at: i64) -> bool {
        let mut producers = self.producers.write();
        let Some(producer) = producers.get_mut(&id) else {
            return false;
        };
        producer.last_alive_at = Some(at);
        let was_down = producer.is_producer_down;
        if was_down {
            producer.is_producer_down = false;
            info!(producer = id, name = %producer.name, "Producer up");
        }
        was_down
    }

    /// Producer lost; remembers the last processed timestamp for recovery.
    /// Returns true if it was up.
    pub fn mark_down(&self, id: u32, reason: &str) -> bool {
        let mut producers = self.producers.write();
        let Some(producer) = producers.get_mut(&id) else {
            return false;
        };
        if producer.is_producer_down {
            return false;
        }
        producer.is_producer_down = true;
        if let Some(last) = producer.last_processed_message_at {
            producer.last_timestamp_before_disconnect = Some(last);
        }
        warn!(producer = id, name = %producer.name, reason, "Producer down");
        true
    }

    pub fn mark_all_down(&self, reason: &str) -> Vec<u32> {
        let ids: Vec<u32> = self.producers.read().keys().copied().collect();
        ids.into_iter().filter(|id| self.mark_down(*id, reason)).collect()
    }

    pub fn record_message(&self, id: u32, generated_at: i64) {
        if let Some(producer) = self.producers.write().get_mut(&id) {
            let newest = producer.last_processed_message_at.map_or(generated_at, |t| t.max(generated_at));
            producer.last_processed_message_at = Some(newest);
        }
    }

    /// Mark Up producers with no alive within the inactivity limit as Down
    pub fn check_inactivity(&self, now: i64) -> Vec<u32> {
        let stale: Vec<u32> = self
            .producers
            .read()
            .values()
            .filter(|p| !p.is_producer_down)
            .filter(|p| p.last_alive_at.map_or(true, |at| now - at > self.max_inactivity_ms))
            .map(|p| p.id)
            .collect();

        stale
            .into_iter()
            .filter(|id| self.mark_down(*id, "alive messages stopped"))
            .collect()
    }

    /// Timestamp to request recovery from, if still inside the producer's
    /// stateful recovery window; `None` means a full recovery
    pub fn recovery_since(&self, id: u32, now: i64) -> Option<i64> {
        let producer = self.producers.read().get(&id).cloned()?;
        let since = producer.last_timestamp_before_disconnect?;
        if now - since <= producer.recovery_window_millis() {
            Some(since)
        } else {
            debug!(producer = id, since, "Disconnect is outside the recovery window");
            None
        }
    }

    // ---- event bookkeeping ----

    pub fn record_event(&self, producer_id: u32, event_id: &Urn) {
        self.recorded_events
            .entry(event_id.clone())
            .or_default()
            .insert(producer_id);
    }

    /// True once any producer sent a message about this event
    pub fn is_event_recorded(&self, event_id: &Urn) -> bool {
        self.recorded_events.contains_key(event_id)
    }

    pub fn event_producers(&self, event_id: &Urn) -> Vec<u32> {
        self.recorded_events
            .get(event_id)
            .map(|ids| ids.iter().copied().collect())
            .unwrap_or_default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn registry() -> ProducerRegistry {
        ProducerRegistry::new(
            &[
                ProducerSettings::new(1, "LO", 60),
                ProducerSettings::new(3, "Ctrl", 60),
            ],
            20,
        )
    }

    #[test]
    fn test_unknown_id_returns_sentinel() {
        let registry = registry();
        assert!(registry.get(99).is_unknown());
        assert!(registry.get_by_name("nope").is_unknown());
        assert_eq!(registry.get_by_name("lo").id, 1);
        assert!(registry.exists(3));
        assert!(!registry.exists(99));
    }

    #[test]
    fn test_lock_blocks_structural_changes() {
        let registry = registry();
        registry.lock();

        assert_eq!(
            registry.disable_producer(1),
            Err(RegistryError::Locked { operation: "disable", id: 1 })
        );
        assert!(!registry.get(1).is_disabled);
        assert!(registry.record_disconnect_timestamp(1, 5).is_err());

        // liveness still tracked
        assert!(registry.mark_up(1, 1000));
        assert!(registry.is_active(1));
    }

    #[test]
    fn test_disable_and_enable() {
        let registry = registry();
        registry.mark_up(1, 0);
        registry.disable_producer(1).unwrap();
        assert!(!registry.is_active(1));
        registry.enable_producer(1).unwrap();
        assert!(registry.is_active(1));
        assert_eq!(registry.disable_producer(42), Err(RegistryError::UnknownProducer(42)));
    }

    #[test]
    fn test_state_machine() {
        let registry = registry();
        assert!(registry.get(1).is_producer_down);

        assert!(registry.mark_up(1, 1_000));
        assert!(!registry.mark_up(1, 2_000));
        registry.record_message(1, 2_500);

        assert!(registry.mark_down(1, "test"));
        let producer = registry.get(1);
        assert!(producer.is_producer_down);
        assert_eq!(producer.last_timestamp_before_disconnect, Some(2_500));

        assert!(registry.mark_up(1, 3_000));
    }

    #[test]
    fn test_check_inactivity() {
        let registry = registry();
        registry.mark_up(1, 0);
        registry.mark_up(3, 15_000);

        let down = registry.check_inactivity(25_000);
        assert_eq!(down, vec![1]);
        assert!(!registry.get(3).is_producer_down);
    }

    #[test]
    fn test_recovery_since_respects_window() {
        let registry = registry();
        registry.record_disconnect_timestamp(1, 1_000).unwrap();

        assert_eq!(registry.recovery_since(1, 1_000 + 59 * 60_000), Some(1_000));
        assert_eq!(registry.recovery_since(1, 1_000 + 61 * 60_000), None);
        assert_eq!(registry.recovery_since(3, 5_000), None);
    }

    #[test]
    fn test_event_recording() {
        let registry = registry();
        let event = Urn::new("sr", "match", 5);
        assert!(!registry.is_event_recorded(&event));
        registry.record_event(1, &event);
        registry.record_event(3, &event);
        registry.record_event(1, &event);
        assert_eq!(registry.event_producers(&event), vec![1, 3]);
    }
}
