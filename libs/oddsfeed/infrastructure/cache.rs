//! In-memory entity cache
//!
//! One `CacheItem` per URN in a sharded concurrent map. Reads clone out of
//! the map under a short shard lock; callers that need per-entity mutual
//! exclusion across several operations take the entity's key lock first.

use crate::domain::{CacheItem, DtoSource, EntityCategory, EventStatus, Language, Urn};
use dashmap::DashMap;
use tracing::debug;

#[derive(Default)]
pub struct CacheStore {
    items: DashMap<Urn, CacheItem>,
}

impl CacheStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn contains(&self, id: &Urn) -> bool {
        self.items.contains_key(id)
    }

    /// Snapshot of the cached item
    pub fn get(&self, id: &Urn) -> Option<CacheItem> {
        self.items.get(id).map(|item| item.clone())
    }

    /// Read from the cached item without cloning it
    pub fn with_item<R>(&self, id: &Urn, read: impl FnOnce(&CacheItem) -> R) -> Option<R> {
        self.items.get(id).map(|item| read(&item))
    }

    /// Requested languages not loaded from `source`; all of them when the
    /// item is not cached
    pub fn missing_languages(
        &self,
        id: &Urn,
        languages: &[Language],
        source: DtoSource,
    ) -> Vec<Language> {
        match self.items.get(id) {
            Some(item) => item.missing_languages(languages, source),
            None => {
                let mut missing: Vec<Language> = Vec::with_capacity(languages.len());
                for language in languages {
                    if !missing.contains(language) {
                        missing.push(language.clone());
                    }
                }
                missing
            }
        }
    }

    /// Mutate the item, creating a stub first when absent
    ///
    /// Returns `None` for URNs that have no cache category.
    pub fn upsert<R>(&self, id: &Urn, update: impl FnOnce(&mut CacheItem) -> R) -> Option<R> {
        let category = id.category()?;
        let mut item = self
            .items
            .entry(id.clone())
            .or_insert_with(|| CacheItem::stub(id.clone(), category));
        Some(update(&mut item))
    }

    /// Mutate the item only if it is cached
    pub fn update<R>(&self, id: &Urn, update: impl FnOnce(&mut CacheItem) -> R) -> Option<R> {
        self.items.get_mut(id).map(|mut item| update(&mut item))
    }

    /// Cached item, inserting an empty stub when absent
    pub fn get_or_insert_stub(&self, id: &Urn) -> Option<CacheItem> {
        self.upsert(id, |item| item.clone())
    }

    pub fn remove(&self, id: &Urn) -> Option<CacheItem> {
        let removed = self.items.remove(id).map(|(_, item)| item);
        if removed.is_some() {
            debug!(id = %id, "Removed cache item");
        }
        removed
    }

    pub fn set_status(&self, id: &Urn, status: EventStatus) -> bool {
        if id.category() != Some(EntityCategory::SportEvent) {
            return false;
        }
        self.upsert(id, |item| item.set_status(status)).is_some()
    }

    /// Drop the event-status sub-object; the entity stays cached
    pub fn clear_status(&self, id: &Urn) -> bool {
        self.update(id, CacheItem::clear_status).unwrap_or(false)
    }

    pub fn ids(&self) -> Vec<Urn> {
        let mut ids: Vec<Urn> = self.items.iter().map(|entry| entry.key().clone()).collect();
        ids.sort();
        ids
    }

    /// Snapshot of every item, ordered by id
    pub fn items(&self) -> Vec<CacheItem> {
        let mut items: Vec<CacheItem> = self.items.iter().map(|entry| entry.value().clone()).collect();
        items.sort_by(|a, b| a.id().cmp(b.id()));
        items
    }

    pub fn clear(&self) {
        self.items.clear();
    }
}
