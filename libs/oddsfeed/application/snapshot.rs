//! Cache export and import

use crate::domain::{EntityCategory, ExportableCacheItem};
use crate::infrastructure::cache::CacheStore;
use crate::infrastructure::concurrency::KeyLockManager;
use std::sync::Arc;
use tracing::{info, warn};

pub struct CacheSnapshot {
    store: Arc<CacheStore>,
    key_locks: Arc<KeyLockManager>,
}

impl CacheSnapshot {
    pub fn new(store: Arc<CacheStore>, key_locks: Arc<KeyLockManager>) -> Self {
        Self { store, key_locks }
    }

    /// One record per cached entity, ordered by id
    pub fn export_all(&self) -> Vec<ExportableCacheItem> {
        let records: Vec<ExportableCacheItem> =
            self.store.items().iter().map(|item| item.to_record()).collect();
        info!(records = records.len(), "Exported cache snapshot");
        records
    }

    /// Merge records into the cache; returns how many were applied
    ///
    /// Records never overwrite data of equal or higher detail already cached.
    pub async fn import_all(&self, records: &[ExportableCacheItem]) -> usize {
        let mut imported = 0;
        for record in records {
            let id = record.id();
            if id.category() != Some(record_category(record)) {
                warn!(id = %id, "Skipping snapshot record that does not match its id");
                continue;
            }
            let _lock = self.key_locks.lock(&id.to_string()).await;
            if self.store.upsert(id, |item| item.merge_record(record)).is_some() {
                imported += 1;
            }
        }
        info!(imported, total = records.len(), "Imported cache snapshot");
        imported
    }
}

fn record_category(record: &ExportableCacheItem) -> EntityCategory {
    match record {
        ExportableCacheItem::SportEvent(_) => EntityCategory::SportEvent,
        ExportableCacheItem::Tournament(_) => EntityCategory::Tournament,
        ExportableCacheItem::Competitor(_) => EntityCategory::Competitor,
    }
}
