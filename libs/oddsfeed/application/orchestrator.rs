//! Fetch orchestration
//!
//! Loads missing languages of a cached entity from the REST boundary. The
//! cache-hit path takes no locks; a miss takes the entity's key lock and a
//! fetch slot, re-checks the cache, then fetches and merges one language at
//! a time. A load returns only once every concurrent load of the same id has
//! finished, so each caller sees the merged result of all of them.

use super::registry::ProducerRegistry;
use crate::domain::{CacheItem, DtoSource, EntityDto, Language, Urn};
use crate::infrastructure::cache::CacheStore;
use crate::infrastructure::client::{DataProvider, DataProviderError};
use crate::infrastructure::concurrency::{ConcurrencyGate, GateError, KeyLockManager};
use crate::infrastructure::config::ExceptionHandlingStrategy;
use dashmap::DashMap;
use std::slice;
use std::sync::Arc;
use std::time::Instant;
use thiserror::Error;
use tokio::runtime::Handle;
use tracing::{debug, warn};

#[derive(Error, Debug)]
pub enum FetchError {
    #[error("{0} is not a cacheable entity")]
    UnsupportedEntity(Urn),

    #[error("{operation} for {id} ({language}) failed: {source}")]
    Provider {
        operation: &'static str,
        id: Urn,
        language: Language,
        #[source]
        source: DataProviderError,
    },

    #[error("Fetch slot error: {0}")]
    Gate(#[from] GateError),
}

pub type Result<T> = std::result::Result<T, FetchError>;

/// Passes over the missing languages before a load gives up on entries
/// evicted while it ran
const MAX_LOAD_PASSES: usize = 3;

/// Loads currently running per entity
#[derive(Default)]
struct InFlightLoads {
    counts: DashMap<Urn, usize>,
}

impl InFlightLoads {
    fn enter(&self, id: &Urn) -> LoadTicket<'_> {
        *self.counts.entry(id.clone()).or_insert(0) += 1;
        LoadTicket {
            loads: self,
            id: id.clone(),
        }
    }

    fn is_idle(&self, id: &Urn) -> bool {
        !self.counts.contains_key(id)
    }
}

struct LoadTicket<'a> {
    loads: &'a InFlightLoads,
    id: Urn,
}

impl Drop for LoadTicket<'_> {
    fn drop(&mut self) {
        if let Some(mut count) = self.loads.counts.get_mut(&self.id) {
            *count = count.saturating_sub(1);
        }
        // shard guard released above; remove_if takes it again
        self.loads.counts.remove_if(&self.id, |_, count| *count == 0);
    }
}

pub struct FetchOrchestrator {
    store: Arc<CacheStore>,
    gate: Arc<ConcurrencyGate>,
    key_locks: Arc<KeyLockManager>,
    provider: Arc<dyn DataProvider>,
    registry: Arc<ProducerRegistry>,
    strategy: ExceptionHandlingStrategy,
    default_language: Language,
    loads: InFlightLoads,
}

impl FetchOrchestrator {
    pub fn new(
        store: Arc<CacheStore>,
        gate: Arc<ConcurrencyGate>,
        key_locks: Arc<KeyLockManager>,
        provider: Arc<dyn DataProvider>,
        registry: Arc<ProducerRegistry>,
        strategy: ExceptionHandlingStrategy,
        default_language: Language,
    ) -> Self {
        Self {
            store,
            gate,
            key_locks,
            provider,
            registry,
            strategy,
            default_language,
            loads: InFlightLoads::default(),
        }
    }

    pub fn strategy(&self) -> ExceptionHandlingStrategy {
        self.strategy
    }

    pub fn default_language(&self) -> &Language {
        &self.default_language
    }

    /// Item with summary data loaded for every requested language
    ///
    /// An empty language list means the default language.
    pub async fn ensure_loaded(&self, id: &Urn, languages: &[Language]) -> Result<CacheItem> {
        self.load(id, languages, DtoSource::Summary).await
    }

    /// Item with fixture data loaded for every requested language
    pub async fn ensure_fixture_loaded(&self, id: &Urn, languages: &[Language]) -> Result<CacheItem> {
        self.load(id, languages, DtoSource::Fixture).await
    }

    async fn load(&self, id: &Urn, languages: &[Language], source: DtoSource) -> Result<CacheItem> {
        if id.category().is_none() {
            return Err(FetchError::UnsupportedEntity(id.clone()));
        }
        let languages = if languages.is_empty() {
            slice::from_ref(&self.default_language)
        } else {
            languages
        };

        let missing = self.store.missing_languages(id, languages, source);
        if missing.is_empty() {
            if let Some(item) = self.store.get(id) {
                return Ok(item);
            }
        }

        let key = id.to_string();
        {
            let _ticket = self.loads.enter(id);
            let mut missing = missing;
            for pass in 1..=MAX_LOAD_PASSES {
                if !self.load_languages(id, &key, missing, source).await? {
                    break;
                }
                missing = self.store.missing_languages(id, languages, source);
                if missing.is_empty() {
                    break;
                }
                if pass == MAX_LOAD_PASSES {
                    warn!(id = %id, missing = missing.len(), "Languages evicted while loading, returning partial item");
                } else {
                    debug!(id = %id, missing = missing.len(), "Languages evicted while loading, fetching again");
                }
            }
        }
        self.settle(id).await;

        let _lock = self.key_locks.lock(&key).await;
        self.store
            .get_or_insert_stub(id)
            .ok_or_else(|| FetchError::UnsupportedEntity(id.clone()))
    }

    /// One pass over `missing`; false when a fetch failed and was swallowed
    async fn load_languages(
        &self,
        id: &Urn,
        key: &str,
        missing: Vec<Language>,
        source: DtoSource,
    ) -> Result<bool> {
        let mut complete = true;
        for language in missing {
            let _lock = self.key_locks.lock(key).await;
            let _slot = self.gate.acquire(key).await?;

            if self
                .store
                .missing_languages(id, slice::from_ref(&language), source)
                .is_empty()
            {
                debug!(id = %id, language = %language, "Loaded by a concurrent caller");
                continue;
            }

            match self.fetch(id, &language, source).await {
                Ok(dto) => {
                    let accept_status = !self.registry.is_event_recorded(id);
                    self.store
                        .upsert(id, |item| item.merge(&dto, &language, source, accept_status));
                }
                Err(e) => {
                    self.handle_failure(operation_name(source), id, &language, e)?;
                    complete = false;
                }
            }
        }
        Ok(complete)
    }

    /// Wait for the other loads of `id` to finish, bounded by the key lock timeout
    async fn settle(&self, id: &Urn) {
        let started = Instant::now();
        while !self.loads.is_idle(id) {
            if started.elapsed() >= self.key_locks.timeout() {
                warn!(id = %id, "Concurrent loads still running, returning current item");
                return;
            }
            tokio::time::sleep(self.key_locks.poll_interval()).await;
        }
    }

    async fn fetch(
        &self,
        id: &Urn,
        language: &Language,
        source: DtoSource,
    ) -> std::result::Result<EntityDto, DataProviderError> {
        match source {
            DtoSource::Summary => self.provider.fetch_summary(id, language).await,
            DtoSource::Fixture => self.provider.fetch_fixture(id, language).await,
        }
    }

    fn handle_failure(
        &self,
        operation: &'static str,
        id: &Urn,
        language: &Language,
        source: DataProviderError,
    ) -> Result<()> {
        match self.strategy {
            ExceptionHandlingStrategy::Throw => Err(FetchError::Provider {
                operation,
                id: id.clone(),
                language: language.clone(),
                source,
            }),
            ExceptionHandlingStrategy::Catch => {
                warn!(operation, id = %id, language = %language, error = %source, "Fetch failed, continuing with cached data");
                Ok(())
            }
        }
    }

    /// Sport events scheduled in a tournament; fetched once, then cached
    ///
    /// Every scheduled event gets a stub in the cache.
    pub async fn schedule(&self, id: &Urn, language: &Language) -> Result<Vec<Urn>> {
        if !id.is_tournament() {
            return Err(FetchError::UnsupportedEntity(id.clone()));
        }
        if let Some(Some(events)) = self.store.with_item(id, |item| item.schedule().map(<[Urn]>::to_vec)) {
            return Ok(events);
        }

        let key = id.to_string();
        let _lock = self.key_locks.lock(&key).await;
        let _slot = self.gate.acquire(&key).await?;

        if let Some(Some(events)) = self.store.with_item(id, |item| item.schedule().map(<[Urn]>::to_vec)) {
            return Ok(events);
        }

        match self.provider.fetch_schedule(id, language).await {
            Ok(events) => {
                self.store.upsert(id, |item| item.set_schedule(events.clone()));
                for event in &events {
                    let _event_lock = self.key_locks.lock(&event.to_string()).await;
                    self.store.upsert(event, |_| ());
                }
                debug!(id = %id, events = events.len(), "Tournament schedule cached");
                Ok(events)
            }
            Err(e) => {
                self.handle_failure("fetch_schedule", id, language, e)?;
                Ok(Vec::new())
            }
        }
    }

    /// Fetch a tournament schedule in the background; failures are only logged
    pub fn prefetch_schedule(self: &Arc<Self>, runtime: &Handle, id: Urn) {
        let orchestrator = Arc::clone(self);
        runtime.spawn(async move {
            let language = orchestrator.default_language.clone();
            match orchestrator.schedule(&id, &language).await {
                Ok(events) => debug!(id = %id, events = events.len(), "Schedule prefetched"),
                Err(e) => warn!(id = %id, error = %e, "Schedule prefetch failed"),
            }
        });
    }
}

fn operation_name(source: DtoSource) -> &'static str {
    match source {
        DtoSource::Summary => "fetch_summary",
        DtoSource::Fixture => "fetch_fixture",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::ProducerSettings;
    use async_trait::async_trait;
    use parking_lot::Mutex;
    use std::time::Duration;

    #[derive(Default)]
    struct CountingProvider {
        calls: Mutex<Vec<(String, String)>>,
        fail: bool,
    }

    #[async_trait]
    impl DataProvider for CountingProvider {
        async fn fetch_summary(
            &self,
            id: &Urn,
            language: &Language,
        ) -> std::result::Result<EntityDto, DataProviderError> {
            self.calls.lock().push((id.to_string(), language.to_string()));
            if self.fail {
                return Err(DataProviderError::Other("boom".to_string()));
            }
            Ok(EntityDto {
                name: Some(format!("{id} [{language}]")),
                ..EntityDto::default()
            })
        }

        async fn fetch_fixture(
            &self,
            id: &Urn,
            language: &Language,
        ) -> std::result::Result<EntityDto, DataProviderError> {
            self.fetch_summary(id, language).await
        }

        async fn fetch_schedule(
            &self,
            _tournament_id: &Urn,
            _language: &Language,
        ) -> std::result::Result<Vec<Urn>, DataProviderError> {
            Ok(vec![Urn::new("sr", "match", 1), Urn::new("sr", "match", 2)])
        }
    }

    /// Evicts the entity once, while the given language is being fetched
    struct EvictingProvider {
        store: Arc<CacheStore>,
        evict_on: Language,
        evicted: Mutex<bool>,
        calls: Mutex<Vec<String>>,
    }

    #[async_trait]
    impl DataProvider for EvictingProvider {
        async fn fetch_summary(
            &self,
            id: &Urn,
            language: &Language,
        ) -> std::result::Result<EntityDto, DataProviderError> {
            self.calls.lock().push(language.to_string());
            let mut evicted = self.evicted.lock();
            if *language == self.evict_on && !*evicted {
                *evicted = true;
                self.store.remove(id);
            }
            Ok(EntityDto {
                name: Some(format!("{id} [{language}]")),
                ..EntityDto::default()
            })
        }

        async fn fetch_fixture(
            &self,
            id: &Urn,
            language: &Language,
        ) -> std::result::Result<EntityDto, DataProviderError> {
            self.fetch_summary(id, language).await
        }

        async fn fetch_schedule(
            &self,
            _tournament_id: &Urn,
            _language: &Language,
        ) -> std::result::Result<Vec<Urn>, DataProviderError> {
            Ok(Vec::new())
        }
    }

    fn orchestrator(
        provider: Arc<CountingProvider>,
        strategy: ExceptionHandlingStrategy,
    ) -> (FetchOrchestrator, Arc<CacheStore>) {
        let store = Arc::new(CacheStore::new());
        (orchestrator_on(Arc::clone(&store), provider, strategy), store)
    }

    fn orchestrator_on(
        store: Arc<CacheStore>,
        provider: Arc<dyn DataProvider>,
        strategy: ExceptionHandlingStrategy,
    ) -> FetchOrchestrator {
        FetchOrchestrator::new(
            store,
            Arc::new(ConcurrencyGate::new(4).unwrap()),
            Arc::new(KeyLockManager::new(Duration::from_secs(5), Duration::from_millis(10))),
            provider,
            Arc::new(ProducerRegistry::new(&[ProducerSettings::new(1, "LO", 60)], 20)),
            strategy,
            "en".parse().unwrap(),
        )
    }

    fn langs(codes: &[&str]) -> Vec<Language> {
        codes.iter().map(|c| c.parse().unwrap()).collect()
    }

    #[tokio::test]
    async fn test_cache_hit_skips_provider() {
        let provider = Arc::new(CountingProvider::default());
        let (orchestrator, _) = orchestrator(Arc::clone(&provider), ExceptionHandlingStrategy::Catch);
        let id = Urn::new("sr", "match", 7);

        let item = orchestrator.ensure_loaded(&id, &langs(&["en", "de"])).await.unwrap();
        assert_eq!(item.loaded_languages().len(), 2);
        orchestrator.ensure_loaded(&id, &langs(&["de"])).await.unwrap();

        assert_eq!(provider.calls.lock().len(), 2);
    }

    #[tokio::test]
    async fn test_empty_languages_use_default() {
        let provider = Arc::new(CountingProvider::default());
        let (orchestrator, _) = orchestrator(Arc::clone(&provider), ExceptionHandlingStrategy::Catch);

        let item = orchestrator.ensure_loaded(&Urn::new("sr", "match", 7), &[]).await.unwrap();
        assert_eq!(item.name(&"en".parse().unwrap()), Some("sr:match:7 [en]"));
    }

    #[tokio::test]
    async fn test_failure_strategies() {
        let provider = Arc::new(CountingProvider {
            fail: true,
            ..CountingProvider::default()
        });
        let id = Urn::new("sr", "match", 7);

        let (catching, _) = orchestrator(Arc::clone(&provider), ExceptionHandlingStrategy::Catch);
        let item = catching.ensure_loaded(&id, &langs(&["en"])).await.unwrap();
        assert!(item.loaded_languages().is_empty());

        let (throwing, _) = orchestrator(provider, ExceptionHandlingStrategy::Throw);
        assert!(matches!(
            throwing.ensure_loaded(&id, &langs(&["en"])).await,
            Err(FetchError::Provider { operation: "fetch_summary", .. })
        ));
    }

    #[tokio::test]
    async fn test_language_evicted_mid_load_is_fetched_again() {
        let store = Arc::new(CacheStore::new());
        let provider = Arc::new(EvictingProvider {
            store: Arc::clone(&store),
            evict_on: "de".parse().unwrap(),
            evicted: Mutex::new(false),
            calls: Mutex::new(Vec::new()),
        });
        let orchestrator = orchestrator_on(
            Arc::clone(&store),
            provider.clone(),
            ExceptionHandlingStrategy::Catch,
        );
        let id = Urn::new("sr", "match", 8);

        let item = orchestrator.ensure_loaded(&id, &langs(&["en", "de"])).await.unwrap();

        assert_eq!(item.loaded_languages().len(), 2);
        assert_eq!(*provider.calls.lock(), vec!["en", "de", "en"]);
        assert_eq!(store.get(&id), Some(item));
    }

    #[tokio::test]
    async fn test_unsupported_entity() {
        let (orchestrator, _) =
            orchestrator(Arc::new(CountingProvider::default()), ExceptionHandlingStrategy::Catch);
        let result = orchestrator.ensure_loaded(&Urn::new("sr", "sport", 1), &[]).await;
        assert!(matches!(result, Err(FetchError::UnsupportedEntity(_))));
    }

    #[tokio::test]
    async fn test_schedule_cached_with_event_stubs() {
        let provider = Arc::new(CountingProvider::default());
        let (orchestrator, store) = orchestrator(provider, ExceptionHandlingStrategy::Catch);
        let tournament = Urn::new("sr", "tournament", 17);
        let en: Language = "en".parse().unwrap();

        let events = orchestrator.schedule(&tournament, &en).await.unwrap();
        assert_eq!(events.len(), 2);
        assert!(store.contains(&Urn::new("sr", "match", 1)));
        assert_eq!(orchestrator.schedule(&tournament, &en).await.unwrap(), events);

        assert!(orchestrator.schedule(&Urn::new("sr", "match", 1), &en).await.is_err());
    }
}
