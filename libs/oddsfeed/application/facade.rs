//! Application Facade
//!
//! Public API for binaries and host applications. Wires the cache, fetch
//! path, producer registry and feed sessions together.

use super::listeners::{ListenerId, ListenerRegistry};
use super::orchestrator::{FetchError, FetchOrchestrator};
use super::processors::{CacheMessageProcessor, DispatchProcessor, ProcessorChain, SessionListener};
use super::receiver::{FeedReceiver, ReceiverListener, ReceiverMetrics, ReceiverStats};
use super::registry::ProducerRegistry;
use super::routing::MessageInterest;
use super::session::FeedSession;
use super::snapshot::CacheSnapshot;
use crate::domain::{CacheItem, ExportableCacheItem, Language, Urn};
use crate::infrastructure::{
    init_tracing, init_tracing_with_level, CacheStore, ConcurrencyGate, DataProvider, FeedConfig,
    HttpDataProvider, KeyLockManager, SnapshotError, SnapshotStore, TracedDataProvider,
};
use anyhow::Context;
use chrono::Utc;
use feedbus::MessageBroker;
use parking_lot::Mutex;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;
use tokio::runtime::Handle;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

/// Odds feed SDK entry point
pub struct OddsFeed {
    config: FeedConfig,
    store: Arc<CacheStore>,
    key_locks: Arc<KeyLockManager>,
    registry: Arc<ProducerRegistry>,
    orchestrator: Arc<FetchOrchestrator>,
    snapshot: CacheSnapshot,
    receiver_listeners: Arc<ListenerRegistry<dyn ReceiverListener>>,
    session_listeners: Arc<ListenerRegistry<dyn SessionListener>>,
    receiver_metrics: Arc<ReceiverMetrics>,
    maintenance: Mutex<Vec<JoinHandle<()>>>,
}

impl OddsFeed {
    /// Build the SDK around a REST data provider
    pub fn new(config: FeedConfig, provider: Arc<dyn DataProvider>) -> anyhow::Result<Self> {
        config.validate()?;

        let store = Arc::new(CacheStore::new());
        let gate = Arc::new(ConcurrencyGate::new(config.concurrency.gate_size)?);
        let key_locks = Arc::new(KeyLockManager::new(
            config.concurrency.key_lock_timeout(),
            config.concurrency.key_lock_poll_interval(),
        ));
        let registry = Arc::new(ProducerRegistry::new(
            &config.producer_settings(),
            config.recovery.max_inactivity_seconds,
        ));
        let orchestrator = Arc::new(FetchOrchestrator::new(
            Arc::clone(&store),
            gate,
            Arc::clone(&key_locks),
            provider,
            Arc::clone(&registry),
            config.exception_handling,
            config.languages.default.clone(),
        ));
        let snapshot = CacheSnapshot::new(Arc::clone(&store), Arc::clone(&key_locks));

        debug!(
            producers = registry.all().len(),
            gate_size = config.concurrency.gate_size,
            "Odds feed initialised"
        );

        Ok(Self {
            config,
            store,
            key_locks,
            registry,
            orchestrator,
            snapshot,
            receiver_listeners: Arc::new(ListenerRegistry::new()),
            session_listeners: Arc::new(ListenerRegistry::new()),
            receiver_metrics: Arc::new(ReceiverMetrics::new()),
            maintenance: Mutex::new(Vec::new()),
        })
    }

    /// Build the SDK around the HTTP sports API, with call tracing
    pub fn with_http_provider(config: FeedConfig) -> anyhow::Result<Self> {
        let provider = HttpDataProvider::new(&config.api.base_url, config.api.access_token.clone())
            .context("Failed to build HTTP client")?;
        Self::new(config, Arc::new(TracedDataProvider::new(provider)))
    }

    pub fn config(&self) -> &FeedConfig {
        &self.config
    }

    pub fn cache(&self) -> &Arc<CacheStore> {
        &self.store
    }

    pub fn registry(&self) -> &Arc<ProducerRegistry> {
        &self.registry
    }

    pub fn orchestrator(&self) -> &Arc<FetchOrchestrator> {
        &self.orchestrator
    }

    pub fn receiver_stats(&self) -> ReceiverStats {
        self.receiver_metrics.snapshot()
    }

    // ==================== LISTENERS ====================

    pub fn subscribe_receiver(&self, listener: Arc<dyn ReceiverListener>) -> ListenerId {
        self.receiver_listeners.subscribe(listener)
    }

    pub fn unsubscribe_receiver(&self, id: ListenerId) -> bool {
        self.receiver_listeners.unsubscribe(id)
    }

    pub fn subscribe_session(&self, listener: Arc<dyn SessionListener>) -> ListenerId {
        self.session_listeners.subscribe(listener)
    }

    pub fn unsubscribe_session(&self, id: ListenerId) -> bool {
        self.session_listeners.unsubscribe(id)
    }

    // ==================== ENTITIES ====================

    /// Entity summary in every configured language
    pub async fn entity(&self, id: &Urn) -> Result<CacheItem, FetchError> {
        self.orchestrator
            .ensure_loaded(id, &self.config.languages.all())
            .await
    }

    /// Entity summary in the given languages
    pub async fn entity_in(&self, id: &Urn, languages: &[Language]) -> Result<CacheItem, FetchError> {
        self.orchestrator.ensure_loaded(id, languages).await
    }

    /// Entity fixture in every configured language
    pub async fn fixture(&self, id: &Urn) -> Result<CacheItem, FetchError> {
        self.orchestrator
            .ensure_fixture_loaded(id, &self.config.languages.all())
            .await
    }

    pub async fn tournament_schedule(&self, id: &Urn) -> Result<Vec<Urn>, FetchError> {
        self.orchestrator
            .schedule(id, &self.config.languages.default)
            .await
    }

    /// Timestamp recovery for `producer` should resume from, `None` for a
    /// full recovery
    pub fn recovery_since(&self, producer: u32) -> Option<i64> {
        self.registry
            .recovery_since(producer, Utc::now().timestamp_millis())
    }

    // ==================== SESSIONS ====================

    /// Open a feed session on `broker`
    ///
    /// Locks the producer registry: enable/disable must happen before the
    /// first session is opened.
    pub async fn open_session(
        &self,
        broker: Arc<dyn MessageBroker>,
        queue: impl Into<String>,
        interest: MessageInterest,
    ) -> anyhow::Result<FeedSession> {
        let runtime = Handle::try_current().context("Feed sessions need a tokio runtime")?;
        self.registry.lock();

        let receiver = FeedReceiver::new(
            Arc::clone(&self.registry),
            Arc::clone(&self.receiver_listeners),
            Arc::clone(&self.receiver_metrics),
            self.config.replay,
        );
        let chain = ProcessorChain::new()
            .with(CacheMessageProcessor::new(
                Arc::clone(&self.store),
                Arc::clone(&self.key_locks),
                Arc::clone(&self.registry),
                Arc::clone(&self.orchestrator),
                runtime,
            ))
            .with(DispatchProcessor::new(Arc::clone(&self.session_listeners)));

        let session = FeedSession::open(
            broker,
            queue,
            interest,
            self.config.node_id,
            receiver,
            Arc::new(chain),
        )
        .await?;
        Ok(session)
    }

    // ==================== MAINTENANCE ====================

    /// Start the periodic key-lock cleanup and producer inactivity check
    pub fn start_maintenance(&self) -> anyhow::Result<()> {
        let runtime = Handle::try_current().context("Maintenance tasks need a tokio runtime")?;
        let mut tasks = self.maintenance.lock();
        if !tasks.is_empty() {
            warn!("Maintenance tasks already running");
            return Ok(());
        }

        let key_locks = Arc::clone(&self.key_locks);
        let cleanup_every = Duration::from_secs(self.config.concurrency.key_lock_cleanup_interval_secs.max(1));
        tasks.push(runtime.spawn(async move {
            let mut ticker = tokio::time::interval(cleanup_every);
            ticker.tick().await;
            loop {
                ticker.tick().await;
                let purged = key_locks.clean();
                if purged > 0 {
                    debug!(purged, "Purged expired key locks");
                }
            }
        }));

        let registry = Arc::clone(&self.registry);
        let check_every = Duration::from_secs(self.config.recovery.inactivity_check_interval_secs.max(1));
        tasks.push(runtime.spawn(async move {
            let mut ticker = tokio::time::interval(check_every);
            ticker.tick().await;
            loop {
                ticker.tick().await;
                let down = registry.check_inactivity(Utc::now().timestamp_millis());
                if !down.is_empty() {
                    warn!(producers = ?down, "Producers marked down after missing alive messages");
                }
            }
        }));

        info!(
            cleanup_secs = cleanup_every.as_secs(),
            inactivity_check_secs = check_every.as_secs(),
            "Maintenance tasks started"
        );
        Ok(())
    }

    pub fn stop_maintenance(&self) {
        for task in self.maintenance.lock().drain(..) {
            task.abort();
        }
    }

    // ==================== SNAPSHOTS ====================

    pub fn export_cache(&self) -> Vec<ExportableCacheItem> {
        self.snapshot.export_all()
    }

    pub async fn import_cache(&self, records: &[ExportableCacheItem]) -> usize {
        self.snapshot.import_all(records).await
    }

    /// Write the cache to `path`; returns the number of records written
    pub fn save_snapshot(&self, path: impl AsRef<Path>) -> Result<usize, SnapshotError> {
        let records = self.export_cache();
        SnapshotStore::save(path, &records)?;
        Ok(records.len())
    }

    /// Merge a snapshot file into the cache; returns the number of records applied
    pub async fn load_snapshot(&self, path: impl AsRef<Path>) -> Result<usize, SnapshotError> {
        let records = SnapshotStore::load(path)?;
        Ok(self.import_cache(&records).await)
    }
}

impl Drop for OddsFeed {
    fn drop(&mut self) {
        self.stop_maintenance();
    }
}

/// Initialize tracing for binaries
pub fn init_logging() {
    init_tracing();
}

/// Initialize tracing for binaries with a specific log level
pub fn init_logging_with_level(level: &str) {
    init_tracing_with_level(level);
}
