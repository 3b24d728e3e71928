//! Common test utilities for the odds feed integration tests
//!
//! Scripted data provider, configuration and feed message fixtures.

#![allow(dead_code)]

use async_trait::async_trait;
use oddsfeed::domain::{EntityDto, Language, Urn};
use oddsfeed::infrastructure::client::{DataProvider, DataProviderError};
use oddsfeed::infrastructure::{ExceptionHandlingStrategy, FeedConfig};
use parking_lot::Mutex;
use std::collections::HashMap;
use std::future::Future;
use std::sync::atomic::{AtomicUsize, Ordering};
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

/// One recorded provider call
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Call {
    pub operation: &'static str,
    pub id: Urn,
    pub language: Language,
}

/// In-memory `DataProvider` with optional latency and failures
///
/// Unscripted lookups answer with a DTO named `"<id> (<language>)"`.
#[derive(Default)]
pub struct ScriptedProvider {
    responses: Mutex<HashMap<(Urn, Language), EntityDto>>,
    schedules: Mutex<HashMap<Urn, Vec<Urn>>>,
    calls: Mutex<Vec<Call>>,
    in_flight: AtomicUsize,
    max_in_flight: AtomicUsize,
    delay: Duration,
    failing: bool,
}

impl ScriptedProvider {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_delay(delay: Duration) -> Self {
        Self {
            delay,
            ..Self::default()
        }
    }

    pub fn failing() -> Self {
        Self {
            failing: true,
            ..Self::default()
        }
    }

    pub fn script(&self, id: &Urn, language: &Language, dto: EntityDto) {
        self.responses
            .lock()
            .insert((id.clone(), language.clone()), dto);
    }

    pub fn script_schedule(&self, tournament: &Urn, events: Vec<Urn>) {
        self.schedules.lock().insert(tournament.clone(), events);
    }

    pub fn calls(&self) -> Vec<Call> {
        self.calls.lock().clone()
    }

    pub fn call_count(&self) -> usize {
        self.calls.lock().len()
    }

    pub fn calls_for(&self, operation: &str) -> usize {
        self.calls
            .lock()
            .iter()
            .filter(|call| call.operation == operation)
            .count()
    }

    pub fn max_in_flight(&self) -> usize {
        self.max_in_flight.load(Ordering::SeqCst)
    }

    async fn answer(
        &self,
        operation: &'static str,
        id: &Urn,
        language: &Language,
    ) -> Result<EntityDto, DataProviderError> {
        self.calls.lock().push(Call {
            operation,
            id: id.clone(),
            language: language.clone(),
        });

        let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.max_in_flight.fetch_max(now, Ordering::SeqCst);
        if !self.delay.is_zero() {
            tokio::time::sleep(self.delay).await;
        }
        self.in_flight.fetch_sub(1, Ordering::SeqCst);

        if self.failing {
            return Err(DataProviderError::ApiError {
                status: 503,
                message: "service unavailable".to_string(),
            });
        }

        let scripted = self
            .responses
            .lock()
            .get(&(id.clone(), language.clone()))
            .cloned();
        Ok(scripted.unwrap_or_else(|| EntityDto {
            id: Some(id.clone()),
            name: Some(format!("{id} ({language})")),
            scheduled: Some(1_700_000_000_000),
            sport_id: Some(Urn::new("sr", "sport", 1)),
            ..EntityDto::default()
        }))
    }
}

#[async_trait]
impl DataProvider for ScriptedProvider {
    async fn fetch_summary(&self, id: &Urn, language: &Language) -> Result<EntityDto, DataProviderError> {
        self.answer("fetch_summary", id, language).await
    }

    async fn fetch_fixture(&self, id: &Urn, language: &Language) -> Result<EntityDto, DataProviderError> {
        self.answer("fetch_fixture", id, language).await
    }

    async fn fetch_schedule(
        &self,
        tournament_id: &Urn,
        language: &Language,
    ) -> Result<Vec<Urn>, DataProviderError> {
        self.answer("fetch_schedule", tournament_id, language).await?;
        Ok(self
            .schedules
            .lock()
            .get(tournament_id)
            .cloned()
            .unwrap_or_default())
    }
}

pub fn lang(code: &str) -> Language {
    code.parse().unwrap()
}

pub fn langs(codes: &[&str]) -> Vec<Language> {
    codes.iter().map(|code| lang(code)).collect()
}

/// en + de + fr, fast key-lock polling
pub fn config(strategy: ExceptionHandlingStrategy) -> FeedConfig {
    let mut config = FeedConfig::new(lang("en"));
    config.languages.wanted = langs(&["de", "fr"]);
    config.exception_handling = strategy;
    config.concurrency.key_lock_poll_ms = 10;
    config
}

/// Poll `condition` every 10ms until it holds or `timeout` passes
pub async fn wait_until(timeout: Duration, mut condition: impl FnMut() -> bool) -> bool {
    let started = Instant::now();
    while started.elapsed() < timeout {
        if condition() {
            return true;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    condition()
}

/// Run `fut` and fail the test if it takes longer than five seconds
pub async fn within<T>(fut: impl Future<Output = T>) -> T {
    tokio::time::timeout(Duration::from_secs(5), fut)
        .await
        .expect("operation timed out")
}

pub mod messages {
    //! Feed message bodies and routing keys

    use oddsfeed::domain::Urn;
    use serde_json::json;

    pub const ALIVE_KEY: &str = "-.-.-.alive.-.-.-.-";

    pub fn event_key(kind: &str, event: &Urn) -> String {
        format!(
            "hi.-.live.{kind}.1.{}:{}.{}.-",
            event.prefix(),
            event.urn_type(),
            event.id()
        )
    }

    fn now_ms() -> i64 {
        chrono::Utc::now().timestamp_millis()
    }

    pub fn alive(product: u32) -> String {
        json!({
            "type": "alive",
            "product": product,
            "timestamp": now_ms(),
            "subscribed": true,
        })
        .to_string()
    }

    pub fn odds_change(product: u32, event: &Urn, status: Option<i32>) -> String {
        let mut body = json!({
            "type": "odds_change",
            "product": product,
            "event_id": event.to_string(),
            "timestamp": now_ms(),
            "markets": [{"id": 1, "specifiers": "total=2.5"}],
        });
        if let Some(status) = status {
            body["status"] = json!({"status": status, "home_score": 1.0, "away_score": 0.0});
        }
        body.to_string()
    }

    pub fn bet_stop(product: u32, event: &Urn) -> String {
        json!({
            "type": "bet_stop",
            "product": product,
            "event_id": event.to_string(),
            "timestamp": now_ms(),
            "groups": "all",
        })
        .to_string()
    }

    pub fn bet_settlement(product: u32, event: &Urn) -> String {
        json!({
            "type": "bet_settlement",
            "product": product,
            "event_id": event.to_string(),
            "timestamp": now_ms(),
            "certainty": 2,
            "markets": [{"id": 1}],
        })
        .to_string()
    }

    pub fn fixture_change(product: u32, event: &Urn) -> String {
        json!({
            "type": "fixture_change",
            "product": product,
            "event_id": event.to_string(),
            "timestamp": now_ms(),
            "change_type": 5,
        })
        .to_string()
    }
}
