//! Call tracing for any `DataProvider`

use super::provider::{DataProvider, Result};
use crate::domain::{EntityDto, Language, Urn};
use async_trait::async_trait;
use std::future::Future;
use std::time::Instant;
use tracing::{debug, warn};

/// Logs every call with its id, language, elapsed time and outcome
pub struct TracedDataProvider<P> {
    inner: P,
}

impl<P: DataProvider> TracedDataProvider<P> {
    pub fn new(inner: P) -> Self {
        Self { inner }
    }

    pub fn inner(&self) -> &P {
        &self.inner
    }
}

async fn traced<T>(
    operation: &'static str,
    id: &Urn,
    language: &Language,
    call: impl Future<Output = Result<T>>,
) -> Result<T> {
    let started = Instant::now();
    debug!(operation, id = %id, language = %language, "REST call started");

    let result = call.await;
    let elapsed_ms = started.elapsed().as_millis() as u64;
    match &result {
        Ok(_) => debug!(operation, id = %id, language = %language, elapsed_ms, "REST call completed"),
        Err(e) => warn!(
            operation,
            id = %id,
            language = %language,
            elapsed_ms,
            error = %e,
            "REST call failed"
        ),
    }
    result
}

#[async_trait]
impl<P: DataProvider> DataProvider for TracedDataProvider<P> {
    async fn fetch_summary(&self, id: &Urn, language: &Language) -> Result<EntityDto> {
        traced("fetch_summary", id, language, self.inner.fetch_summary(id, language)).await
    }

    async fn fetch_fixture(&self, id: &Urn, language: &Language) -> Result<EntityDto> {
        traced("fetch_fixture", id, language, self.inner.fetch_fixture(id, language)).await
    }

    async fn fetch_schedule(&self, tournament_id: &Urn, language: &Language) -> Result<Vec<Urn>> {
        traced(
            "fetch_schedule",
            tournament_id,
            language,
            self.inner.fetch_schedule(tournament_id, language),
        )
        .await
    }
}
