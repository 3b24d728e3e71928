//! REST boundary
//!
//! The cache core only needs three asynchronous, idempotent lookups. How
//! they map onto HTTP endpoints is the adapter's concern.

use crate::domain::{EntityDto, Language, Urn};
use async_trait::async_trait;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum DataProviderError {
    #[error("HTTP request failed: {0}")]
    RequestFailed(#[from] reqwest::Error),

    #[error("API error ({status}): {message}")]
    ApiError { status: u16, message: String },

    #[error("Resource not found: {0}")]
    NotFound(String),

    #[error("Deserialization failed: {0}")]
    DeserializeFailed(String),

    #[error("Rate limit exceeded")]
    RateLimitExceeded,

    #[error("{0}")]
    Other(String),
}

pub type Result<T> = std::result::Result<T, DataProviderError>;

#[async_trait]
pub trait DataProvider: Send + Sync + 'static {
    /// Lightweight entity data for one language
    async fn fetch_summary(&self, id: &Urn, language: &Language) -> Result<EntityDto>;

    /// Detailed entity data for one language
    async fn fetch_fixture(&self, id: &Urn, language: &Language) -> Result<EntityDto>;

    /// Ids of the sport events scheduled in a tournament
    async fn fetch_schedule(&self, tournament_id: &Urn, language: &Language) -> Result<Vec<Urn>>;
}
