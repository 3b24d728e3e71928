//! HTTP/JSON data provider

use super::provider::{DataProvider, DataProviderError, Result};
use crate::domain::{EntityCategory, EntityDto, Language, Urn};
use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use serde::de::DeserializeOwned;
use serde::Deserialize;
use std::time::Duration;
use tracing::{debug, warn};

const ACCESS_TOKEN_HEADER: &str = "x-access-token";

#[derive(Debug, Deserialize)]
struct ScheduleResponse {
    #[serde(default)]
    sport_events: Vec<Urn>,
}

/// Sports API client
pub struct HttpDataProvider {
    base_url: String,
    access_token: Option<String>,
    client: Client,
}

impl HttpDataProvider {
    pub fn new(base_url: impl Into<String>, access_token: Option<String>) -> Result<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(30))
            .build()?;

        Ok(Self {
            base_url: base_url.into().trim_end_matches('/').to_string(),
            access_token,
            client,
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn summary_url(&self, id: &Urn, language: &Language) -> String {
        match id.category() {
            Some(EntityCategory::Tournament) => format!(
                "{}/sports/{}/tournaments/{}/info.json",
                self.base_url, language, id
            ),
            Some(EntityCategory::Competitor) => format!(
                "{}/sports/{}/competitors/{}/profile.json",
                self.base_url, language, id
            ),
            _ => format!(
                "{}/sports/{}/sport_events/{}/summary.json",
                self.base_url, language, id
            ),
        }
    }

    fn fixture_url(&self, id: &Urn, language: &Language) -> String {
        format!(
            "{}/sports/{}/sport_events/{}/fixture.json",
            self.base_url, language, id
        )
    }

    fn schedule_url(&self, tournament_id: &Urn, language: &Language) -> String {
        format!(
            "{}/sports/{}/tournaments/{}/schedule.json",
            self.base_url, language, tournament_id
        )
    }

    async fn get_json<T: DeserializeOwned>(&self, url: &str) -> Result<T> {
        debug!("GET {}", url);

        let mut request = self.client.get(url);
        if let Some(token) = &self.access_token {
            request = request.header(ACCESS_TOKEN_HEADER, token);
        }
        let response = request.send().await?;

        let status = response.status();

        if status == StatusCode::TOO_MANY_REQUESTS {
            warn!("Rate limit exceeded");
            return Err(DataProviderError::RateLimitExceeded);
        }

        if status == StatusCode::NOT_FOUND {
            return Err(DataProviderError::NotFound(url.to_string()));
        }

        if !status.is_success() {
            let error_text = response
                .text()
                .await
                .unwrap_or_else(|_| "Unknown error".to_string());
            return Err(DataProviderError::ApiError {
                status: status.as_u16(),
                message: error_text,
            });
        }

        response
            .json()
            .await
            .map_err(|e| DataProviderError::DeserializeFailed(e.to_string()))
    }
}

#[async_trait]
impl DataProvider for HttpDataProvider {
    async fn fetch_summary(&self, id: &Urn, language: &Language) -> Result<EntityDto> {
        self.get_json(&self.summary_url(id, language)).await
    }

    async fn fetch_fixture(&self, id: &Urn, language: &Language) -> Result<EntityDto> {
        self.get_json(&self.fixture_url(id, language)).await
    }

    async fn fetch_schedule(&self, tournament_id: &Urn, language: &Language) -> Result<Vec<Urn>> {
        let schedule: ScheduleResponse = self
            .get_json(&self.schedule_url(tournament_id, language))
            .await?;
        Ok(schedule.sport_events)
    }
}
