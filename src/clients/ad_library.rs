//! Client for the RapidAPI "ad-libraries" service.
//!
//! Responses are returned as raw JSON so callers can forward them unmodified.

use async_trait::async_trait;
use reqwest::Client;
use serde_json::Value;
use std::time::Duration;
use thiserror::Error;
use tracing::debug;
use url::Url;

use crate::config::UpstreamConfig;

const SEARCH_PAGES_PATH: &str = "/meta/search/pages";
const PAGE_ADS_PATH: &str = "/meta/page/ads";

#[derive(Debug, Error)]
pub enum AdLibraryError {
    #[error("{0} must not be empty")]
    InvalidArgument(&'static str),

    #[error("API responded with status: {status}")]
    Upstream { status: u16, body: String },

    #[error("Transport error: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("Invalid upstream URL: {0}")]
    Url(#[from] url::ParseError),

    #[error("Failed to decode upstream response: {0}")]
    Decode(#[from] serde_json::Error),
}

/// Upstream operations the services depend on.
#[async_trait]
pub trait AdLibraryApi: Send + Sync {
    /// Searches advertiser pages. `country_code` falls back to the configured
    /// search default (`PL`).
    async fn search_pages(
        &self,
        query: &str,
        country_code: Option<&str>,
    ) -> Result<Value, AdLibraryError>;

    /// Fetches every ad for a page across facebook and instagram.
    /// `country_code` falls back to the configured ads default (`US`).
    async fn fetch_page_ads(
        &self,
        page_id: &str,
        country_code: Option<&str>,
    ) -> Result<Value, AdLibraryError>;
}

#[derive(Clone)]
pub struct AdLibraryClient {
    client: Client,
    base_url: String,
    api_key: String,
    api_host: String,
    search_country_code: String,
    ads_country_code: String,
}

impl AdLibraryClient {
    pub fn new(config: &UpstreamConfig) -> Result<Self, AdLibraryError> {
        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_seconds))
            .user_agent(concat!("adlib-proxy/", env!("CARGO_PKG_VERSION")))
            .build()?;

        Ok(Self::with_client(client, config))
    }

    #[must_use]
    pub fn with_client(client: Client, config: &UpstreamConfig) -> Self {
        Self {
            client,
            base_url: config.base_url.trim_end_matches('/').to_string(),
            api_key: config.api_key.clone(),
            api_host: config.api_host.clone(),
            search_country_code: config.search_country_code.clone(),
            ads_country_code: config.ads_country_code.clone(),
        }
    }

    fn endpoint(&self, path: &str, params: &[(&str, &str)]) -> Result<Url, AdLibraryError> {
        let mut url = Url::parse(&format!("{}{path}", self.base_url))?;
        url.query_pairs_mut().extend_pairs(params);
        Ok(url)
    }

    fn search_pages_url(&self, query: &str, country_code: Option<&str>) -> Result<Url, AdLibraryError> {
        let country = non_empty(country_code, &self.search_country_code);
        self.endpoint(
            SEARCH_PAGES_PATH,
            &[("query", query), ("country_code", country)],
        )
    }

    fn page_ads_url(&self, page_id: &str, country_code: Option<&str>) -> Result<Url, AdLibraryError> {
        let country = non_empty(country_code, &self.ads_country_code);
        self.endpoint(
            PAGE_ADS_PATH,
            &[
                ("page_id", page_id),
                ("country_code", country),
                ("platform", "facebook,instagram"),
                ("media_types", "all"),
                ("active_status", "all"),
            ],
        )
    }

    async fn get_json(&self, url: Url) -> Result<Value, AdLibraryError> {
        let response = self
            .client
            .get(url)
            .header("X-RapidAPI-Key", &self.api_key)
            .header("X-RapidAPI-Host", &self.api_host)
            .send()
            .await?;

        let status = response.status();
        let body = response.text().await?;

        if !status.is_success() {
            return Err(AdLibraryError::Upstream {
                status: status.as_u16(),
                body,
            });
        }

        Ok(serde_json::from_str(&body)?)
    }
}

fn non_empty<'a>(value: Option<&'a str>, fallback: &'a str) -> &'a str {
    value.filter(|v| !v.trim().is_empty()).unwrap_or(fallback)
}

#[async_trait]
impl AdLibraryApi for AdLibraryClient {
    async fn search_pages(
        &self,
        query: &str,
        country_code: Option<&str>,
    ) -> Result<Value, AdLibraryError> {
        if query.trim().is_empty() {
            return Err(AdLibraryError::InvalidArgument("query"));
        }

        let url = self.search_pages_url(query, country_code)?;
        debug!(query, %url, "Searching ad library pages");
        self.get_json(url).await
    }

    async fn fetch_page_ads(
        &self,
        page_id: &str,
        country_code: Option<&str>,
    ) -> Result<Value, AdLibraryError> {
        if page_id.trim().is_empty() {
            return Err(AdLibraryError::InvalidArgument("page_id"));
        }

        let url = self.page_ads_url(page_id, country_code)?;
        debug!(page_id, %url, "Fetching ads for page");
        self.get_json(url).await
    }
}
