use reqwest::header::{self, HeaderMap, HeaderValue};
use reqwest::{Client, StatusCode};
use serde::{Deserialize, Serialize};
use std::time::{Duration, Instant};
use thiserror::Error;

use crate::config::ScraperConfig;
use crate::utils::error::{AppError, Result};

const ACCEPT: &str = "text/html,application/xhtml+xml,application/xml;q=0.9,image/avif,image/webp,image/apng,*/*;q=0.8,application/signed-exchange;v=b3;q=0.9";

#[derive(Debug, Error)]
pub enum ScrapeError {
    #[error("HTTP status {0}")]
    Status(StatusCode),

    #[error("{0}")]
    Request(#[from] reqwest::Error),
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FetchedPage {
    pub status: u16,
    pub body: String,
    pub response_time_ms: u64,
    pub final_url: String, // After redirects
}

/// Fetches product pages with a browser-like header set.
#[derive(Debug, Clone)]
pub struct WebScraper {
    client: Client,
}

impl WebScraper {
    pub fn new(config: &ScraperConfig) -> Result<Self> {
        let client = Client::builder()
            .default_headers(browser_headers(config)?)
            .user_agent(config.user_agent.as_str())
            .timeout(Duration::from_secs(config.request_timeout))
            .build()?;

        Ok(Self { client })
    }

    /// One GET. 4xx and 5xx responses come back as [`ScrapeError::Status`].
    pub async fn fetch(&self, url: &str) -> std::result::Result<FetchedPage, ScrapeError> {
        let start_time = Instant::now();

        let response = self.client.get(url).send().await?;
        let status = response.status();
        if status.is_client_error() || status.is_server_error() {
            tracing::debug!(url, status = status.as_u16(), "Page fetch returned error status");
            return Err(ScrapeError::Status(status));
        }

        let final_url = response.url().to_string();
        let body = response.text().await?;

        let response_time_ms = start_time.elapsed().as_millis() as u64;
        tracing::debug!(url, response_time_ms, bytes = body.len(), "Fetched page");

        Ok(FetchedPage {
            status: status.as_u16(),
            body,
            response_time_ms,
            final_url,
        })
    }
}

fn browser_headers(config: &ScraperConfig) -> Result<HeaderMap> {
    let mut headers = HeaderMap::new();
    headers.insert(header::ACCEPT, HeaderValue::from_static(ACCEPT));
    headers.insert(
        header::ACCEPT_LANGUAGE,
        HeaderValue::from_str(&config.accept_language).map_err(|e| {
            AppError::Validation(format!("Invalid Accept-Language header: {}", e))
        })?,
    );
    headers.insert(header::CONNECTION, HeaderValue::from_static("keep-alive"));
    headers.insert(header::UPGRADE_INSECURE_REQUESTS, HeaderValue::from_static("1"));
    headers.insert(header::DNT, HeaderValue::from_static("1"));
    Ok(headers)
}
