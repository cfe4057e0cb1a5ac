//! Outbound page fetching for the job-description and company-crawl steps.
//!
//! Every fetch goes through `PageFetcher`, so pipeline code never touches HTTP
//! directly and tests can serve canned pages.

use std::time::Duration;

use anyhow::Context;
use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use thiserror::Error;
use tracing::{info, warn};
use url::Url;

use crate::errors::AppError;

pub mod crawl;
pub mod html;

const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);
const USER_AGENT: &str = "Mozilla/5.0 (X11; Linux x86_64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/120.0.0.0 Safari/537.36";

/// Some job boards answer 202 while they render the posting; poll this many times.
const MAX_ACCEPTED_POLLS: u32 = 10;
const ACCEPTED_POLL_DELAY: Duration = Duration::from_secs(5);

#[derive(Debug, Error)]
pub enum ScrapeError {
    #[error("request to {url} failed: {source}")]
    Request {
        url: String,
        #[source]
        source: reqwest::Error,
    },

    #[error("{url} returned HTTP {status}")]
    Status { url: String, status: u16 },

    #[error("{url} was still processing after {attempts} attempts")]
    StillProcessing { url: String, attempts: u32 },

    #[error("no readable text found at {url}")]
    Empty { url: String },
}

impl From<ScrapeError> for AppError {
    fn from(err: ScrapeError) -> Self {
        AppError::Scrape(err.to_string())
    }
}

/// Fetches a page body as text.
#[async_trait]
pub trait PageFetcher: Send + Sync {
    async fn fetch(&self, url: &Url) -> Result<String, ScrapeError>;
}

pub struct HttpFetcher {
    client: Client,
    max_polls: u32,
    poll_delay: Duration,
}

impl HttpFetcher {
    pub fn new() -> anyhow::Result<Self> {
        let client = Client::builder()
            .user_agent(USER_AGENT)
            .timeout(REQUEST_TIMEOUT)
            .build()
            .context("Failed to build scraping HTTP client")?;

        Ok(Self {
            client,
            max_polls: MAX_ACCEPTED_POLLS,
            poll_delay: ACCEPTED_POLL_DELAY,
        })
    }
}

#[async_trait]
impl PageFetcher for HttpFetcher {
    async fn fetch(&self, url: &Url) -> Result<String, ScrapeError> {
        info!("Fetching {}", url);

        for attempt in 1..=self.max_polls {
            let response = self
                .client
                .get(url.clone())
                .send()
                .await
                .map_err(|source| ScrapeError::Request {
                    url: url.to_string(),
                    source,
                })?;

            let status = response.status();
            if status == StatusCode::ACCEPTED {
                warn!(
                    "Attempt {}: {} still processing, waiting {}s",
                    attempt,
                    url,
                    self.poll_delay.as_secs()
                );
                tokio::time::sleep(self.poll_delay).await;
                continue;
            }

            if !status.is_success() {
                return Err(ScrapeError::Status {
                    url: url.to_string(),
                    status: status.as_u16(),
                });
            }

            return response.text().await.map_err(|source| ScrapeError::Request {
                url: url.to_string(),
                source,
            });
        }

        Err(ScrapeError::StillProcessing {
            url: url.to_string(),
            attempts: self.max_polls,
        })
    }
}

#[cfg(test)]
pub mod testing {
    //! In-memory fetcher serving canned pages.

    use std::collections::HashMap;
    use std::sync::{Arc, Mutex};

    use super::*;

    #[derive(Default)]
    pub struct StaticFetcher {
        pages: Mutex<HashMap<String, String>>,
        fetched: Mutex<Vec<String>>,
    }

    impl StaticFetcher {
        pub fn new() -> Arc<Self> {
            Arc::new(Self::default())
        }

        pub fn page(&self, url: &str, html: &str) -> &Self {
            let key = Url::parse(url).unwrap().to_string();
            self.pages.lock().unwrap().insert(key, html.to_string());
            self
        }

        pub fn fetched(&self) -> Vec<String> {
            self.fetched.lock().unwrap().clone()
        }
    }

    #[async_trait]
    impl PageFetcher for StaticFetcher {
        async fn fetch(&self, url: &Url) -> Result<String, ScrapeError> {
            self.fetched.lock().unwrap().push(url.to_string());
            self.pages
                .lock()
                .unwrap()
                .get(url.as_str())
                .cloned()
                .ok_or_else(|| ScrapeError::Status {
                    url: url.to_string(),
                    status: 404,
                })
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_scrape_errors_map_to_bad_gateway_variant() {
        let err: AppError = ScrapeError::Status {
            url: "https://jobs.example.com/1".to_string(),
            status: 503,
        }
        .into();
        assert!(matches!(err, AppError::Scrape(ref m) if m.contains("HTTP 503")));
    }

    #[test]
    fn test_http_fetcher_polls_ten_times() {
        let fetcher = HttpFetcher::new().unwrap();
        assert_eq!(fetcher.max_polls, 10);
        assert_eq!(fetcher.poll_delay, Duration::from_secs(5));
    }
}
