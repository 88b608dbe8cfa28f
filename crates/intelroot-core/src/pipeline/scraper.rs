//! Scraper seam and plumbing HTTP fetcher
//!
//! Content extraction heuristics belong to external collaborators; the
//! built-in fetcher only retrieves the page body over HTTP.

use crate::error::{IntelrootError, Result};
use async_trait::async_trait;
use std::time::Duration;

/// Minimum body length before a fetch counts as usable content
const MIN_CONTENT_CHARS: usize = 100;

/// Fetches document text for the scrape stage
#[async_trait]
pub trait Scraper: Send + Sync {
    async fn scrape(&self, url: &str) -> Result<String>;
}

/// Plumbing scraper: fetch the page with browser-like headers and return
/// its body. Sites behind aggressive WAFs 403 plain client UAs.
pub struct HttpScraper {
    http: reqwest::Client,
}

impl HttpScraper {
    pub fn new(request_timeout_secs: u64) -> Result<Self> {
        let mut headers = reqwest::header::HeaderMap::new();
        headers.insert(
            reqwest::header::ACCEPT,
            "text/html,application/xhtml+xml,application/xml;q=0.9,*/*;q=0.8"
                .parse()
                .expect("static header"),
        );
        headers.insert(
            reqwest::header::ACCEPT_LANGUAGE,
            "en-US,en;q=0.9".parse().expect("static header"),
        );

        let http = reqwest::Client::builder()
            .user_agent(
                "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 \
                 (KHTML, like Gecko) Chrome/131.0.0.0 Safari/537.36",
            )
            .default_headers(headers)
            .timeout(Duration::from_secs(request_timeout_secs))
            .build()?;
        Ok(Self { http })
    }
}

#[async_trait]
impl Scraper for HttpScraper {
    async fn scrape(&self, url: &str) -> Result<String> {
        let response = self.http.get(url).send().await?;
        if !response.status().is_success() {
            return Err(IntelrootError::Scrape(format!(
                "HTTP {} for {url}",
                response.status()
            )));
        }

        let body = response.text().await?;
        if body.chars().count() < MIN_CONTENT_CHARS {
            return Err(IntelrootError::Scrape(format!("content too short for {url}")));
        }
        Ok(body)
    }
}
