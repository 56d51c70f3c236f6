//! Upstream subscription feeds
//!
//! Retrieves the raw descriptor lines the pipeline consumes. Feeds are
//! usually published as a base64 envelope around newline-separated
//! descriptors; the envelope is stripped here so the core only ever sees
//! per-descriptor scheme prefixes. A feed that fails to fetch contributes
//! nothing and never aborts the run.

use crate::error::{FetchError, Result};
use base64::engine::general_purpose::STANDARD;
use base64::Engine as _;
use std::time::Duration;

/// Fetcher for subscription feeds
pub struct FeedFetcher {
    http: reqwest::Client,
}

impl FeedFetcher {
    /// Create a fetcher with the given per-request timeout
    pub fn new(timeout: Duration) -> Result<Self> {
        let http = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(FetchError::Http)?;

        Ok(Self { http })
    }

    /// Fetch every feed and concatenate their descriptor lines.
    ///
    /// Per-feed failures are logged and skipped.
    pub async fn fetch_all(&self, urls: &[String]) -> Vec<String> {
        let mut lines = Vec::new();

        for url in urls {
            match self.fetch_feed(url).await {
                Ok(feed_lines) => {
                    tracing::info!("Fetched {} lines from {}", feed_lines.len(), url);
                    lines.extend(feed_lines);
                }
                Err(e) => {
                    tracing::warn!("Skipping feed {}: {}", url, e);
                }
            }
        }

        lines
    }

    /// Fetch one feed and split it into descriptor lines
    pub async fn fetch_feed(&self, url: &str) -> Result<Vec<String>> {
        let response = self.http.get(url).send().await.map_err(FetchError::Http)?;

        let status = response.status();
        if !status.is_success() {
            return Err(FetchError::BadStatus(status.as_u16()).into());
        }

        let body = response.text().await.map_err(FetchError::Http)?;
        Ok(split_lines(&unwrap_envelope(&body)))
    }
}

/// Strip a feed-level base64 envelope if present.
///
/// A body counts as enveloped iff the whitespace-trimmed text strictly
/// decodes as base64 into valid UTF-8; anything else is consumed as plain
/// newline-separated text.
fn unwrap_envelope(body: &str) -> String {
    let trimmed: String = body.split_whitespace().collect();

    match STANDARD.decode(trimmed.as_bytes()) {
        Ok(decoded) => match String::from_utf8(decoded) {
            Ok(text) => text,
            Err(_) => body.to_string(),
        },
        Err(_) => body.to_string(),
    }
}

fn split_lines(text: &str) -> Vec<String> {
    text.lines()
        .map(|l| l.trim().to_string())
        .filter(|l| !l.is_empty())
        .collect()
}
