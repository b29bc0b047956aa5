//! Shared HTTP client with per-host request pacing.
//!
//! Every request goes through [`Fetcher`], which waits on a [`HostPacer`]
//! before sending. The pacer hands out send slots per host, at least the
//! configured delay apart, so concurrent crawl targets that hit the same
//! host are serialized while requests to different hosts proceed freely.
//! Nothing is retried: a failed request is reported once and dropped.

use crate::config::{CrawlConfig, RequestKind};
use crate::error::FetchError;
use reqwest::header::{ACCEPT, ACCEPT_LANGUAGE, CONTENT_TYPE, HeaderMap, HeaderValue, USER_AGENT};
use reqwest::{Client, Response};
use std::collections::HashMap;
use std::time::Duration;
use tokio::sync::Mutex;
use tokio::time::{Instant, sleep_until};
use tracing::{debug, instrument};
use url::Url;

/// Hands out the earliest permitted send time per host.
#[derive(Debug, Default)]
pub struct HostPacer {
    next_slot: Mutex<HashMap<String, Instant>>,
}

impl HostPacer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Wait until a request to `host` may be sent, reserving the following
    /// slot `delay` later. The first request to a host goes out immediately.
    pub async fn until_ready(&self, host: &str, delay: Duration) {
        let slot = {
            let mut next = self.next_slot.lock().await;
            let now = Instant::now();
            let slot = next.get(host).copied().filter(|t| *t > now).unwrap_or(now);
            next.insert(host.to_string(), slot + delay);
            slot
        };
        if slot > Instant::now() {
            debug!(host, wait_ms = (slot - Instant::now()).as_millis() as u64, "Pacing request");
        }
        sleep_until(slot).await;
    }
}

/// Raw bytes of a fetched resource with its declared content type.
#[derive(Debug)]
pub struct FetchedBytes {
    pub content_type: Option<String>,
    pub bytes: Vec<u8>,
}

#[derive(Debug)]
pub struct Fetcher {
    client: Client,
    pacer: HostPacer,
    crawl: CrawlConfig,
}

impl Fetcher {
    pub fn new(crawl: &CrawlConfig) -> Result<Self, reqwest::Error> {
        let mut headers = HeaderMap::new();
        headers.insert(
            ACCEPT,
            HeaderValue::from_static("text/html,application/xhtml+xml,application/xml;q=0.9,image/webp,*/*;q=0.8"),
        );
        headers.insert(ACCEPT_LANGUAGE, HeaderValue::from_static("en-US,en;q=0.5"));

        let client = Client::builder()
            .timeout(Duration::from_secs(crawl.request_timeout_secs))
            .default_headers(headers)
            .build()?;

        Ok(Self {
            client,
            pacer: HostPacer::new(),
            crawl: crawl.clone(),
        })
    }

    /// GET `url` and return the body as text.
    #[instrument(level = "debug", skip(self), fields(%url))]
    pub async fn get_text(&self, url: &Url, kind: RequestKind) -> Result<String, FetchError> {
        let response = self.send(url, kind).await?;
        response.text().await.map_err(|source| FetchError::Transport {
            url: url.to_string(),
            source,
        })
    }

    /// GET `url` and return the raw body with its `Content-Type`.
    #[instrument(level = "debug", skip(self), fields(%url))]
    pub async fn get_bytes(&self, url: &Url, kind: RequestKind) -> Result<FetchedBytes, FetchError> {
        let response = self.send(url, kind).await?;
        let content_type = response
            .headers()
            .get(CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .map(str::to_string);
        let bytes = response.bytes().await.map_err(|source| FetchError::Transport {
            url: url.to_string(),
            source,
        })?;
        Ok(FetchedBytes {
            content_type,
            bytes: bytes.to_vec(),
        })
    }

    async fn send(&self, url: &Url, kind: RequestKind) -> Result<Response, FetchError> {
        let host = url
            .host_str()
            .ok_or_else(|| FetchError::InvalidUrl(url.to_string()))?;
        self.pacer.until_ready(host, self.crawl.delay(kind)).await;

        let response = self
            .client
            .get(url.clone())
            .header(USER_AGENT, self.crawl.user_agent(kind))
            .send()
            .await
            .map_err(|source| FetchError::Transport {
                url: url.to_string(),
                source,
            })?;

        let status = response.status();
        if !status.is_success() {
            return Err(FetchError::Status {
                url: url.to_string(),
                status,
            });
        }
        debug!(%status, "Fetched");
        Ok(response)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::serve;
    use axum::Router;
    use axum::http::StatusCode;
    use axum::routing::get;

    #[tokio::test]
    async fn test_pacer_spaces_same_host_only() {
        let pacer = HostPacer::new();
        let delay = Duration::from_millis(60);
        let t0 = Instant::now();

        pacer.until_ready("a.example", delay).await;
        pacer.until_ready("b.example", delay).await;
        assert!(t0.elapsed() < delay, "first request per host must not wait");

        pacer.until_ready("a.example", delay).await;
        pacer.until_ready("a.example", delay).await;
        assert!(t0.elapsed() >= delay * 2);
    }

    #[tokio::test]
    async fn test_concurrent_waiters_get_distinct_slots() {
        let pacer = HostPacer::new();
        let delay = Duration::from_millis(40);
        let t0 = Instant::now();
        futures::future::join_all((0..3).map(|_| pacer.until_ready("same.example", delay))).await;
        assert!(t0.elapsed() >= delay * 2);
    }

    #[tokio::test]
    async fn test_non_success_status_is_fetch_error() {
        let app = Router::new()
            .route("/ok", get(|| async { "hello" }))
            .route("/missing", get(|| async { StatusCode::NOT_FOUND }));
        let base = serve(app).await;
        let mut crawl = CrawlConfig::default();
        crawl.delays_ms.editorial = 0;
        let fetcher = Fetcher::new(&crawl).unwrap();

        let body = fetcher
            .get_text(&base.join("/ok").unwrap(), RequestKind::Editorial)
            .await
            .unwrap();
        assert_eq!(body, "hello");

        let err = fetcher
            .get_text(&base.join("/missing").unwrap(), RequestKind::Editorial)
            .await
            .unwrap_err();
        assert!(matches!(err, FetchError::Status { status, .. } if status == reqwest::StatusCode::NOT_FOUND));
    }
}
