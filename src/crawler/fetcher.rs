//! HTTP fetcher and response cache
//!
//! This module handles all HTTP requests for the crawler, including:
//! - Building the HTTP client with user agent, timeouts and default headers
//! - Classifying responses and transport errors
//! - Caching every result by URL so each URL is requested at most once
//! - Coalescing concurrent requests for the same URL into one network call
//! - Periodic durable snapshots of the cache

use crate::config::HttpConfig;
use crate::storage::{SharedStorage, SnapshotStore, StorageResult};
use reqwest::header::{HeaderMap, HeaderValue, ACCEPT_LANGUAGE};
use reqwest::{Client, StatusCode};
use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;
use tokio::sync::OnceCell;

/// Result of a fetch operation
///
/// Both variants are cached. Callers branch on the status; the cache never
/// retries.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FetchResult {
    /// The server answered, with any status code
    Response {
        /// HTTP status code
        status_code: u16,
        /// Response body (may be empty)
        body: String,
    },

    /// No response was received (connection refused, timeout, etc.)
    NetworkError {
        /// Error description
        error: String,
    },
}

impl FetchResult {
    /// Returns the body of a 2xx response
    pub fn success_body(&self) -> Option<&str> {
        match self {
            Self::Response { status_code, body }
                if StatusCode::from_u16(*status_code).is_ok_and(|s| s.is_success()) =>
            {
                Some(body)
            }
            _ => None,
        }
    }

    /// Returns true if the server reported the resource as missing
    pub fn is_not_found(&self) -> bool {
        matches!(
            self,
            Self::Response { status_code, .. } if *status_code == StatusCode::NOT_FOUND.as_u16()
                || *status_code == StatusCode::GONE.as_u16()
        )
    }

    /// Human-readable reason for a non-success result
    pub fn describe(&self) -> String {
        match self {
            Self::Response { status_code, .. } => format!("HTTP {}", status_code),
            Self::NetworkError { error } => error.clone(),
        }
    }
}

/// Builds an HTTP client with proper configuration
///
/// The client timeout bounds every fetch so a stalled connection cannot hang a
/// worker forever.
///
/// # Example
///
/// ```no_run
/// use catalog_harvest::config::HttpConfig;
/// use catalog_harvest::crawler::build_http_client;
///
/// let client = build_http_client(&HttpConfig::default()).unwrap();
/// ```
pub fn build_http_client(config: &HttpConfig) -> Result<Client, reqwest::Error> {
    let mut headers = HeaderMap::new();
    headers.insert(ACCEPT_LANGUAGE, HeaderValue::from_static("en-GB, en-US"));

    Client::builder()
        .user_agent(config.user_agent.as_str())
        .default_headers(headers)
        .timeout(Duration::from_secs(config.timeout_secs))
        .connect_timeout(Duration::from_secs(config.connect_timeout_secs))
        .gzip(true)
        .brotli(true)
        .build()
}

/// Performs one GET request and classifies the outcome
pub async fn fetch_url(client: &Client, url: &str) -> FetchResult {
    match client.get(url).send().await {
        Ok(response) => {
            let status_code = response.status().as_u16();
            match response.text().await {
                Ok(body) => FetchResult::Response { status_code, body },
                Err(e) => FetchResult::NetworkError {
                    error: format!("Failed to read body: {}", e),
                },
            }
        }
        Err(e) => {
            let error = if e.is_timeout() {
                "Request timeout".to_string()
            } else if e.is_connect() {
                format!("Connection failed: {}", e)
            } else {
                e.to_string()
            };
            FetchResult::NetworkError { error }
        }
    }
}

type Slot = Arc<OnceCell<FetchResult>>;

/// URL-keyed response cache with single-flight de-duplication
///
/// Every URL maps to a slot that is filled exactly once. The first caller for a
/// URL performs the request; concurrent callers await the same slot and receive
/// the same result, so there is at most one live request per URL.
pub struct FetchCache {
    client: Client,
    slots: Mutex<HashMap<String, Slot>>,
    unsaved: Mutex<Vec<String>>,
    storage: Option<SharedStorage>,
    flush_interval: usize,
    insertions: AtomicUsize,
    network_requests: AtomicUsize,
}

impl FetchCache {
    /// Creates an empty cache
    ///
    /// With `storage`, results settled since the previous snapshot are written
    /// out every `flush_interval` insertions.
    pub fn new(client: Client, storage: Option<SharedStorage>, flush_interval: usize) -> Self {
        Self {
            client,
            slots: Mutex::new(HashMap::new()),
            unsaved: Mutex::new(Vec::new()),
            storage,
            flush_interval: flush_interval.max(1),
            insertions: AtomicUsize::new(0),
            network_requests: AtomicUsize::new(0),
        }
    }

    /// Seeds the cache with results from a previous run
    ///
    /// Restored results are already stored and are not written back.
    pub fn restore(&self, entries: HashMap<String, FetchResult>) -> usize {
        let mut slots = self.slots.lock().unwrap_or_else(PoisonError::into_inner);
        let count = entries.len();
        for (url, result) in entries {
            slots.insert(url, Arc::new(OnceCell::new_with(Some(result))));
        }
        count
    }

    /// Returns the result for `url`, requesting it only if nobody has yet
    pub async fn fetch(&self, url: &str) -> FetchResult {
        let slot = {
            let mut slots = self.slots.lock().unwrap_or_else(PoisonError::into_inner);
            Arc::clone(slots.entry(url.to_string()).or_default())
        };

        let mut inserted = false;
        let result = slot
            .get_or_init(|| async {
                inserted = true;
                self.network_requests.fetch_add(1, Ordering::SeqCst);
                tracing::debug!("Fetching {}", url);
                let result = fetch_url(&self.client, url).await;
                if let FetchResult::NetworkError { error } = &result {
                    tracing::warn!("Request for {} failed: {}", url, error);
                }
                result
            })
            .await
            .clone();

        if inserted {
            self.record_insertion(url);
        }

        result
    }

    /// Counts an insertion and snapshots the cache every `flush_interval` of them
    fn record_insertion(&self, url: &str) {
        if self.storage.is_some() {
            self.unsaved
                .lock()
                .unwrap_or_else(PoisonError::into_inner)
                .push(url.to_string());
        }

        let count = self.insertions.fetch_add(1, Ordering::SeqCst) + 1;
        if count % self.flush_interval == 0 {
            if let Err(e) = self.snapshot() {
                tracing::error!("Failed to snapshot response cache: {}", e);
            }
        }
    }

    /// Number of requests that actually went to the network
    pub fn network_requests(&self) -> usize {
        self.network_requests.load(Ordering::SeqCst)
    }

    /// Number of URLs with a settled result
    pub fn len(&self) -> usize {
        self.slots
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .values()
            .filter(|slot| slot.initialized())
            .count()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Writes results settled since the last snapshot to the snapshot store
    ///
    /// Returns how many were handed to the store. On failure they stay pending
    /// for the next snapshot.
    pub fn snapshot(&self) -> StorageResult<usize> {
        let Some(storage) = &self.storage else {
            return Ok(0);
        };

        let urls = std::mem::take(&mut *self.unsaved.lock().unwrap_or_else(PoisonError::into_inner));
        if urls.is_empty() {
            return Ok(0);
        }

        let entries: Vec<(String, FetchResult)> = {
            let slots = self.slots.lock().unwrap_or_else(PoisonError::into_inner);
            urls.iter()
                .filter_map(|url| {
                    let result = slots.get(url)?.get()?;
                    Some((url.clone(), result.clone()))
                })
                .collect()
        };

        let saved = storage
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .save_responses(&entries);
        if let Err(e) = saved {
            self.unsaved
                .lock()
                .unwrap_or_else(PoisonError::into_inner)
                .extend(urls);
            return Err(e);
        }

        tracing::debug!("Snapshotted {} new responses", entries.len());
        Ok(entries.len())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::SqliteStorage;
    use futures::future::join_all;
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn client() -> Client {
        build_http_client(&HttpConfig::default()).unwrap()
    }

    #[test]
    fn test_build_http_client() {
        assert!(build_http_client(&HttpConfig::default()).is_ok());
    }

    #[test]
    fn test_fetch_result_classification() {
        let ok = FetchResult::Response {
            status_code: 200,
            body: "<html></html>".to_string(),
        };
        let missing = FetchResult::Response {
            status_code: 404,
            body: "Not here".to_string(),
        };
        let down = FetchResult::NetworkError {
            error: "Request timeout".to_string(),
        };

        assert_eq!(ok.success_body(), Some("<html></html>"));
        assert!(!ok.is_not_found());
        assert_eq!(missing.success_body(), None);
        assert!(missing.is_not_found());
        assert_eq!(missing.describe(), "HTTP 404");
        assert_eq!(down.success_body(), None);
        assert_eq!(down.describe(), "Request timeout");
    }

    #[tokio::test]
    async fn test_concurrent_fetches_share_one_request() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/page"))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_string("hello")
                    .set_delay(Duration::from_millis(100)),
            )
            .expect(1)
            .mount(&server)
            .await;

        let cache = FetchCache::new(client(), None, 256);
        let url = format!("{}/page", server.uri());

        let results = join_all((0..8).map(|_| cache.fetch(&url))).await;

        assert!(results.iter().all(|r| r.success_body() == Some("hello")));
        assert_eq!(cache.network_requests(), 1);
        assert_eq!(cache.len(), 1);
    }

    #[tokio::test]
    async fn test_not_found_is_cached() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/gone"))
            .respond_with(ResponseTemplate::new(404))
            .expect(1)
            .mount(&server)
            .await;

        let cache = FetchCache::new(client(), None, 256);
        let url = format!("{}/gone", server.uri());

        assert!(cache.fetch(&url).await.is_not_found());
        assert!(cache.fetch(&url).await.is_not_found());
        assert_eq!(cache.network_requests(), 1);
    }

    #[tokio::test]
    async fn test_restored_entries_skip_network() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(200))
            .expect(0)
            .mount(&server)
            .await;

        let url = format!("{}/cached", server.uri());
        let cache = FetchCache::new(client(), None, 256);
        let restored = cache.restore(HashMap::from([(
            url.clone(),
            FetchResult::Response {
                status_code: 200,
                body: "from snapshot".to_string(),
            },
        )]));

        assert_eq!(restored, 1);
        assert_eq!(cache.fetch(&url).await.success_body(), Some("from snapshot"));
        assert_eq!(cache.network_requests(), 0);
    }

    #[tokio::test]
    async fn test_periodic_snapshot() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(200).set_body_string("body"))
            .mount(&server)
            .await;

        let storage: SharedStorage =
            Arc::new(Mutex::new(SqliteStorage::open_in_memory().unwrap()));
        let cache = FetchCache::new(client(), Some(Arc::clone(&storage)), 2);

        cache.fetch(&format!("{}/a", server.uri())).await;
        assert_eq!(storage.lock().unwrap().count_cached_responses().unwrap(), 0);

        cache.fetch(&format!("{}/b", server.uri())).await;
        assert_eq!(storage.lock().unwrap().count_cached_responses().unwrap(), 2);
    }

    #[tokio::test]
    async fn test_snapshot_writes_only_new_results() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(200).set_body_string("body"))
            .mount(&server)
            .await;

        let storage: SharedStorage =
            Arc::new(Mutex::new(SqliteStorage::open_in_memory().unwrap()));
        let cache = FetchCache::new(client(), Some(Arc::clone(&storage)), 256);
        cache.restore(HashMap::from([(
            format!("{}/old", server.uri()),
            FetchResult::Response {
                status_code: 200,
                body: "from snapshot".to_string(),
            },
        )]));

        cache.fetch(&format!("{}/a", server.uri())).await;
        cache.fetch(&format!("{}/b", server.uri())).await;
        assert_eq!(cache.snapshot().unwrap(), 2);
        assert_eq!(cache.snapshot().unwrap(), 0);

        cache.fetch(&format!("{}/a", server.uri())).await;
        cache.fetch(&format!("{}/c", server.uri())).await;
        assert_eq!(cache.snapshot().unwrap(), 1);
        assert_eq!(storage.lock().unwrap().count_cached_responses().unwrap(), 3);
    }
}
