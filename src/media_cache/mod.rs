//! Media cache for S3 objects, with retrying fetches.
//!
//! GET requests to the storage origin are served from memory for
//! `max_age` after they were fetched. Past that, or on a miss, the object
//! is fetched again with a fixed-backoff retry loop; when every attempt
//! fails a stale copy is served if one exists, otherwise a synthetic 503.

use bytes::Bytes;
use chrono::{DateTime, Utc};
use reqwest::Method;
use std::collections::HashMap;
use std::time::Duration;
use tokio::sync::RwLock;
use tracing::{debug, info, warn};
use url::Url;

use crate::config::MediaCacheConfig;

/// Response header carrying the moment an entry entered the cache, in
/// milliseconds since the Unix epoch.
pub const CACHED_TIME_HEADER: &str = "cached-time";

#[derive(Debug, Clone)]
pub struct MediaCachePolicy {
    pub max_age: chrono::Duration,
    pub attempts: u32,
    pub backoff: Duration,
    pub max_entries: usize,
    pub max_bytes: usize,
}

impl Default for MediaCachePolicy {
    fn default() -> Self {
        Self {
            max_age: chrono::Duration::hours(24),
            attempts: 5,
            backoff: Duration::from_secs(5),
            max_entries: 512,
            max_bytes: 256 * 1024 * 1024,
        }
    }
}

impl MediaCachePolicy {
    pub fn from_config(config: &MediaCacheConfig) -> Self {
        Self {
            max_age: chrono::Duration::hours(config.max_age_hours),
            attempts: config.retry_attempts.max(1),
            backoff: Duration::from_secs(config.retry_backoff_secs),
            max_entries: config.max_entries.max(1),
            max_bytes: config.max_bytes,
        }
    }
}

#[derive(Debug, Clone)]
pub struct CachedMedia {
    pub status: u16,
    pub content_type: Option<String>,
    pub body: Bytes,
    pub cached_time: DateTime<Utc>,
}

impl CachedMedia {
    fn is_fresh(&self, now: DateTime<Utc>, max_age: chrono::Duration) -> bool {
        now < self.cached_time + max_age
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MediaSource {
    /// Fresh cache hit, no network.
    Cache,
    /// Fetched just now.
    Network,
    /// Network exhausted, served an expired entry.
    Stale,
    /// Network exhausted and nothing cached.
    Unavailable,
}

#[derive(Debug, Clone)]
pub struct MediaResponse {
    pub status: u16,
    pub content_type: Option<String>,
    pub body: Bytes,
    pub cached_time: Option<DateTime<Utc>>,
    pub source: MediaSource,
}

impl MediaResponse {
    fn from_cached(entry: &CachedMedia, source: MediaSource) -> Self {
        Self {
            status: entry.status,
            content_type: entry.content_type.clone(),
            body: entry.body.clone(),
            cached_time: Some(entry.cached_time),
            source,
        }
    }

    fn unavailable() -> Self {
        Self {
            status: 503,
            content_type: Some("text/plain".to_string()),
            body: Bytes::from_static(b"Network error"),
            cached_time: None,
            source: MediaSource::Unavailable,
        }
    }

    /// Value for the [`CACHED_TIME_HEADER`] header, if the response is tied
    /// to a cache entry.
    pub fn cached_time_header(&self) -> Option<String> {
        self.cached_time.map(|t| t.timestamp_millis().to_string())
    }
}

struct Fetched {
    status: u16,
    content_type: Option<String>,
    body: Bytes,
}

pub struct MediaCache {
    http: reqwest::Client,
    origin: Option<url::Origin>,
    policy: MediaCachePolicy,
    entries: RwLock<HashMap<String, CachedMedia>>,
}

impl MediaCache {
    pub fn new(http: reqwest::Client, storage_origin: &str, policy: MediaCachePolicy) -> Self {
        let origin = match Url::parse(storage_origin) {
            Ok(url) => Some(url.origin()),
            Err(e) => {
                warn!("Media cache disabled, bad storage origin {}: {}", storage_origin, e);
                None
            }
        };

        Self {
            http,
            origin,
            policy,
            entries: RwLock::new(HashMap::new()),
        }
    }

    /// Only GETs against the storage origin go through the cache.
    pub fn is_cacheable(&self, method: &Method, url: &Url) -> bool {
        *method == Method::GET && self.origin.as_ref() == Some(&url.origin())
    }

    /// Presigned URLs rotate their query string, so entries are keyed on
    /// the URL without it.
    pub fn cache_key(url: &Url) -> String {
        let mut key = url.clone();
        key.set_query(None);
        key.set_fragment(None);
        key.to_string()
    }

    pub async fn fetch(&self, url: &Url) -> MediaResponse {
        self.fetch_at(url, Utc::now()).await
    }

    pub async fn fetch_at(&self, url: &Url, now: DateTime<Utc>) -> MediaResponse {
        if !self.is_cacheable(&Method::GET, url) {
            return match self.fetch_once(url).await {
                Ok(fetched) => MediaResponse {
                    status: fetched.status,
                    content_type: fetched.content_type,
                    body: fetched.body,
                    cached_time: None,
                    source: MediaSource::Network,
                },
                Err(e) => {
                    warn!("Uncached fetch of {} failed: {}", url, e);
                    MediaResponse::unavailable()
                }
            };
        }

        let key = Self::cache_key(url);
        let cached = self.entries.read().await.get(&key).cloned();

        if let Some(entry) = &cached {
            if entry.is_fresh(now, self.policy.max_age) {
                debug!("Media cache hit for {}", key);
                return MediaResponse::from_cached(entry, MediaSource::Cache);
            }
        }

        match self.fetch_with_retry(url).await {
            Ok(fetched) => {
                let is_image = fetched
                    .content_type
                    .as_deref()
                    .map_or(false, |ct| ct.starts_with("image/"));

                if !is_image {
                    return MediaResponse {
                        status: fetched.status,
                        content_type: fetched.content_type,
                        body: fetched.body,
                        cached_time: None,
                        source: MediaSource::Network,
                    };
                }

                let entry = CachedMedia {
                    status: fetched.status,
                    content_type: fetched.content_type,
                    body: fetched.body,
                    cached_time: now,
                };
                let response = MediaResponse::from_cached(&entry, MediaSource::Network);
                self.insert(key, entry).await;
                response
            }
            Err(e) => match cached {
                Some(entry) => {
                    warn!("Serving stale {} after retries failed: {}", key, e);
                    MediaResponse::from_cached(&entry, MediaSource::Stale)
                }
                None => {
                    warn!("No cached copy of {} after retries failed: {}", key, e);
                    MediaResponse::unavailable()
                }
            },
        }
    }

    /// Up to `attempts` tries, `backoff` apart. Transport errors and
    /// non-2xx answers both count as failures.
    async fn fetch_with_retry(&self, url: &Url) -> Result<Fetched, String> {
        let mut last_error = String::new();

        for attempt in 1..=self.policy.attempts {
            match self.fetch_once(url).await {
                Ok(fetched) if (200..300).contains(&fetched.status) => return Ok(fetched),
                Ok(fetched) => last_error = format!("status {}", fetched.status),
                Err(e) => last_error = e,
            }

            debug!("Attempt {}/{} for {} failed: {}", attempt, self.policy.attempts, url, last_error);
            if attempt < self.policy.attempts {
                tokio::time::sleep(self.policy.backoff).await;
            }
        }

        Err(last_error)
    }

    async fn fetch_once(&self, url: &Url) -> Result<Fetched, String> {
        let response = self.http.get(url.clone()).send().await.map_err(|e| e.to_string())?;
        let status = response.status().as_u16();
        let content_type = response
            .headers()
            .get(reqwest::header::CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .map(str::to_string);
        let body = response.bytes().await.map_err(|e| e.to_string())?;

        Ok(Fetched { status, content_type, body })
    }

    /// Adds `entry`, evicting the oldest entries until both the entry
    /// count and the byte budget fit. Bodies larger than the whole budget
    /// are not kept.
    async fn insert(&self, key: String, entry: CachedMedia) {
        let size = entry.body.len();
        if size > self.policy.max_bytes {
            debug!("{} is {} bytes, over the cache budget; not stored", key, size);
            return;
        }

        let mut entries = self.entries.write().await;
        entries.remove(&key);

        let mut held: usize = entries.values().map(|e| e.body.len()).sum();
        while !entries.is_empty()
            && (entries.len() >= self.policy.max_entries || held + size > self.policy.max_bytes)
        {
            let oldest = entries
                .iter()
                .min_by_key(|(_, e)| e.cached_time)
                .map(|(k, _)| k.clone());
            let Some(oldest) = oldest else { break };
            if let Some(evicted) = entries.remove(&oldest) {
                held -= evicted.body.len();
            }
            info!("Media cache full, evicted {}", oldest);
        }

        entries.insert(key, entry);
    }

    /// Total body bytes currently held.
    pub async fn size_bytes(&self) -> usize {
        self.entries.read().await.values().map(|e| e.body.len()).sum()
    }

    pub async fn len(&self) -> usize {
        self.entries.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.entries.read().await.is_empty()
    }
}
