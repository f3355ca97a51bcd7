//! Remote module loader with a process-lifetime cache.
//!
//! DESIGN
//! ======
//! `ModuleFetcher` is the network seam: production uses `HttpFetcher`
//! (reqwest), tests inject fakes. `ModuleLoader` fronts it with a URL-keyed
//! cache that is never invalidated, only optionally bounded (LRU). A module
//! is cached only after a 2xx response that passes any pinned integrity
//! check, so failures are retried on the next build.
//!
//! Concurrent misses on the same URL share one in-flight fetch. A failed
//! fetch is not shared: each waiter that finds the slot still empty tries
//! again.

use std::collections::HashMap;
use std::num::NonZeroUsize;
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

use async_trait::async_trait;
use lru::LruCache;
use sha2::{Digest, Sha256};
use tokio::sync::OnceCell;
use tracing::{debug, warn};

use crate::config::CompilerConfig;
use crate::error::ErrorCode;

const CONNECT_TIMEOUT_SECS: u64 = 10;

// =============================================================================
// ERRORS
// =============================================================================

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum LoaderError {
    /// Transport failure before any response arrived.
    #[error("Failed to load dependency: {url}")]
    Request { url: String, reason: String },

    /// The server answered with a non-success status.
    #[error("Failed to load dependency: {url}")]
    Status { url: String, status: u16 },

    /// The body did not match the pinned SHA-256 digest.
    #[error("Integrity check failed for dependency: {url}")]
    Integrity { url: String, expected: String, actual: String },

    #[error("HTTP client build failed: {0}")]
    HttpClientBuild(String),
}

impl ErrorCode for LoaderError {
    fn error_code(&self) -> &'static str {
        match self {
            Self::Request { .. } => "E_FETCH_REQUEST",
            Self::Status { .. } => "E_FETCH_STATUS",
            Self::Integrity { .. } => "E_INTEGRITY",
            Self::HttpClientBuild(_) => "E_HTTP_CLIENT_BUILD",
        }
    }

    fn retryable(&self) -> bool {
        matches!(self, Self::Request { .. } | Self::Status { status: 429 | 500..=599, .. })
    }
}

// =============================================================================
// FETCHER
// =============================================================================

/// Raw HTTP result, before status and integrity checks.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FetchedModule {
    pub status: u16,
    pub body: String,
}

#[async_trait]
pub trait ModuleFetcher: Send + Sync {
    /// GET `url` and return status plus body text.
    ///
    /// # Errors
    ///
    /// Returns [`LoaderError::Request`] when no response could be read.
    async fn fetch(&self, url: &str) -> Result<FetchedModule, LoaderError>;
}

/// reqwest-backed fetcher.
pub struct HttpFetcher {
    http: reqwest::Client,
}

impl HttpFetcher {
    /// # Errors
    ///
    /// Returns [`LoaderError::HttpClientBuild`] if the TLS backend fails to
    /// initialize.
    pub fn new(timeout: Option<Duration>) -> Result<Self, LoaderError> {
        let mut builder = reqwest::Client::builder().connect_timeout(Duration::from_secs(CONNECT_TIMEOUT_SECS));
        if let Some(timeout) = timeout {
            builder = builder.timeout(timeout);
        }
        let http = builder.build().map_err(|e| LoaderError::HttpClientBuild(e.to_string()))?;
        Ok(Self { http })
    }
}

#[async_trait]
impl ModuleFetcher for HttpFetcher {
    async fn fetch(&self, url: &str) -> Result<FetchedModule, LoaderError> {
        let request_err = |e: reqwest::Error| LoaderError::Request { url: url.to_owned(), reason: e.to_string() };
        let response = self.http.get(url).send().await.map_err(request_err)?;
        let status = response.status().as_u16();
        let body = response.text().await.map_err(request_err)?;
        Ok(FetchedModule { status, body })
    }
}

// =============================================================================
// CACHE
// =============================================================================

/// A fetched module ready to hand to the toolchain.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CachedModule {
    pub contents: String,
    /// The module URL's directory; base for its relative imports.
    pub resolve_dir: String,
}

enum Entries {
    Unbounded(HashMap<String, Arc<CachedModule>>),
    Bounded(LruCache<String, Arc<CachedModule>>),
}

/// URL-keyed module cache, unbounded unless given a capacity.
pub struct ModuleCache {
    entries: Mutex<Entries>,
}

impl ModuleCache {
    #[must_use]
    pub fn new(capacity: Option<usize>) -> Self {
        let entries = match capacity.and_then(NonZeroUsize::new) {
            Some(capacity) => Entries::Bounded(LruCache::new(capacity)),
            None => Entries::Unbounded(HashMap::new()),
        };
        Self { entries: Mutex::new(entries) }
    }

    /// Look up `url`, marking it most recently used when bounded.
    #[must_use]
    pub fn get(&self, url: &str) -> Option<Arc<CachedModule>> {
        let mut entries = self.entries.lock().unwrap_or_else(PoisonError::into_inner);
        match &mut *entries {
            Entries::Unbounded(map) => map.get(url).cloned(),
            Entries::Bounded(lru) => lru.get(url).cloned(),
        }
    }

    pub fn insert(&self, url: &str, module: Arc<CachedModule>) {
        let mut entries = self.entries.lock().unwrap_or_else(PoisonError::into_inner);
        match &mut *entries {
            Entries::Unbounded(map) => {
                map.insert(url.to_owned(), module);
            }
            Entries::Bounded(lru) => {
                if let Some((evicted, _)) = lru.push(url.to_owned(), module) {
                    if evicted != url {
                        debug!(url = %evicted, "module cache evicted");
                    }
                }
            }
        }
    }

    #[must_use]
    pub fn len(&self) -> usize {
        match &*self.entries.lock().unwrap_or_else(PoisonError::into_inner) {
            Entries::Unbounded(map) => map.len(),
            Entries::Bounded(lru) => lru.len(),
        }
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

// =============================================================================
// LOADER
// =============================================================================

type Flight = Arc<OnceCell<Arc<CachedModule>>>;

pub struct ModuleLoader {
    fetcher: Arc<dyn ModuleFetcher>,
    cache: ModuleCache,
    integrity: HashMap<String, String>,
    /// Fetches currently running, by URL.
    in_flight: Mutex<HashMap<String, Flight>>,
}

impl ModuleLoader {
    #[must_use]
    pub fn new(fetcher: Arc<dyn ModuleFetcher>, config: &CompilerConfig) -> Self {
        Self {
            fetcher,
            cache: ModuleCache::new(config.module_cache_capacity),
            integrity: config.pinned_integrity.clone(),
            in_flight: Mutex::new(HashMap::new()),
        }
    }

    /// Loader backed by [`HttpFetcher`].
    ///
    /// # Errors
    ///
    /// Returns [`LoaderError::HttpClientBuild`] if the client cannot be built.
    pub fn from_config(config: &CompilerConfig) -> Result<Self, LoaderError> {
        let fetcher = HttpFetcher::new(config.fetch_timeout)?;
        Ok(Self::new(Arc::new(fetcher), config))
    }

    #[must_use]
    pub fn cache(&self) -> &ModuleCache {
        &self.cache
    }

    /// Return the module at `url`, fetching it on a cache miss.
    ///
    /// # Errors
    ///
    /// Transport failures, non-2xx responses and integrity mismatches. None
    /// of these are cached.
    pub async fn load(&self, url: &str) -> Result<Arc<CachedModule>, LoaderError> {
        if let Some(hit) = self.cache.get(url) {
            debug!(%url, "module cache hit");
            return Ok(hit);
        }

        let flight = self.join_flight(url);
        let result = flight.get_or_try_init(|| self.fetch_and_cache(url)).await.cloned();
        self.leave_flight(url, &flight);
        result
    }

    fn join_flight(&self, url: &str) -> Flight {
        let mut in_flight = self.in_flight.lock().unwrap_or_else(PoisonError::into_inner);
        Arc::clone(in_flight.entry(url.to_owned()).or_default())
    }

    fn leave_flight(&self, url: &str, flight: &Flight) {
        let mut in_flight = self.in_flight.lock().unwrap_or_else(PoisonError::into_inner);
        if in_flight.get(url).is_some_and(|current| Arc::ptr_eq(current, flight)) {
            in_flight.remove(url);
        }
    }

    async fn fetch_and_cache(&self, url: &str) -> Result<Arc<CachedModule>, LoaderError> {
        // a flight that finished between our miss and our join
        if let Some(hit) = self.cache.get(url) {
            return Ok(hit);
        }
        let fetched = self.fetcher.fetch(url).await.inspect_err(|e| {
            warn!(%url, error = %e, code = e.error_code(), "module fetch failed");
        })?;
        if !(200..300).contains(&fetched.status) {
            warn!(%url, status = fetched.status, "module fetch returned non-success status");
            return Err(LoaderError::Status { url: url.to_owned(), status: fetched.status });
        }
        self.verify_integrity(url, &fetched.body)?;

        let module = Arc::new(CachedModule { resolve_dir: resolve_dir(url), contents: fetched.body });
        self.cache.insert(url, Arc::clone(&module));
        debug!(%url, bytes = module.contents.len(), "module fetched");
        Ok(module)
    }

    fn verify_integrity(&self, url: &str, body: &str) -> Result<(), LoaderError> {
        let Some(expected) = self.integrity.get(url) else {
            return Ok(());
        };
        let actual = sha256_hex(body.as_bytes());
        if &actual == expected {
            return Ok(());
        }
        warn!(%url, %expected, %actual, "module integrity mismatch");
        Err(LoaderError::Integrity { url: url.to_owned(), expected: expected.clone(), actual })
    }
}

/// Directory of a module URL (`https://cdn/a/b.mjs` -> `https://cdn/a/`).
#[must_use]
pub fn resolve_dir(url: &str) -> String {
    url::Url::parse(url)
        .and_then(|u| u.join("."))
        .map_or_else(|_| url.to_owned(), |dir| dir.to_string())
}

/// Lowercase hex SHA-256 of `bytes`.
#[must_use]
pub fn sha256_hex(bytes: &[u8]) -> String {
    Sha256::digest(bytes).iter().map(|b| format!("{b:02x}")).collect()
}

#[cfg(test)]
#[path = "loader_test.rs"]
mod tests;
