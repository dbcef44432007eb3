//! Offline asset cache.
//!
//! Sits between the app and the network the way a page's background worker
//! would: it pre-caches the app shell on install, drops stale buckets on
//! activate and then answers every request with one of two policies.
//!
//! * `.js` / `.css`: network first, refreshing the cached copy on success.
//! * everything else: cache first, falling back to the network and, for
//!   page navigations, to the cached shell page.

use async_trait::async_trait;
use futures::future::try_join_all;
use rusqlite::Connection;
use std::time::Duration;
use strum_macros::{Display, EnumString};
use thiserror::Error;
use tracing::{debug, error, info, warn};
use url::Url;

use crate::db::{self, StoredResponse};

/// The application shell needed to run offline.
pub const ASSET_MANIFEST: &[&str] = &[
    "./",
    "./index.html",
    "./style.css",
    "./script.js",
    "./manifest.json",
    "./icon-192.png",
    "./icon-512.png",
];

/// Served in place of any navigation that cannot reach the network.
pub const SHELL_PAGE: &str = "./index.html";

const NETWORK_FIRST_SUFFIXES: &[&str] = &[".js", ".css"];

#[derive(Error, Debug)]
pub enum CacheError {
    #[error("Invalid asset path '{path}': {source}")]
    InvalidPath {
        path: String,
        source: url::ParseError,
    },
    #[error("Install failed: could not fetch {url}: {reason}")]
    InstallFetch { url: String, reason: String },
    #[error("Install failed: {url} returned status {status}")]
    InstallStatus { url: String, status: u16 },
    #[error("Cannot activate before a successful install")]
    NotInstalled,
    #[error("Network request for {url} failed: {reason}")]
    Network { url: String, reason: String },
    #[error("{0} is not cached and the network is unavailable")]
    Unavailable(String),
    #[error("Cache storage error: {0}")]
    Storage(#[from] db::Error),
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("{0}")]
pub struct FetchError(pub String);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Display, EnumString)]
#[strum(serialize_all = "UPPERCASE", ascii_case_insensitive)]
pub enum Method {
    #[default]
    Get,
    Head,
    Post,
    Put,
    Patch,
    Delete,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum RequestMode {
    /// Sub-resource load (script, stylesheet, image, data).
    #[default]
    Subresource,
    /// Top-level page navigation.
    Navigate,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Request {
    pub url: Url,
    pub method: Method,
    pub mode: RequestMode,
}

impl Request {
    #[must_use]
    pub fn new(mut url: Url, method: Method, mode: RequestMode) -> Self {
        url.set_fragment(None);
        Self { url, method, mode }
    }

    #[must_use]
    pub fn get(url: Url) -> Self {
        Self::new(url, Method::Get, RequestMode::Subresource)
    }

    #[must_use]
    pub fn navigate(url: Url) -> Self {
        Self::new(url, Method::Get, RequestMode::Navigate)
    }

    /// Key under which the response for this request is cached.
    #[must_use]
    pub fn cache_key(&self) -> &str {
        self.url.as_str()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResponseSource {
    Network,
    Cache,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Response {
    pub url: Url,
    pub status: u16,
    pub content_type: Option<String>,
    pub body: Vec<u8>,
    pub source: ResponseSource,
}

impl Response {
    #[must_use]
    pub fn is_ok(&self) -> bool {
        (200..300).contains(&self.status)
    }

    fn to_stored(&self) -> StoredResponse {
        StoredResponse {
            status: self.status,
            content_type: self.content_type.clone(),
            body: self.body.clone(),
        }
    }

    fn from_stored(url: Url, stored: StoredResponse) -> Self {
        Self {
            url,
            status: stored.status,
            content_type: stored.content_type,
            body: stored.body,
            source: ResponseSource::Cache,
        }
    }
}

/// Where outbound requests actually go.
#[async_trait]
pub trait Fetcher: Send + Sync {
    async fn fetch(&self, request: &Request) -> Result<Response, FetchError>;
}

pub struct HttpFetcher {
    client: reqwest::Client,
}

impl HttpFetcher {
    /// # Errors
    /// Returns `reqwest::Error` if the client cannot be built.
    pub fn new(timeout: Duration) -> Result<Self, reqwest::Error> {
        let client = reqwest::Client::builder().timeout(timeout).build()?;
        Ok(Self { client })
    }
}

#[async_trait]
impl Fetcher for HttpFetcher {
    async fn fetch(&self, request: &Request) -> Result<Response, FetchError> {
        let method = match request.method {
            Method::Get => reqwest::Method::GET,
            Method::Head => reqwest::Method::HEAD,
            Method::Post => reqwest::Method::POST,
            Method::Put => reqwest::Method::PUT,
            Method::Patch => reqwest::Method::PATCH,
            Method::Delete => reqwest::Method::DELETE,
        };
        let response = self
            .client
            .request(method, request.url.clone())
            .send()
            .await
            .map_err(|e| FetchError(e.to_string()))?;

        let status = response.status().as_u16();
        let content_type = response
            .headers()
            .get(reqwest::header::CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .map(str::to_string);
        let body = response
            .bytes()
            .await
            .map_err(|e| FetchError(e.to_string()))?
            .to_vec();

        Ok(Response {
            url: request.url.clone(),
            status,
            content_type,
            body,
            source: ResponseSource::Network,
        })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Display)]
#[strum(serialize_all = "lowercase")]
pub enum LifecycleState {
    Installing,
    Activating,
    Active,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Strategy {
    Passthrough,
    NetworkFirst,
    CacheFirst,
}

/// Chooses how a request is served, from its method and URL suffix.
#[must_use]
pub fn route(request: &Request) -> Strategy {
    if request.method != Method::Get {
        return Strategy::Passthrough;
    }
    let url = request.url.as_str();
    if NETWORK_FIRST_SUFFIXES.iter().any(|s| url.ends_with(s)) {
        Strategy::NetworkFirst
    } else {
        Strategy::CacheFirst
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CacheStatus {
    pub state: LifecycleState,
    pub current_bucket: String,
    /// Every bucket in storage with its entry count.
    pub buckets: Vec<(String, usize)>,
}

pub struct AssetCache<F: Fetcher> {
    conn: Connection,
    cache_name: String,
    manifest: Vec<Url>,
    shell: Url,
    fetcher: F,
    state: LifecycleState,
}

fn resolve(base: &Url, path: &str) -> Result<Url, CacheError> {
    base.join(path).map_err(|source| CacheError::InvalidPath {
        path: path.to_string(),
        source,
    })
}

impl<F: Fetcher> AssetCache<F> {
    /// Opens the cache with the default shell manifest.
    /// # Errors
    /// `CacheError` if storage cannot be initialised.
    pub fn new(conn: Connection, cache_name: &str, base: &Url, fetcher: F) -> Result<Self, CacheError> {
        Self::with_manifest(conn, cache_name, base, ASSET_MANIFEST, fetcher)
    }

    /// # Errors
    /// `CacheError` if a manifest path does not resolve against `base` or storage cannot be initialised.
    pub fn with_manifest(
        conn: Connection,
        cache_name: &str,
        base: &Url,
        manifest: &[&str],
        fetcher: F,
    ) -> Result<Self, CacheError> {
        db::init_cache(&conn)?;
        let manifest = manifest
            .iter()
            .map(|path| resolve(base, path))
            .collect::<Result<Vec<_>, _>>()?;
        let shell = resolve(base, SHELL_PAGE)?;

        let mut cache = Self {
            conn,
            cache_name: cache_name.to_string(),
            manifest,
            shell,
            fetcher,
            state: LifecycleState::Installing,
        };
        cache.state = cache.restored_state()?;
        debug!(
            "Asset cache '{}' opened in state {}",
            cache.cache_name, cache.state
        );
        Ok(cache)
    }

    /// Picks up where a previous run left off, from the activation flag
    /// stored with the current bucket.
    fn restored_state(&self) -> Result<LifecycleState, CacheError> {
        Ok(match db::bucket_activated(&self.conn, &self.cache_name)? {
            None => LifecycleState::Installing,
            Some(false) => LifecycleState::Activating,
            Some(true) => LifecycleState::Active,
        })
    }

    #[must_use]
    pub const fn state(&self) -> LifecycleState {
        self.state
    }

    #[must_use]
    pub fn cache_name(&self) -> &str {
        &self.cache_name
    }

    #[must_use]
    pub fn manifest(&self) -> &[Url] {
        &self.manifest
    }

    /// Fetches every manifest asset and stores them in one batch.
    /// A single failed fetch fails the whole install and nothing is stored.
    /// # Errors
    /// `CacheError::InstallFetch` / `InstallStatus` on a failed asset, `Storage` if the batch write fails.
    pub async fn install(&mut self) -> Result<usize, CacheError> {
        let previous = self.state;
        self.state = LifecycleState::Installing;
        match self.populate().await {
            Ok(count) => {
                self.state = LifecycleState::Activating;
                info!("Installed {} assets into '{}'", count, self.cache_name);
                Ok(count)
            }
            Err(e) => {
                // The previously installed version, if any, keeps serving
                self.state = previous;
                error!("{}", e);
                Err(e)
            }
        }
    }

    async fn populate(&mut self) -> Result<usize, CacheError> {
        info!(
            "Installing '{}': {} assets",
            self.cache_name,
            self.manifest.len()
        );

        let fetcher = &self.fetcher;
        let fetches = self.manifest.iter().map(|url| async move {
            let request = Request::get(url.clone());
            let response =
                fetcher
                    .fetch(&request)
                    .await
                    .map_err(|e| CacheError::InstallFetch {
                        url: url.to_string(),
                        reason: e.to_string(),
                    })?;
            if !response.is_ok() {
                return Err(CacheError::InstallStatus {
                    url: url.to_string(),
                    status: response.status,
                });
            }
            Ok((request.cache_key().to_string(), response.to_stored()))
        });

        let entries = try_join_all(fetches).await?;
        db::put_all(&mut self.conn, &self.cache_name, &entries)?;
        Ok(entries.len())
    }

    /// Deletes every bucket other than the current one, then starts serving.
    /// Returns the names of the deleted buckets.
    /// # Errors
    /// `CacheError::NotInstalled` before a successful install, `Storage` if the sweep fails.
    pub fn activate(&mut self) -> Result<Vec<String>, CacheError> {
        if self.state == LifecycleState::Installing {
            return Err(CacheError::NotInstalled);
        }
        let stale: Vec<String> = db::bucket_names(&self.conn)?
            .into_iter()
            .filter(|name| name != &self.cache_name)
            .collect();
        db::activate_bucket(&mut self.conn, &self.cache_name, &stale)?;
        if !stale.is_empty() {
            info!("Removed stale caches: {}", stale.join(", "));
        }
        self.state = LifecycleState::Active;
        Ok(stale)
    }

    /// Serves one outbound request.
    /// # Errors
    /// `CacheError::Unavailable` when neither the network nor the cache can answer,
    /// `Network` when an uncached request's network call fails.
    pub async fn handle_fetch(&self, request: &Request) -> Result<Response, CacheError> {
        if self.state != LifecycleState::Active {
            return self.from_network(request).await;
        }
        match route(request) {
            Strategy::Passthrough => self.from_network(request).await,
            Strategy::NetworkFirst => self.network_first(request).await,
            Strategy::CacheFirst => self.cache_first(request).await,
        }
    }

    async fn from_network(&self, request: &Request) -> Result<Response, CacheError> {
        self.fetcher
            .fetch(request)
            .await
            .map_err(|e| CacheError::Network {
                url: request.url.to_string(),
                reason: e.to_string(),
            })
    }

    async fn network_first(&self, request: &Request) -> Result<Response, CacheError> {
        match self.fetcher.fetch(request).await {
            Ok(response) => {
                if response.is_ok() {
                    // Refresh failure only costs freshness; the live response still goes out.
                    if let Err(e) = db::put_entry(
                        &self.conn,
                        &self.cache_name,
                        request.cache_key(),
                        &response.to_stored(),
                    ) {
                        warn!("Could not refresh cached {}: {}", request.url, e);
                    }
                }
                Ok(response)
            }
            Err(e) => {
                debug!("Network failed for {} ({}), trying cache", request.url, e);
                self.cached(&request.url)?
                    .ok_or_else(|| CacheError::Unavailable(request.url.to_string()))
            }
        }
    }

    async fn cache_first(&self, request: &Request) -> Result<Response, CacheError> {
        if let Some(hit) = self.cached(&request.url)? {
            debug!("Cache hit for {}", request.url);
            return Ok(hit);
        }
        match self.fetcher.fetch(request).await {
            Ok(response) => Ok(response),
            Err(e) => {
                debug!("Network failed for {} ({})", request.url, e);
                if request.mode == RequestMode::Navigate {
                    if let Some(shell) = self.cached(&self.shell)? {
                        return Ok(shell);
                    }
                }
                Err(CacheError::Unavailable(request.url.to_string()))
            }
        }
    }

    fn cached(&self, url: &Url) -> Result<Option<Response>, CacheError> {
        Ok(db::match_entry(&self.conn, &self.cache_name, url.as_str())?
            .map(|stored| Response::from_stored(url.clone(), stored)))
    }

    /// # Errors
    /// `CacheError::Storage` if buckets cannot be listed.
    pub fn status(&self) -> Result<CacheStatus, CacheError> {
        let buckets = db::bucket_names(&self.conn)?
            .into_iter()
            .map(|name| {
                let count = db::count_entries(&self.conn, &name)?;
                Ok((name, count))
            })
            .collect::<Result<Vec<_>, db::Error>>()?;
        Ok(CacheStatus {
            state: self.state,
            current_bucket: self.cache_name.clone(),
            buckets,
        })
    }
}
