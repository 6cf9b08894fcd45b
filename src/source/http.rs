//! HTTP plumbing for the remote adapters.
//!
//! [`HttpClient`] is the seam: [`ReqwestClient`] talks to the network,
//! [`CachedClient`] adds a bounded on-disk cache in front of any client, and
//! tests plug in an in-memory double.

use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use thiserror::Error;

use crate::defaults::FETCH_CACHE_MAX_ENTRIES;

/// Errors from remote fetches.
#[derive(Debug, Error)]
pub enum FetchError {
    #[error("request to {url} failed: {message}")]
    Transport { url: String, message: String },

    #[error("{url} returned HTTP {status}")]
    Status { url: String, status: u16 },

    #[error("not found: {url}")]
    NotFound { url: String },

    #[error("rate limited by {url} (retry in {wait_secs}s)")]
    RateLimited { url: String, wait_secs: u64 },

    #[error("unexpected response from {url}: {message}")]
    Decode { url: String, message: String },

    #[error("failed to build HTTP client: {0}")]
    Client(String),
}

/// A response, whatever its status.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct HttpResponse {
    pub status: u16,
    /// Header names are lowercase.
    pub headers: Vec<(String, String)>,
    pub body: Vec<u8>,
}

impl HttpResponse {
    pub fn ok(body: impl Into<Vec<u8>>) -> Self {
        Self {
            status: 200,
            headers: Vec::new(),
            body: body.into(),
        }
    }

    pub fn with_status(status: u16) -> Self {
        Self {
            status,
            ..Default::default()
        }
    }

    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(k, _)| k.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }

    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }

    pub fn json<T: serde::de::DeserializeOwned>(&self, url: &str) -> Result<T, FetchError> {
        serde_json::from_slice(&self.body).map_err(|e| FetchError::Decode {
            url: url.to_string(),
            message: e.to_string(),
        })
    }

    /// Map a non-success status to an error.
    pub fn error_for_status(self, url: &str) -> Result<Self, FetchError> {
        match self.status {
            s if (200..300).contains(&s) => Ok(self),
            404 => Err(FetchError::NotFound {
                url: url.to_string(),
            }),
            status => Err(FetchError::Status {
                url: url.to_string(),
                status,
            }),
        }
    }
}

/// Blocking GET. Transport failures are errors; HTTP error statuses are not.
pub trait HttpClient: Send + Sync {
    fn get(&self, url: &str, query: &[(&str, &str)]) -> Result<HttpResponse, FetchError>;
}

impl<T: HttpClient + ?Sized> HttpClient for Box<T> {
    fn get(&self, url: &str, query: &[(&str, &str)]) -> Result<HttpResponse, FetchError> {
        (**self).get(url, query)
    }
}

impl<T: HttpClient + ?Sized> HttpClient for std::sync::Arc<T> {
    fn get(&self, url: &str, query: &[(&str, &str)]) -> Result<HttpResponse, FetchError> {
        (**self).get(url, query)
    }
}

/// Network client backed by `reqwest`.
#[derive(Debug, Clone)]
pub struct ReqwestClient {
    client: reqwest::blocking::Client,
    bearer: Option<String>,
    headers: Vec<(String, String)>,
}

impl ReqwestClient {
    pub fn new() -> Result<Self, FetchError> {
        let client = reqwest::blocking::Client::builder()
            .user_agent(concat!("prin/", env!("CARGO_PKG_VERSION")))
            .timeout(Duration::from_secs(30))
            .build()
            .map_err(|e| FetchError::Client(e.to_string()))?;
        Ok(Self {
            client,
            bearer: None,
            headers: Vec::new(),
        })
    }

    pub fn bearer(mut self, token: Option<String>) -> Self {
        self.bearer = token.filter(|t| !t.trim().is_empty());
        self
    }

    pub fn header(mut self, name: &str, value: &str) -> Self {
        self.headers.push((name.to_string(), value.to_string()));
        self
    }

    /// What a cached response depends on besides the URL: whether requests
    /// are authenticated, and the extra headers. The token itself is left out.
    pub fn cache_scope(&self) -> String {
        let mut scope = if self.bearer.is_some() { "auth" } else { "anon" }.to_string();
        for (name, value) in &self.headers {
            scope.push_str(&format!(";{}={value}", name.to_ascii_lowercase()));
        }
        scope
    }
}

impl HttpClient for ReqwestClient {
    fn get(&self, url: &str, query: &[(&str, &str)]) -> Result<HttpResponse, FetchError> {
        let transport = |e: reqwest::Error| FetchError::Transport {
            url: url.to_string(),
            message: e.to_string(),
        };

        let mut request = self.client.get(url);
        if !query.is_empty() {
            request = request.query(query);
        }
        if let Some(token) = &self.bearer {
            request = request.bearer_auth(token);
        }
        for (name, value) in &self.headers {
            request = request.header(name.as_str(), value.as_str());
        }

        tracing::debug!(url, "GET");
        let response = request.send().map_err(transport)?;
        let status = response.status().as_u16();
        let headers = response
            .headers()
            .iter()
            .map(|(k, v)| {
                (
                    k.as_str().to_ascii_lowercase(),
                    v.to_str().unwrap_or_default().to_string(),
                )
            })
            .collect();
        let body = response.bytes().map_err(transport)?.to_vec();
        Ok(HttpResponse {
            status,
            headers,
            body,
        })
    }
}

#[derive(Debug, Serialize, Deserialize)]
struct CacheMeta {
    url: String,
    status: u16,
    #[serde(default)]
    content_type: Option<String>,
}

/// Disk cache in front of another client.
///
/// Only successful responses are stored, as `<sha256>.body` plus
/// `<sha256>.meta.json`. The key covers the scope, the URL and the sorted
/// query. Once more than `max_entries` are stored, the least recently
/// written go first.
#[derive(Debug)]
pub struct CachedClient<C> {
    inner: C,
    dir: PathBuf,
    max_entries: usize,
    scope: String,
}

impl<C: HttpClient> CachedClient<C> {
    pub fn new(inner: C, dir: impl Into<PathBuf>) -> Self {
        Self {
            inner,
            dir: dir.into(),
            max_entries: FETCH_CACHE_MAX_ENTRIES,
            scope: String::new(),
        }
    }

    /// Keep entries fetched under different request settings apart.
    pub fn scope(mut self, scope: impl Into<String>) -> Self {
        self.scope = scope.into();
        self
    }

    pub fn max_entries(mut self, max: usize) -> Self {
        self.max_entries = max.max(1);
        self
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    fn key(scope: &str, url: &str, query: &[(&str, &str)]) -> String {
        let mut pairs: Vec<_> = query.to_vec();
        pairs.sort();
        let mut hasher = Sha256::new();
        hasher.update(scope.as_bytes());
        hasher.update(b"\0");
        hasher.update(url.as_bytes());
        for (k, v) in pairs {
            hasher.update(b"\0");
            hasher.update(k.as_bytes());
            hasher.update(b"=");
            hasher.update(v.as_bytes());
        }
        hex::encode(hasher.finalize())
    }

    fn paths(&self, key: &str) -> (PathBuf, PathBuf) {
        (
            self.dir.join(format!("{key}.body")),
            self.dir.join(format!("{key}.meta.json")),
        )
    }

    fn load(&self, key: &str) -> Option<HttpResponse> {
        let (body_path, meta_path) = self.paths(key);
        if !body_path.exists() {
            return None;
        }
        let loaded = (|| {
            let body = fs::read(&body_path).ok()?;
            let meta: CacheMeta = serde_json::from_slice(&fs::read(&meta_path).ok()?).ok()?;
            let mut headers = Vec::new();
            if let Some(ct) = meta.content_type {
                headers.push(("content-type".to_string(), ct));
            }
            Some(HttpResponse {
                status: meta.status,
                headers,
                body,
            })
        })();
        if loaded.is_none() {
            tracing::debug!(key, "dropping corrupt cache entry");
            let _ = fs::remove_file(&body_path);
            let _ = fs::remove_file(&meta_path);
        }
        loaded
    }

    fn store(&self, key: &str, url: &str, response: &HttpResponse) -> std::io::Result<()> {
        fs::create_dir_all(&self.dir)?;
        let (body_path, meta_path) = self.paths(key);
        let meta = CacheMeta {
            url: url.to_string(),
            status: response.status,
            content_type: response.header("content-type").map(str::to_string),
        };
        fs::write(&body_path, &response.body)?;
        let json = serde_json::to_vec(&meta).map_err(std::io::Error::other)?;
        fs::write(&meta_path, json)?;
        self.evict()
    }

    fn evict(&self) -> std::io::Result<()> {
        let mut metas: Vec<(std::time::SystemTime, PathBuf)> = fs::read_dir(&self.dir)?
            .flatten()
            .filter(|e| e.file_name().to_string_lossy().ends_with(".meta.json"))
            .filter_map(|e| {
                let modified = e.metadata().and_then(|m| m.modified()).ok()?;
                Some((modified, e.path()))
            })
            .collect();
        if metas.len() <= self.max_entries {
            return Ok(());
        }
        metas.sort();
        let excess = metas.len() - self.max_entries;
        for (_, meta_path) in metas.into_iter().take(excess) {
            let name = meta_path.file_name().map(|n| n.to_string_lossy().into_owned());
            if let Some(key) = name.as_deref().and_then(|n| n.strip_suffix(".meta.json")) {
                let _ = fs::remove_file(self.dir.join(format!("{key}.body")));
            }
            let _ = fs::remove_file(&meta_path);
        }
        Ok(())
    }
}

impl<C: HttpClient> HttpClient for CachedClient<C> {
    fn get(&self, url: &str, query: &[(&str, &str)]) -> Result<HttpResponse, FetchError> {
        let key = Self::key(&self.scope, url, query);
        if let Some(hit) = self.load(&key) {
            tracing::trace!(url, "cache hit");
            return Ok(hit);
        }
        let response = self.inner.get(url, query)?;
        if response.is_success() {
            if let Err(e) = self.store(&key, url, &response) {
                tracing::debug!(url, error = %e, "failed to cache response");
            }
        }
        Ok(response)
    }
}

/// Whether `PRIN_DISABLE_WEB_CACHE` is set to a truthy value.
pub fn cache_disabled() -> bool {
    std::env::var("PRIN_DISABLE_WEB_CACHE")
        .map(|v| matches!(v.trim().to_ascii_lowercase().as_str(), "1" | "true" | "yes"))
        .unwrap_or(false)
}

/// `PRIN_CACHE_DIR`, else the platform cache directory.
pub fn default_cache_dir() -> Option<PathBuf> {
    std::env::var_os("PRIN_CACHE_DIR")
        .filter(|v| !v.is_empty())
        .map(PathBuf::from)
        .or_else(|| dirs::cache_dir().map(|d| d.join("prin")))
        .map(|d| d.join("http"))
}

/// The network client, cached unless caching is disabled.
pub fn default_client(bearer: Option<String>, accept: Option<&str>) -> Result<Box<dyn HttpClient>, FetchError> {
    let mut client = ReqwestClient::new()?.bearer(bearer);
    if let Some(accept) = accept {
        client = client.header("Accept", accept);
    }
    match default_cache_dir() {
        Some(dir) if !cache_disabled() => {
            let scope = client.cache_scope();
            Ok(Box::new(CachedClient::new(client, dir).scope(scope)))
        }
        _ => Ok(Box::new(client)),
    }
}

#[cfg(test)]
pub(crate) mod testing {
    //! In-memory client double.

    use std::collections::HashMap;
    use std::sync::Mutex;

    use super::*;

    #[derive(Debug, Default)]
    pub struct MockClient {
        routes: Mutex<HashMap<String, Vec<HttpResponse>>>,
        pub calls: Mutex<Vec<String>>,
    }

    impl MockClient {
        pub fn new() -> Self {
            Self::default()
        }

        /// Queue a response for `url`. The last queued response repeats.
        pub fn route(self, url: &str, response: HttpResponse) -> Self {
            self.routes
                .lock()
                .unwrap()
                .entry(url.to_string())
                .or_default()
                .push(response);
            self
        }

        pub fn json(self, url: &str, value: serde_json::Value) -> Self {
            self.route(url, HttpResponse::ok(value.to_string()))
        }

        pub fn call_count(&self, url: &str) -> usize {
            self.calls.lock().unwrap().iter().filter(|u| *u == url).count()
        }
    }

    impl HttpClient for MockClient {
        fn get(&self, url: &str, _query: &[(&str, &str)]) -> Result<HttpResponse, FetchError> {
            self.calls.lock().unwrap().push(url.to_string());
            let mut routes = self.routes.lock().unwrap();
            match routes.get_mut(url) {
                Some(queue) if queue.len() > 1 => Ok(queue.remove(0)),
                Some(queue) => Ok(queue[0].clone()),
                None => Ok(HttpResponse::with_status(404)),
            }
        }
    }
}
