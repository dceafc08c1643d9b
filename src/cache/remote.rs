//! HTTP-backed cache tier.
//!
//! Speaks a small JSON protocol against a shared cache service:
//!
//! - `GET    {base}/api/cache/{hash}`  → 200 entry | 404 miss
//! - `PUT    {base}/api/cache/{hash}`  → 200 or 201
//! - `DELETE {base}/api/cache/{hash}`  → 200, 204, or 404 (all ok)
//! - `GET    {base}/api/cache/stats`   → 200 stats (diagnostic)
//! - `GET    {base}/api/health`        → 200 reachable
//!
//! One reusable [`reqwest::Client`] per store; token and base URL are
//! immutable after construction, so the store is safe to share across
//! tasks without locking. The cancellation handle aborts in-flight
//! requests and surfaces as the `Cancelled` error kind.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::{Client, RequestBuilder, Response, StatusCode};
use tokio_util::sync::CancellationToken;

use crate::cache::{CacheManager, CacheStats, Entry, epoch_seconds};
use crate::error::{ForsetiError, Result};
use crate::fingerprint::Fingerprint;

/// Default timeout for each remote request.
const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);

/// Configuration for a [`RemoteStore`].
///
/// ```rust
/// # use forseti::cache::RemoteConfig;
/// # use std::time::Duration;
/// let config = RemoteConfig::new("https://cache.example.com")
///     .token("team-token")
///     .timeout(Duration::from_secs(10));
/// ```
#[derive(Debug, Clone)]
pub struct RemoteConfig {
    /// Base URL of the cache service, without a trailing slash.
    pub base_url: String,
    /// Bearer token attached to every request when set.
    pub token: Option<String>,
    /// Per-request timeout. Default: 30 s.
    pub timeout: Duration,
}

impl RemoteConfig {
    pub fn new(base_url: impl Into<String>) -> Self {
        let mut base_url = base_url.into();
        while base_url.ends_with('/') {
            base_url.pop();
        }
        Self {
            base_url,
            token: None,
            timeout: DEFAULT_TIMEOUT,
        }
    }

    pub fn token(mut self, token: impl Into<String>) -> Self {
        self.token = Some(token.into());
        self
    }

    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }
}

/// HTTP-backed [`CacheManager`].
#[derive(Clone)]
pub struct RemoteStore {
    http: Client,
    base_url: String,
    token: Option<String>,
}

impl RemoteStore {
    /// Build a store from its configuration.
    pub fn new(config: RemoteConfig) -> Result<Self> {
        let http = Client::builder()
            .timeout(config.timeout)
            .build()
            .map_err(|e| ForsetiError::Configuration(format!("build HTTP client: {e}")))?;
        Ok(Self {
            http,
            base_url: config.base_url,
            token: config.token,
        })
    }

    fn entry_url(&self, key: &Fingerprint) -> String {
        format!("{}/api/cache/{}", self.base_url, key.hash())
    }

    fn authorized(&self, req: RequestBuilder) -> RequestBuilder {
        match &self.token {
            Some(token) => req.header("Authorization", format!("Bearer {token}")),
            None => req,
        }
    }

    /// Send a request, racing it against the cancellation handle.
    async fn send(&self, ctx: &CancellationToken, req: RequestBuilder) -> Result<Response> {
        tokio::select! {
            _ = ctx.cancelled() => Err(ForsetiError::Cancelled),
            resp = req.send() => resp.map_err(|e| ForsetiError::Io(e.to_string())),
        }
    }

    /// Fetch the service's diagnostic cache statistics.
    pub async fn stats(&self, ctx: &CancellationToken) -> Result<CacheStats> {
        let url = format!("{}/api/cache/stats", self.base_url);
        let req = self.authorized(self.http.get(&url).header("Accept", "application/json"));
        let resp = self.send(ctx, req).await?;
        if !resp.status().is_success() {
            return Err(ForsetiError::Io(format!(
                "stats returned HTTP {}",
                resp.status()
            )));
        }
        resp.json()
            .await
            .map_err(|e| ForsetiError::Decode(e.to_string()))
    }

    /// Whether the service answers its health endpoint.
    pub async fn health(&self, ctx: &CancellationToken) -> Result<()> {
        let url = format!("{}/api/health", self.base_url);
        let resp = self.send(ctx, self.authorized(self.http.get(&url))).await?;
        if resp.status().is_success() {
            Ok(())
        } else {
            Err(ForsetiError::Io(format!(
                "health returned HTTP {}",
                resp.status()
            )))
        }
    }
}

#[async_trait]
impl CacheManager for RemoteStore {
    async fn get(&self, ctx: &CancellationToken, key: &Fingerprint) -> Result<Entry> {
        let req = self.authorized(
            self.http
                .get(self.entry_url(key))
                .header("Accept", "application/json"),
        );
        let resp = self.send(ctx, req).await?;
        match resp.status() {
            StatusCode::NOT_FOUND => Err(ForsetiError::CacheMiss),
            status if status.is_success() => resp
                .json()
                .await
                .map_err(|e| ForsetiError::Decode(e.to_string())),
            status => Err(ForsetiError::Io(format!("get returned HTTP {status}"))),
        }
    }

    async fn put(&self, ctx: &CancellationToken, mut entry: Entry) -> Result<()> {
        entry.timestamp = epoch_seconds();
        let req = self.authorized(self.http.put(self.entry_url(&entry.key)).json(&entry));
        let resp = self.send(ctx, req).await?;
        match resp.status() {
            StatusCode::OK | StatusCode::CREATED => Ok(()),
            status => Err(ForsetiError::Io(format!("put returned HTTP {status}"))),
        }
    }

    async fn delete(&self, ctx: &CancellationToken, key: &Fingerprint) -> Result<()> {
        let req = self.authorized(self.http.delete(self.entry_url(key)));
        let resp = self.send(ctx, req).await?;
        match resp.status() {
            StatusCode::OK | StatusCode::NO_CONTENT | StatusCode::NOT_FOUND => Ok(()),
            status => Err(ForsetiError::Io(format!("delete returned HTTP {status}"))),
        }
    }
}
