use std::sync::Arc;
use std::time::Duration;

use rustls::ClientConfig;

use crate::protocol::{Endpoint, HttpError, SendError};

/// Everything a [`Connection`](super::Connection) needs to know about its peer.
#[derive(Debug, Clone)]
pub struct ConnectionConfig {
    endpoint: Endpoint,
    base_url: Option<String>,
    timeout: Option<Duration>,
    driver: Option<String>,
    cache_busting: bool,
    allow_insecure: bool,
    tls: Option<Arc<ClientConfig>>,
}

impl ConnectionConfig {
    pub fn new(endpoint: Endpoint) -> Self {
        Self {
            endpoint,
            base_url: None,
            timeout: None,
            driver: None,
            cache_busting: false,
            allow_insecure: true,
            tls: None,
        }
    }

    /// Builds the endpoint from `http(s)://host[:port][/path]`.
    pub fn from_url(url: &str) -> Result<Self, HttpError> {
        Ok(Self::new(Endpoint::from_url(url)?))
    }

    /// A base url that takes precedence over the endpoint on every connect.
    #[must_use]
    pub fn with_base_url<U: Into<String>>(mut self, base_url: U) -> Self {
        self.base_url = Some(base_url.into());
        self
    }

    /// Limit for establishing the TCP connection, then for every read or write
    /// that makes no progress.
    #[must_use]
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    /// Provider name shown in the `User-Agent` and in parse errors.
    #[must_use]
    pub fn with_driver<D: Into<String>>(mut self, driver: D) -> Self {
        self.driver = Some(driver.into());
        self
    }

    /// Adds a random `cache-busting` parameter to every `GET`.
    #[must_use]
    pub fn with_cache_busting(mut self, cache_busting: bool) -> Self {
        self.cache_busting = cache_busting;
        self
    }

    #[must_use]
    pub fn with_allow_insecure(mut self, allow_insecure: bool) -> Self {
        self.allow_insecure = allow_insecure;
        self
    }

    /// Replaces the default rustls configuration trusting the webpki roots.
    #[must_use]
    pub fn with_tls_config(mut self, tls: Arc<ClientConfig>) -> Self {
        self.tls = Some(tls);
        self
    }

    pub fn endpoint(&self) -> &Endpoint {
        &self.endpoint
    }

    pub fn base_url(&self) -> Option<&str> {
        self.base_url.as_deref()
    }

    pub fn timeout(&self) -> Option<Duration> {
        self.timeout
    }

    pub fn driver(&self) -> Option<&str> {
        self.driver.as_deref()
    }

    pub fn cache_busting(&self) -> bool {
        self.cache_busting
    }

    pub fn allow_insecure(&self) -> bool {
        self.allow_insecure
    }

    pub fn tls_config(&self) -> Option<&Arc<ClientConfig>> {
        self.tls.as_ref()
    }

    /// Rejects a plain HTTP endpoint when insecure connections are not allowed.
    pub fn check_secure(&self, endpoint: &Endpoint) -> Result<(), SendError> {
        if !endpoint.is_secure() && !self.allow_insecure {
            return Err(SendError::InsecureNotAllowed { host: endpoint.host().to_string() });
        }
        Ok(())
    }
}
