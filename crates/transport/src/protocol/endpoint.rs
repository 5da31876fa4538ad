//! Where a connection points to.
//!
//! An [`Endpoint`] is either assembled from explicit parts or parsed from a base url.
//! The scheme decides `secure`, and a missing port falls back to 80 or 443 so that
//! `secure` and `port` stay consistent unless [`Endpoint::with_port`] overrides it.

use url::Url;

use crate::protocol::HttpError;

pub const HTTP_PORT: u16 = 80;
pub const HTTPS_PORT: u16 = 443;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Endpoint {
    host: String,
    port: u16,
    secure: bool,
    base_path: String,
}

impl Endpoint {
    pub fn new<H: Into<String>>(host: H, port: Option<u16>, secure: bool) -> Self {
        let port = port.unwrap_or(if secure { HTTPS_PORT } else { HTTP_PORT });
        Self { host: host.into(), port, secure, base_path: String::new() }
    }

    /// Parses `http(s)://host[:port][/base/path]`.
    pub fn from_url(url: &str) -> Result<Self, HttpError> {
        let parsed = Url::parse(url).map_err(|e| HttpError::invalid_url(url, e))?;

        let secure = match parsed.scheme() {
            "http" => false,
            "https" => true,
            scheme => return Err(HttpError::invalid_url(url, format!("invalid scheme: {scheme}"))),
        };

        let host = parsed.host_str().ok_or_else(|| HttpError::invalid_url(url, "missing host"))?;
        let port = parsed.port_or_known_default().unwrap_or(if secure { HTTPS_PORT } else { HTTP_PORT });
        let base_path = parsed.path().trim_end_matches('/').to_string();

        Ok(Self { host: host.to_string(), port, secure, base_path })
    }

    #[must_use]
    pub fn with_port(mut self, port: u16) -> Self {
        self.port = port;
        self
    }

    #[must_use]
    pub fn with_base_path<P: Into<String>>(mut self, base_path: P) -> Self {
        self.base_path = base_path.into().trim_end_matches('/').to_string();
        self
    }

    pub fn host(&self) -> &str {
        &self.host
    }

    pub fn port(&self) -> u16 {
        self.port
    }

    pub fn is_secure(&self) -> bool {
        self.secure
    }

    /// Path prefix prepended to every action, without a trailing slash.
    pub fn base_path(&self) -> &str {
        &self.base_path
    }

    pub fn is_default_port(&self) -> bool {
        matches!(self.port, HTTP_PORT | HTTPS_PORT)
    }

    /// Value of the `Host` header: the port is only spelled out when it is not 80/443.
    pub fn host_header(&self) -> String {
        if self.is_default_port() { self.host.clone() } else { format!("{}:{}", self.host, self.port) }
    }

    pub fn scheme(&self) -> &'static str {
        if self.secure { "https" } else { "http" }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_ports_follow_security() {
        assert_eq!(Endpoint::new("example.com", None, true).port(), 443);
        assert_eq!(Endpoint::new("example.com", None, false).port(), 80);
        assert_eq!(Endpoint::new("example.com", Some(8080), true).port(), 8080);
    }

    #[test]
    fn parse_https_url() {
        let endpoint = Endpoint::from_url("https://storage.example.com/v1/AUTH_test/").unwrap();
        assert_eq!(endpoint.host(), "storage.example.com");
        assert_eq!(endpoint.port(), 443);
        assert!(endpoint.is_secure());
        assert_eq!(endpoint.base_path(), "/v1/AUTH_test");
    }

    #[test]
    fn parse_http_url_with_port() {
        let endpoint = Endpoint::from_url("http://127.0.0.1:8773/services/Cloud").unwrap();
        assert_eq!(endpoint.host(), "127.0.0.1");
        assert_eq!(endpoint.port(), 8773);
        assert!(!endpoint.is_secure());
        assert_eq!(endpoint.base_path(), "/services/Cloud");
        assert_eq!(endpoint.host_header(), "127.0.0.1:8773");
    }

    #[test]
    fn root_path_is_empty() {
        let endpoint = Endpoint::from_url("http://example.com").unwrap();
        assert_eq!(endpoint.base_path(), "");
        assert_eq!(endpoint.host_header(), "example.com");
    }

    #[test]
    fn reject_unknown_scheme() {
        let err = Endpoint::from_url("ftp://example.com/file").unwrap_err();
        assert!(matches!(err, HttpError::InvalidUrl { .. }));

        let err = Endpoint::from_url("not a url").unwrap_err();
        assert!(matches!(err, HttpError::InvalidUrl { .. }));
    }

    #[test]
    fn port_override_keeps_scheme() {
        let endpoint = Endpoint::from_url("https://example.com").unwrap().with_port(80);
        assert!(endpoint.is_secure());
        assert_eq!(endpoint.port(), 80);
    }
}
