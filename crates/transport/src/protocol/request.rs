//! Outgoing request description.
//!
//! A [`Request`] is plain data: method, action path, ordered query parameters,
//! headers and an optional body. The connection turns it into a [`RequestHead`]
//! plus payload right before writing it to the wire.

use bytes::Bytes;
use http::header::{HeaderName, IntoHeaderName};
use http::{HeaderMap, HeaderValue, Method};

use crate::protocol::SendError;

/// Head of an outgoing request, the uri is in origin-form (`/path?query`).
pub type RequestHead = http::Request<()>;

/// Ordered, multi-valued query parameters.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct QueryParams {
    pairs: Vec<(String, String)>,
}

impl QueryParams {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push<K: Into<String>, V: Into<String>>(&mut self, key: K, value: V) {
        self.pairs.push((key.into(), value.into()));
    }

    /// First value recorded for `key`.
    pub fn get(&self, key: &str) -> Option<&str> {
        self.pairs.iter().find(|(k, _)| k == key).map(|(_, v)| v.as_str())
    }

    pub fn get_all<'a>(&'a self, key: &'a str) -> impl Iterator<Item = &'a str> + 'a {
        self.pairs.iter().filter(move |(k, _)| k == key).map(|(_, v)| v.as_str())
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.pairs.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    pub fn len(&self) -> usize {
        self.pairs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.pairs.is_empty()
    }

    /// `application/x-www-form-urlencoded` serialization, keeping insertion order.
    pub fn encode(&self) -> Result<String, SendError> {
        serde_urlencoded::to_string(&self.pairs).map_err(SendError::invalid_uri)
    }
}

impl<K: Into<String>, V: Into<String>> FromIterator<(K, V)> for QueryParams {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        Self { pairs: iter.into_iter().map(|(k, v)| (k.into(), v.into())).collect() }
    }
}

impl<K: Into<String>, V: Into<String>> Extend<(K, V)> for QueryParams {
    fn extend<I: IntoIterator<Item = (K, V)>>(&mut self, iter: I) {
        self.pairs.extend(iter.into_iter().map(|(k, v)| (k.into(), v.into())));
    }
}

/// A request as built by a provider driver, before the connection's hooks run.
#[derive(Debug, Clone)]
pub struct Request {
    method: Method,
    action: String,
    params: QueryParams,
    headers: HeaderMap,
    body: Option<Bytes>,
}

impl Request {
    pub fn new<A: Into<String>>(method: Method, action: A) -> Self {
        Self { method, action: action.into(), params: QueryParams::new(), headers: HeaderMap::new(), body: None }
    }

    pub fn get<A: Into<String>>(action: A) -> Self {
        Self::new(Method::GET, action)
    }

    pub fn post<A: Into<String>>(action: A) -> Self {
        Self::new(Method::POST, action)
    }

    pub fn put<A: Into<String>>(action: A) -> Self {
        Self::new(Method::PUT, action)
    }

    pub fn delete<A: Into<String>>(action: A) -> Self {
        Self::new(Method::DELETE, action)
    }

    pub fn head<A: Into<String>>(action: A) -> Self {
        Self::new(Method::HEAD, action)
    }

    #[must_use]
    pub fn param<K: Into<String>, V: Into<String>>(mut self, key: K, value: V) -> Self {
        self.params.push(key, value);
        self
    }

    #[must_use]
    pub fn params(mut self, params: QueryParams) -> Self {
        self.params.extend(params.pairs);
        self
    }

    /// Sets a header, replacing any previous value.
    #[must_use]
    pub fn header<K: IntoHeaderName>(mut self, name: K, value: HeaderValue) -> Self {
        self.headers.insert(name, value);
        self
    }

    /// Adds a header value without removing the ones already present.
    #[must_use]
    pub fn append_header<K: IntoHeaderName>(mut self, name: K, value: HeaderValue) -> Self {
        self.headers.append(name, value);
        self
    }

    /// Sets every header of `headers`, replacing previous values of the same names.
    #[must_use]
    pub fn with_headers(mut self, headers: HeaderMap) -> Self {
        self.headers.extend(headers);
        self
    }

    /// Sets a header from untyped strings.
    pub fn try_header(mut self, name: &str, value: &str) -> Result<Self, SendError> {
        let name = HeaderName::from_bytes(name.as_bytes()).map_err(SendError::invalid_header)?;
        let value = HeaderValue::from_str(value).map_err(SendError::invalid_header)?;
        self.headers.insert(name, value);
        Ok(self)
    }

    #[must_use]
    pub fn body<B: Into<Bytes>>(mut self, body: B) -> Self {
        self.body = Some(body.into());
        self
    }

    pub fn method(&self) -> &Method {
        &self.method
    }

    pub fn action(&self) -> &str {
        &self.action
    }

    pub fn query(&self) -> &QueryParams {
        &self.params
    }

    pub fn headers(&self) -> &HeaderMap {
        &self.headers
    }

    pub fn payload(&self) -> Option<&Bytes> {
        self.body.as_ref()
    }

    pub(crate) fn into_parts(self) -> (Method, String, QueryParams, HeaderMap, Option<Bytes>) {
        (self.method, self.action, self.params, self.headers, self.body)
    }
}

/// Joins `action` and the encoded query with `?`, or `&` when the action already has a query.
pub(crate) fn join_query(action: &str, query: &str) -> String {
    if query.is_empty() {
        return action.to_string();
    }
    let separator = if action.contains('?') { '&' } else { '?' };
    format!("{action}{separator}{query}")
}

#[cfg(test)]
mod tests {
    use super::*;
    use http::header;

    #[test]
    fn query_keeps_order_and_duplicates() {
        let params: QueryParams = [("b", "2"), ("a", "1"), ("b", "3")].into_iter().collect();
        assert_eq!(params.encode().unwrap(), "b=2&a=1&b=3");
        assert_eq!(params.get("b"), Some("2"));
        assert_eq!(params.get_all("b").collect::<Vec<_>>(), vec!["2", "3"]);
    }

    #[test]
    fn query_is_url_encoded() {
        let params: QueryParams = [("prefix", "a b/c"), ("marker", "x&y")].into_iter().collect();
        assert_eq!(params.encode().unwrap(), "prefix=a+b%2Fc&marker=x%26y");
    }

    #[test]
    fn join_query_separator() {
        assert_eq!(join_query("/containers", ""), "/containers");
        assert_eq!(join_query("/containers", "format=json"), "/containers?format=json");
        assert_eq!(join_query("/containers?limit=1", "format=json"), "/containers?limit=1&format=json");
    }

    #[test]
    fn header_last_write_wins() {
        let request = Request::get("/")
            .header(header::ACCEPT, HeaderValue::from_static("text/plain"))
            .header(header::ACCEPT, HeaderValue::from_static("application/json"));
        assert_eq!(request.headers().get_all(header::ACCEPT).iter().count(), 1);
        assert_eq!(request.headers()[header::ACCEPT], "application/json");
    }

    #[test]
    fn append_header_is_additive() {
        let request = Request::get("/")
            .append_header("x-object-meta", HeaderValue::from_static("a=1"))
            .append_header("x-object-meta", HeaderValue::from_static("b=2"));
        assert_eq!(request.headers().get_all("x-object-meta").iter().count(), 2);
    }

    #[test]
    fn try_header_rejects_invalid_name() {
        assert!(matches!(Request::get("/").try_header("bad header", "v"), Err(SendError::InvalidHeader { .. })));
        let request = Request::get("/").try_header("X-Auth-Token", "secret").unwrap();
        assert_eq!(request.headers()["x-auth-token"], "secret");
    }
}
