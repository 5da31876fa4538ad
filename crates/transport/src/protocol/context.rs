use std::collections::BTreeMap;

use http::Method;

/// Values carried with a single call and handed to every connection hook.
///
/// Callers fill in their own values with [`RequestContext::with`] and hand the
/// context to `Connection::set_context`; the connection then records the method
/// and action of the call it is used for. Once a call starts the context is
/// never mutated again, and it is dropped when the call ends.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RequestContext {
    method: Method,
    action: String,
    values: BTreeMap<String, String>,
}

impl Default for RequestContext {
    fn default() -> Self {
        Self { method: Method::GET, action: String::new(), values: BTreeMap::new() }
    }
}

impl RequestContext {
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn with<K: Into<String>, V: Into<String>>(mut self, key: K, value: V) -> Self {
        self.values.insert(key.into(), value.into());
        self
    }

    pub(crate) fn bind<A: Into<String>>(mut self, method: Method, action: A) -> Self {
        self.method = method;
        self.action = action.into();
        self
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.values.get(key).map(String::as_str)
    }

    /// Method of the call, `GET` until the context is bound to one.
    pub fn method(&self) -> &Method {
        &self.method
    }

    /// Action as the caller passed it, before `morph_action` rewrote it.
    pub fn action(&self) -> &str {
        &self.action
    }

    pub fn values(&self) -> impl Iterator<Item = (&str, &str)> {
        self.values.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }
}

impl<K: Into<String>, V: Into<String>> FromIterator<(K, V)> for RequestContext {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        iter.into_iter().fold(Self::default(), |ctx, (k, v)| ctx.with(k, v))
    }
}
