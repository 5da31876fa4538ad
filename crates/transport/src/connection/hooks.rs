use bytes::Bytes;
use http::HeaderMap;

use crate::protocol::{Endpoint, QueryParams, RequestContext};

/// Extension points a provider uses to shape every request of a connection.
///
/// Each hook gets the [`RequestContext`] of the call being built. All of them
/// default to the identity, except [`ConnectionHooks::morph_action`] which
/// prefixes the endpoint's base path.
#[cfg_attr(test, mockall::automock)]
pub trait ConnectionHooks: Send + Sync {
    fn morph_action(&self, action: &str, endpoint: &Endpoint, ctx: &RequestContext) -> String {
        let _ = ctx;
        format!("{}{action}", endpoint.base_path())
    }

    /// Adds parameters such as api keys or versions.
    fn add_default_params(&self, params: QueryParams, ctx: &RequestContext) -> QueryParams {
        let _ = ctx;
        params
    }

    /// Adds headers such as authentication tokens.
    fn add_default_headers(&self, headers: HeaderMap, ctx: &RequestContext) -> HeaderMap {
        let _ = ctx;
        headers
    }

    /// Last chance to change parameters and headers, e.g. to sign the request.
    fn pre_connect_hook(&self, params: QueryParams, headers: HeaderMap, ctx: &RequestContext) -> (QueryParams, HeaderMap) {
        let _ = ctx;
        (params, headers)
    }

    fn encode_data(&self, data: Bytes, ctx: &RequestContext) -> Bytes {
        let _ = ctx;
        data
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct DefaultHooks;

impl ConnectionHooks for DefaultHooks {}
