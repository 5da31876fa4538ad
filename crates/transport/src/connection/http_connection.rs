use bytes::Bytes;
use futures::SinkExt;
use http::header::{ACCEPT_ENCODING, CONTENT_LENGTH, HOST, TRANSFER_ENCODING, USER_AGENT};
use http::{HeaderMap, HeaderValue, Method, Version};
use tokio::io::AsyncWriteExt;
use tokio_util::codec::Framed;
use tracing::{debug, error};
use uuid::Uuid;

use crate::codec::ClientCodec;
use crate::connection::curl;
use crate::connection::raw::HttpFramed;
use crate::connection::{
    BoxedStream, ConnectionConfig, ConnectionHooks, Connector, DefaultHooks, RawRequest, RawResponse, TcpConnector, TimedStream,
};
use crate::protocol::{
    Endpoint, HttpError, Message, PayloadItem, PayloadSize, Request, RequestContext, RequestHead, Response,
    ResponseFormat, SendError, TextFormat, join_query,
};

const USER_AGENT_PRODUCT: &str = concat!("micro-transport/", env!("CARGO_PKG_VERSION"));
const CACHE_BUSTING_PARAM: &str = "cache-busting";

/// One logical HTTP(S) connection to a provider endpoint.
///
/// Every call opens its own stream through the [`Connector`], writes one request and
/// reads one response; nothing is pooled or reused between calls. Requests are shaped
/// by the [`ConnectionHooks`] and responses parsed by the [`ResponseFormat`].
///
/// # Type Parameters
///
/// * `F`: how response bodies are parsed
/// * `H`: the provider's request hooks
/// * `C`: how streams are opened
pub struct Connection<F = TextFormat, H = DefaultHooks, C = TcpConnector> {
    config: ConnectionConfig,
    format: F,
    hooks: H,
    connector: C,
    ua_tokens: Vec<String>,
    context: Option<RequestContext>,
    stream: Option<(Endpoint, HttpFramed)>,
}

/// A request after the hooks ran, ready to be written.
#[derive(Debug)]
struct Prepared {
    endpoint: Endpoint,
    head: RequestHead,
    payload_size: PayloadSize,
    body: Option<Bytes>,
}

impl Connection {
    pub fn new(config: ConnectionConfig) -> Self {
        Self::with_parts(config, TextFormat::new(), DefaultHooks, TcpConnector)
    }
}

impl<F, H, C> Connection<F, H, C>
where
    F: ResponseFormat,
    H: ConnectionHooks,
    C: Connector,
{
    pub fn with_parts(config: ConnectionConfig, format: F, hooks: H, connector: C) -> Self {
        Self { config, format, hooks, connector, ua_tokens: Vec::new(), context: None, stream: None }
    }

    pub fn with_format<F2: ResponseFormat>(self, format: F2) -> Connection<F2, H, C> {
        Connection {
            config: self.config,
            format,
            hooks: self.hooks,
            connector: self.connector,
            ua_tokens: self.ua_tokens,
            context: self.context,
            stream: self.stream,
        }
    }

    pub fn with_hooks<H2: ConnectionHooks>(self, hooks: H2) -> Connection<F, H2, C> {
        Connection {
            config: self.config,
            format: self.format,
            hooks,
            connector: self.connector,
            ua_tokens: self.ua_tokens,
            context: self.context,
            stream: self.stream,
        }
    }

    /// Swaps how streams are opened; a stream opened by the previous connector is dropped.
    pub fn with_connector<C2: Connector>(self, connector: C2) -> Connection<F, H, C2> {
        Connection {
            config: self.config,
            format: self.format,
            hooks: self.hooks,
            connector,
            ua_tokens: self.ua_tokens,
            context: self.context,
            stream: None,
        }
    }

    pub fn config(&self) -> &ConnectionConfig {
        &self.config
    }

    pub fn format(&self) -> &F {
        &self.format
    }

    pub fn hooks(&self) -> &H {
        &self.hooks
    }

    /// Adds a `(token)` to the `User-Agent` sent with every request.
    pub fn user_agent_append<T: Into<String>>(&mut self, token: T) {
        self.ua_tokens.push(token.into());
    }

    pub fn user_agent(&self) -> String {
        let mut user_agent = USER_AGENT_PRODUCT.to_string();
        for part in self.config.driver().into_iter().chain(self.ua_tokens.iter().map(String::as_str)) {
            user_agent.push_str(" (");
            user_agent.push_str(part);
            user_agent.push(')');
        }
        user_agent
    }

    /// Context handed to the hooks of the next call, and of that call only.
    pub fn set_context(&mut self, context: RequestContext) {
        self.context = Some(context);
    }

    /// The endpoint of the stream opened by the last [`connect`](Self::connect), if it is still held.
    pub fn connected_endpoint(&self) -> Option<&Endpoint> {
        self.stream.as_ref().map(|(endpoint, _)| endpoint)
    }

    pub async fn connect(&mut self) -> Result<(), HttpError> {
        self.connect_to(None, None, None).await
    }

    /// Opens a stream and keeps it, dropping the one held before.
    ///
    /// `base_url` wins over the configured base url, which wins over `host`/`port`;
    /// missing parts fall back to the configured endpoint.
    pub async fn connect_to(&mut self, host: Option<&str>, port: Option<u16>, base_url: Option<&str>) -> Result<(), HttpError> {
        let endpoint = self.resolve_endpoint(host, port, base_url)?;
        self.stream = None;
        let framed = Self::open(&self.config, &self.connector, &endpoint).await?;
        self.stream = Some((endpoint, framed));
        Ok(())
    }

    /// Sends `request` and reads the whole response.
    ///
    /// The response body is decompressed and parsed by the connection's format;
    /// a status outside the format's success codes is returned as [`HttpError::Status`].
    pub async fn send(&mut self, request: Request) -> Result<Response<F::Output>, HttpError> {
        let context = self.context.take().unwrap_or_default();
        let prepared = self.prepare(request, context, false)?;
        let mut framed = self.dispatch(&prepared.endpoint).await?;

        let head: Message<(RequestHead, PayloadSize)> = Message::Header((prepared.head, prepared.payload_size));
        match prepared.body {
            Some(body) => {
                framed.feed(head).await?;
                framed.send(Message::Payload(PayloadItem::Chunk(body))).await?;
            }
            None => framed.send(head).await?,
        }

        RawResponse::new(framed).into_response(&self.format, self.config.driver()).await
    }

    /// Sends only the head of `request` and hands back the stream for the body.
    ///
    /// The caller's `Content-Length` or `Transfer-Encoding` headers are left as they
    /// are and decide the framing of whatever is written to the [`RawRequest`].
    pub async fn send_raw(&mut self, request: Request) -> Result<RawRequest, HttpError> {
        let context = self.context.take().unwrap_or_default();
        let prepared = self.prepare(request, context, true)?;
        let mut framed = self.dispatch(&prepared.endpoint).await?;

        framed.send(Message::<_, Bytes>::Header((prepared.head, prepared.payload_size))).await?;
        if let Some(body) = &prepared.body {
            framed.get_mut().write_all(body).await.map_err(SendError::io)?;
        }
        Ok(RawRequest::new(framed))
    }

    fn resolve_endpoint(&self, host: Option<&str>, port: Option<u16>, base_url: Option<&str>) -> Result<Endpoint, HttpError> {
        if let Some(base_url) = base_url.or(self.config.base_url()) {
            return Endpoint::from_url(base_url);
        }

        let default = self.config.endpoint();
        if host.is_none() && port.is_none() {
            return Ok(default.clone());
        }
        let endpoint = Endpoint::new(host.unwrap_or(default.host()), Some(port.unwrap_or(default.port())), default.is_secure());
        Ok(endpoint.with_base_path(default.base_path()))
    }

    async fn open(config: &ConnectionConfig, connector: &C, endpoint: &Endpoint) -> Result<HttpFramed, HttpError> {
        config.check_secure(endpoint)?;
        let stream = connector.connect(endpoint, config).await.map_err(|e| {
            error!(host = endpoint.host(), port = endpoint.port(), cause = %e, "connect failed");
            e
        })?;
        debug!(host = endpoint.host(), port = endpoint.port(), secure = endpoint.is_secure(), "connected");
        let stream = match config.timeout() {
            Some(timeout) => Box::new(TimedStream::new(stream, timeout)) as BoxedStream,
            None => stream,
        };
        Ok(Framed::with_capacity(stream, ClientCodec::new(), 8 * 1024))
    }

    async fn dispatch(&mut self, endpoint: &Endpoint) -> Result<HttpFramed, HttpError> {
        self.stream = None;
        Self::open(&self.config, &self.connector, endpoint).await
    }

    fn prepare(&self, request: Request, context: RequestContext, raw: bool) -> Result<Prepared, HttpError> {
        let endpoint = self.resolve_endpoint(None, None, None)?;
        let (method, action, params, headers, data) = request.into_parts();
        let ctx = context.bind(method.clone(), action.as_str());

        let action = self.hooks.morph_action(&action, &endpoint, &ctx);

        let mut params = self.hooks.add_default_params(params, &ctx);
        if self.config.cache_busting() && method == Method::GET {
            params.push(CACHE_BUSTING_PARAM, hex::encode(&Uuid::new_v4().as_bytes()[..8]));
        }

        let mut headers = self.hooks.add_default_headers(headers, &ctx);
        headers.insert(USER_AGENT, HeaderValue::try_from(self.user_agent()).map_err(SendError::invalid_header)?);
        headers.insert(ACCEPT_ENCODING, HeaderValue::from_static("gzip,deflate"));
        headers.insert(HOST, HeaderValue::try_from(endpoint.host_header()).map_err(SendError::invalid_header)?);

        let body = data.filter(|data| !data.is_empty()).map(|data| self.hooks.encode_data(data, &ctx));
        match &body {
            Some(body) => {
                headers.insert(CONTENT_LENGTH, HeaderValue::from(body.len()));
            }
            None if !raw && (method == Method::POST || method == Method::PUT) => {
                headers.insert(CONTENT_LENGTH, HeaderValue::from_static("0"));
            }
            None => {}
        }

        let (params, headers) = self.hooks.pre_connect_hook(params, headers, &ctx);

        let uri = join_query(&action, &params.encode()?);
        let mut head = http::Request::builder()
            .method(method)
            .uri(uri)
            .version(Version::HTTP_11)
            .body(())
            .map_err(SendError::invalid_uri)?;
        *head.headers_mut() = headers;

        let payload_size = if raw {
            raw_payload_size(head.headers())
        } else {
            PayloadSize::new_length(body.as_ref().map_or(0, |body| body.len() as u64))
        };

        debug!(method = %head.method(), uri = %head.uri(), host = endpoint.host(), "sending request");
        curl::log_request(&endpoint, &head, body.as_deref());
        Ok(Prepared { endpoint, head, payload_size, body })
    }
}

/// Framing announced by the caller's own headers.
fn raw_payload_size(headers: &HeaderMap) -> PayloadSize {
    let chunked = headers
        .get_all(TRANSFER_ENCODING)
        .iter()
        .filter_map(|value| value.to_str().ok())
        .any(|value| value.split(',').any(|coding| coding.trim().eq_ignore_ascii_case("chunked")));
    if chunked {
        return PayloadSize::Chunked;
    }

    headers
        .get(CONTENT_LENGTH)
        .and_then(|value| value.to_str().ok())
        .and_then(|value| value.trim().parse::<u64>().ok())
        .map_or(PayloadSize::Empty, PayloadSize::new_length)
}

impl<F, H, C> std::fmt::Debug for Connection<F, H, C> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Connection")
            .field("config", &self.config)
            .field("ua_tokens", &self.ua_tokens)
            .field("context", &self.context)
            .field("connected", &self.stream.is_some())
            .finish_non_exhaustive()
    }
}
