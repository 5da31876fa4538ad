//! Opening the byte stream a request travels over.
//!
//! [`open_stream`] is the single place deciding between a plain TCP stream and a
//! rustls session on top of it. The [`Connector`] trait sits in front of it so
//! tests can hand a connection an in-memory stream instead.

use std::future::Future;
use std::io;
use std::pin::Pin;
use std::sync::Arc;
use std::task::{Context, Poll};
use std::time::Duration;

use async_trait::async_trait;
use once_cell::sync::OnceCell;
use rustls::pki_types::ServerName;
use rustls::{ClientConfig, RootCertStore};
use tokio::io::{AsyncRead, AsyncWrite, ReadBuf};
use tokio::net::TcpStream;
use tokio::time::Sleep;
use tokio_rustls::TlsConnector;
use tokio_rustls::client::TlsStream;
use tracing::debug;

use crate::connection::ConnectionConfig;
use crate::protocol::{Endpoint, SendError};

pub trait IoStream: AsyncRead + AsyncWrite + Unpin + Send {}

impl<T: AsyncRead + AsyncWrite + Unpin + Send> IoStream for T {}

pub type BoxedStream = Box<dyn IoStream>;

#[async_trait]
pub trait Connector: Send + Sync {
    async fn connect(&self, endpoint: &Endpoint, config: &ConnectionConfig) -> Result<BoxedStream, SendError>;
}

/// Connects over TCP, wrapped in TLS for secure endpoints.
#[derive(Debug, Clone, Copy, Default)]
pub struct TcpConnector;

#[async_trait]
impl Connector for TcpConnector {
    async fn connect(&self, endpoint: &Endpoint, config: &ConnectionConfig) -> Result<BoxedStream, SendError> {
        let stream = open_stream(
            endpoint.is_secure(),
            endpoint.host(),
            endpoint.port(),
            config.tls_config(),
            config.timeout(),
        )
        .await?;
        Ok(Box::new(stream))
    }
}

#[derive(Debug)]
pub enum MaybeTlsStream {
    Plain(TcpStream),
    Tls(Box<TlsStream<TcpStream>>),
}

/// Opens a plain stream, or a TLS stream when `secure` is set.
///
/// Secure streams use `tls` when given, otherwise a shared configuration that
/// trusts the webpki root certificates.
pub async fn open_stream(
    secure: bool,
    host: &str,
    port: u16,
    tls: Option<&Arc<ClientConfig>>,
    timeout: Option<Duration>,
) -> Result<MaybeTlsStream, SendError> {
    let connect = TcpStream::connect((host, port));
    let tcp = match timeout {
        Some(timeout) => tokio::time::timeout(timeout, connect)
            .await
            .map_err(|_| SendError::ConnectTimeout { host: host.to_string(), port, timeout })?,
        None => connect.await,
    }
    .map_err(|source| SendError::Connect { host: host.to_string(), port, source })?;
    tcp.set_nodelay(true)?;

    if !secure {
        debug!(host, port, "opened plain connection");
        return Ok(MaybeTlsStream::Plain(tcp));
    }

    let tls = match tls {
        Some(tls) => Arc::clone(tls),
        None => default_tls_config()?,
    };
    let server_name = ServerName::try_from(host.to_string()).map_err(SendError::tls)?;
    let stream = TlsConnector::from(tls).connect(server_name, tcp).await.map_err(SendError::tls)?;

    debug!(host, port, "opened tls connection");
    Ok(MaybeTlsStream::Tls(Box::new(stream)))
}

fn default_tls_config() -> Result<Arc<ClientConfig>, SendError> {
    static DEFAULT_TLS: OnceCell<Arc<ClientConfig>> = OnceCell::new();

    DEFAULT_TLS
        .get_or_try_init(|| {
            let mut roots = RootCertStore::empty();
            roots.extend(webpki_roots::TLS_SERVER_ROOTS.iter().cloned());

            let config = ClientConfig::builder_with_provider(Arc::new(rustls::crypto::ring::default_provider()))
                .with_safe_default_protocol_versions()
                .map_err(SendError::tls)?
                .with_root_certificates(roots)
                .with_no_client_auth();
            Ok(Arc::new(config))
        })
        .map(Arc::clone)
}

impl AsyncRead for MaybeTlsStream {
    fn poll_read(self: Pin<&mut Self>, cx: &mut Context<'_>, buf: &mut ReadBuf<'_>) -> Poll<io::Result<()>> {
        match self.get_mut() {
            MaybeTlsStream::Plain(stream) => Pin::new(stream).poll_read(cx, buf),
            MaybeTlsStream::Tls(stream) => Pin::new(stream.as_mut()).poll_read(cx, buf),
        }
    }
}

impl AsyncWrite for MaybeTlsStream {
    fn poll_write(self: Pin<&mut Self>, cx: &mut Context<'_>, buf: &[u8]) -> Poll<io::Result<usize>> {
        match self.get_mut() {
            MaybeTlsStream::Plain(stream) => Pin::new(stream).poll_write(cx, buf),
            MaybeTlsStream::Tls(stream) => Pin::new(stream.as_mut()).poll_write(cx, buf),
        }
    }

    fn poll_flush(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<io::Result<()>> {
        match self.get_mut() {
            MaybeTlsStream::Plain(stream) => Pin::new(stream).poll_flush(cx),
            MaybeTlsStream::Tls(stream) => Pin::new(stream.as_mut()).poll_flush(cx),
        }
    }

    fn poll_shutdown(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<io::Result<()>> {
        match self.get_mut() {
            MaybeTlsStream::Plain(stream) => Pin::new(stream).poll_shutdown(cx),
            MaybeTlsStream::Tls(stream) => Pin::new(stream.as_mut()).poll_shutdown(cx),
        }
    }
}

/// Fails a read, or a write, that makes no progress for `timeout`.
///
/// Each direction has its own timer, armed when the inner stream returns `Pending`
/// and cleared whenever it makes progress. The error has kind `TimedOut`.
#[derive(Debug)]
pub struct TimedStream<S> {
    inner: S,
    timeout: Duration,
    read_timer: Option<Pin<Box<Sleep>>>,
    write_timer: Option<Pin<Box<Sleep>>>,
}

impl<S> TimedStream<S> {
    pub fn new(inner: S, timeout: Duration) -> Self {
        Self { inner, timeout, read_timer: None, write_timer: None }
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    pub fn into_inner(self) -> S {
        self.inner
    }
}

fn poll_timer(timer: &mut Option<Pin<Box<Sleep>>>, timeout: Duration, cx: &mut Context<'_>) -> Poll<io::Error> {
    let sleep = timer.get_or_insert_with(|| Box::pin(tokio::time::sleep(timeout)));
    match sleep.as_mut().poll(cx) {
        Poll::Ready(()) => {
            *timer = None;
            Poll::Ready(io::Error::new(io::ErrorKind::TimedOut, format!("no progress within {timeout:?}")))
        }
        Poll::Pending => Poll::Pending,
    }
}

impl<S: AsyncRead + Unpin> AsyncRead for TimedStream<S> {
    fn poll_read(self: Pin<&mut Self>, cx: &mut Context<'_>, buf: &mut ReadBuf<'_>) -> Poll<io::Result<()>> {
        let this = self.get_mut();
        match Pin::new(&mut this.inner).poll_read(cx, buf) {
            Poll::Ready(result) => {
                this.read_timer = None;
                Poll::Ready(result)
            }
            Poll::Pending => poll_timer(&mut this.read_timer, this.timeout, cx).map(Err),
        }
    }
}

impl<S: AsyncWrite + Unpin> AsyncWrite for TimedStream<S> {
    fn poll_write(self: Pin<&mut Self>, cx: &mut Context<'_>, buf: &[u8]) -> Poll<io::Result<usize>> {
        let this = self.get_mut();
        match Pin::new(&mut this.inner).poll_write(cx, buf) {
            Poll::Ready(result) => {
                this.write_timer = None;
                Poll::Ready(result)
            }
            Poll::Pending => poll_timer(&mut this.write_timer, this.timeout, cx).map(Err),
        }
    }

    fn poll_flush(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<io::Result<()>> {
        let this = self.get_mut();
        match Pin::new(&mut this.inner).poll_flush(cx) {
            Poll::Ready(result) => {
                this.write_timer = None;
                Poll::Ready(result)
            }
            Poll::Pending => poll_timer(&mut this.write_timer, this.timeout, cx).map(Err),
        }
    }

    fn poll_shutdown(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<io::Result<()>> {
        Pin::new(&mut self.get_mut().inner).poll_shutdown(cx)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::io::{AsyncReadExt, AsyncWriteExt};
    use tokio::net::TcpListener;

    #[tokio::test]
    async fn open_plain_stream() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let port = listener.local_addr().unwrap().port();

        let server = tokio::spawn(async move {
            let (mut socket, _) = listener.accept().await.unwrap();
            let mut buf = [0u8; 4];
            socket.read_exact(&mut buf).await.unwrap();
            buf
        });

        let mut stream = open_stream(false, "127.0.0.1", port, None, Some(Duration::from_secs(5))).await.unwrap();
        assert!(matches!(stream, MaybeTlsStream::Plain(_)));
        stream.write_all(b"ping").await.unwrap();
        assert_eq!(&server.await.unwrap(), b"ping");
    }

    #[tokio::test]
    async fn refused_connection() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let port = listener.local_addr().unwrap().port();
        drop(listener);

        let err = open_stream(false, "127.0.0.1", port, None, None).await.unwrap_err();
        assert!(matches!(err, SendError::Connect { port: p, .. } if p == port));
    }

    #[tokio::test(start_paused = true)]
    async fn silent_peer_times_out() {
        let (client, mut server) = tokio::io::duplex(64);
        let mut stream = TimedStream::new(client, Duration::from_millis(200));

        server.write_all(b"hi").await.unwrap();
        let mut buf = [0u8; 2];
        stream.read_exact(&mut buf).await.unwrap();
        assert_eq!(&buf, b"hi");

        let start = tokio::time::Instant::now();
        let err = stream.read(&mut buf).await.unwrap_err();
        assert_eq!(err.kind(), io::ErrorKind::TimedOut);
        assert!(start.elapsed() >= Duration::from_millis(200));
        assert!(start.elapsed() < Duration::from_millis(300));
    }

    #[tokio::test(start_paused = true)]
    async fn stalled_write_times_out() {
        let (client, _server) = tokio::io::duplex(4);
        let mut stream = TimedStream::new(client, Duration::from_secs(1));

        let err = stream.write_all(b"more than four bytes").await.unwrap_err();
        assert_eq!(err.kind(), io::ErrorKind::TimedOut);
    }

    #[test]
    fn default_tls_config_is_shared() {
        let first = default_tls_config().unwrap();
        let second = default_tls_config().unwrap();
        assert!(Arc::ptr_eq(&first, &second));
    }
}
