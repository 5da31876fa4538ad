//! The two halves of a raw exchange: a request whose body the caller writes,
//! and a response read lazily from the same stream.

use std::fmt;
use std::io;

use bytes::{Bytes, BytesMut};
use futures::{Stream, StreamExt};
use http::{HeaderMap, StatusCode};
use tokio::io::AsyncWriteExt;
use tokio::sync::OnceCell;
use tokio_util::codec::Framed;
use tracing::trace;

use crate::codec::ClientCodec;
use crate::connection::BoxedStream;
use crate::connection::curl;
use crate::protocol::{HttpError, Message, ParseError, PayloadItem, ResponseFormat, Response, ResponseHead, SendError};
use crate::transfer::ByteSink;

pub(crate) type HttpFramed = Framed<BoxedStream, ClientCodec>;

/// A request whose head is already on the wire.
///
/// Body bytes are written to the stream exactly as given: when the request
/// declared `Transfer-Encoding: chunked` the caller frames the chunks itself.
pub struct RawRequest {
    framed: HttpFramed,
    bytes_sent: u64,
}

impl RawRequest {
    pub(crate) fn new(framed: HttpFramed) -> Self {
        Self { framed, bytes_sent: 0 }
    }

    pub async fn write_all(&mut self, data: &[u8]) -> Result<(), SendError> {
        self.framed.get_mut().write_all(data).await?;
        self.bytes_sent += data.len() as u64;
        Ok(())
    }

    /// Body bytes written so far, framing included.
    pub fn bytes_sent(&self) -> u64 {
        self.bytes_sent
    }

    /// Flushes the body and hands the stream over to the response side.
    pub async fn finish(mut self) -> Result<RawResponse, HttpError> {
        self.framed.get_mut().flush().await.map_err(SendError::io)?;
        trace!(bytes_sent = self.bytes_sent, "raw request body finished");
        Ok(RawResponse::new(self.framed))
    }
}

impl ByteSink for RawRequest {
    async fn write(&mut self, data: Bytes) -> io::Result<()> {
        self.framed.get_mut().write_all(&data).await?;
        self.bytes_sent += data.len() as u64;
        Ok(())
    }
}

impl fmt::Debug for RawRequest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RawRequest").field("bytes_sent", &self.bytes_sent).finish_non_exhaustive()
    }
}

/// A response that is read from the socket only when asked for.
///
/// The head is read on the first call to [`head`](Self::head) (or any accessor
/// built on it) and kept; the body is then pulled chunk by chunk.
pub struct RawResponse {
    framed: HttpFramed,
    head: OnceCell<ResponseHead>,
    finished: bool,
}

impl RawResponse {
    pub(crate) fn new(framed: HttpFramed) -> Self {
        Self { framed, head: OnceCell::new(), finished: false }
    }

    pub async fn head(&mut self) -> Result<&ResponseHead, HttpError> {
        let framed = &mut self.framed;
        self.head.get_or_try_init(|| read_head(framed)).await
    }

    pub async fn status(&mut self) -> Result<StatusCode, HttpError> {
        Ok(self.head().await?.status())
    }

    pub async fn reason(&mut self) -> Result<&str, HttpError> {
        Ok(self.head().await?.reason())
    }

    pub async fn headers(&mut self) -> Result<&HeaderMap, HttpError> {
        Ok(self.head().await?.headers())
    }

    /// Next piece of the body as it arrived, `None` once the body is complete.
    pub async fn read_chunk(&mut self) -> Result<Option<Bytes>, HttpError> {
        self.head().await?;

        while !self.finished {
            match self.framed.next().await {
                Some(Ok(Message::Payload(PayloadItem::Chunk(bytes)))) => {
                    if !bytes.is_empty() {
                        return Ok(Some(bytes));
                    }
                }
                Some(Ok(Message::Payload(PayloadItem::Eof))) => self.finished = true,
                Some(Ok(Message::Header(_))) => {
                    return Err(ParseError::invalid_body("response head received inside a body").into());
                }
                Some(Err(e)) => return Err(e.into()),
                None => return Err(ParseError::UnexpectedEof.into()),
            }
        }
        Ok(None)
    }

    /// Reads the rest of the body.
    pub async fn read_body(&mut self) -> Result<Bytes, HttpError> {
        let mut body = BytesMut::new();
        while let Some(chunk) = self.read_chunk().await? {
            body.extend_from_slice(&chunk);
        }
        Ok(body.freeze())
    }

    /// Reads the whole response and parses it the way [`Connection::send`](super::Connection::send) does.
    pub async fn into_response<F>(mut self, format: &F, driver: Option<&str>) -> Result<Response<F::Output>, HttpError>
    where
        F: ResponseFormat + ?Sized,
    {
        let body = self.read_body().await?;
        let head = self.head.into_inner().ok_or(ParseError::UnexpectedEof)?;
        Response::from_parts(format, head, body, driver)
    }

    /// The remaining body as a stream of chunks.
    pub fn into_body_stream(self) -> impl Stream<Item = Result<Bytes, HttpError>> + Send {
        futures::stream::try_unfold(self, |mut response| async move {
            Ok(response.read_chunk().await?.map(|chunk| (chunk, response)))
        })
    }
}

impl fmt::Debug for RawResponse {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RawResponse")
            .field("head", &self.head.get())
            .field("finished", &self.finished)
            .finish_non_exhaustive()
    }
}

async fn read_head(framed: &mut HttpFramed) -> Result<ResponseHead, HttpError> {
    match framed.next().await {
        Some(Ok(Message::Header((head, payload_size)))) => {
            trace!(status = %head.status(), ?payload_size, "received response head");
            curl::log_response(&head);
            Ok(head)
        }
        Some(Ok(Message::Payload(_))) => Err(ParseError::invalid_body("response body received before its head").into()),
        Some(Err(e)) => Err(e.into()),
        None => Err(ParseError::UnexpectedEof.into()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::protocol::{PayloadSize, TextFormat};
    use futures::{SinkExt, TryStreamExt};
    use http::{Method, Request};
    use tokio::io::{AsyncReadExt, DuplexStream};

    async fn sent_get(server_reply: &'static [u8]) -> (RawRequest, DuplexStream) {
        let (client, mut server) = tokio::io::duplex(4096);
        let mut framed = Framed::new(Box::new(client) as BoxedStream, ClientCodec::new());
        let head = Request::builder().method(Method::GET).uri("/c/o").body(()).unwrap();
        framed.send(Message::<_, Bytes>::Header((head, PayloadSize::Empty))).await.unwrap();

        server.write_all(server_reply).await.unwrap();
        (RawRequest::new(framed), server)
    }

    #[tokio::test]
    async fn head_is_read_once() {
        let (request, _server) = sent_get(b"HTTP/1.1 200 OK\r\nContent-Length: 5\r\n\r\nhello").await;
        let mut response = request.finish().await.unwrap();

        assert_eq!(response.status().await.unwrap(), StatusCode::OK);
        assert_eq!(response.reason().await.unwrap(), "OK");
        assert_eq!(response.headers().await.unwrap().get("content-length").unwrap(), "5");
        assert_eq!(response.read_body().await.unwrap(), Bytes::from_static(b"hello"));
        assert!(response.read_chunk().await.unwrap().is_none());
    }

    #[tokio::test]
    async fn body_as_stream() {
        let reply = b"HTTP/1.1 200 OK\r\nTransfer-Encoding: chunked\r\n\r\n3\r\nabc\r\n2\r\nde\r\n0\r\n\r\n";
        let (request, _server) = sent_get(reply).await;
        let response = request.finish().await.unwrap();

        let chunks: Vec<Bytes> = response.into_body_stream().try_collect().await.unwrap();
        assert_eq!(chunks.concat(), b"abcde");
    }

    #[tokio::test]
    async fn raw_body_goes_out_verbatim() {
        let (mut request, mut server) = sent_get(b"HTTP/1.1 201 Created\r\nContent-Length: 0\r\n\r\n").await;
        request.write(Bytes::from_static(b"5\r\nhello\r\n")).await.unwrap();
        request.write_all(b"0\r\n\r\n").await.unwrap();
        assert_eq!(request.bytes_sent(), 15);

        let response = request.finish().await.unwrap();
        let response = response.into_response(&TextFormat::new(), None).await.unwrap();
        assert_eq!(response.status(), StatusCode::CREATED);

        let mut wire = vec![0u8; 4096];
        let n = server.read(&mut wire).await.unwrap();
        let wire = String::from_utf8_lossy(&wire[..n]).into_owned();
        assert!(wire.starts_with("GET /c/o HTTP/1.1\r\n"));
        assert!(wire.ends_with("\r\n\r\n5\r\nhello\r\n0\r\n\r\n"));
    }

    #[tokio::test]
    async fn closed_before_head() {
        let (client, server) = tokio::io::duplex(64);
        drop(server);
        let mut response = RawResponse::new(Framed::new(Box::new(client) as BoxedStream, ClientCodec::new()));
        let err = response.status().await.unwrap_err();
        assert!(matches!(err, HttpError::ResponseError { source: ParseError::UnexpectedEof }));
    }
}
