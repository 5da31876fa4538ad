//! Serializes the head of an outgoing request.
//!
//! The request line is written in origin-form followed by every header in the
//! [`RequestHead`]. The framing header matching the [`PayloadSize`] is filled in
//! when the caller did not provide one already.

use std::io;
use std::io::{ErrorKind, Write};

use bytes::{BufMut, BytesMut};
use http::{HeaderValue, Version, header};
use tokio_util::codec::Encoder;
use tracing::error;

use crate::protocol::{PayloadSize, RequestHead, SendError};

const INIT_HEADER_SIZE: usize = 1024;

const CHUNKED: HeaderValue = HeaderValue::from_static("chunked");

#[derive(Debug, Default)]
pub struct HeaderEncoder;

impl Encoder<(RequestHead, PayloadSize)> for HeaderEncoder {
    type Error = SendError;

    fn encode(&mut self, item: (RequestHead, PayloadSize), dst: &mut BytesMut) -> Result<(), Self::Error> {
        let (mut head, payload_size) = item;

        if head.version() != Version::HTTP_11 {
            error!(http_version = ?head.version(), "unsupported http version");
            return Err(io::Error::from(ErrorKind::Unsupported).into());
        }

        dst.reserve(INIT_HEADER_SIZE);
        let target = head.uri().path_and_query().map_or("/", |pq| pq.as_str());
        write!(FastWrite(dst), "{} {} HTTP/1.1\r\n", head.method(), target)?;

        let headers = head.headers_mut();
        match payload_size {
            PayloadSize::Length(n) => {
                headers.entry(header::CONTENT_LENGTH).or_insert_with(|| n.into());
            }
            PayloadSize::Chunked => {
                headers.entry(header::TRANSFER_ENCODING).or_insert(CHUNKED);
            }
            PayloadSize::Empty => {}
            PayloadSize::UntilClose => {
                error!("request body can't be delimited by closing the connection");
                return Err(io::Error::from(ErrorKind::InvalidInput).into());
            }
        }

        for (name, value) in head.headers() {
            dst.put_slice(name.as_ref());
            dst.put_slice(b": ");
            dst.put_slice(value.as_ref());
            dst.put_slice(b"\r\n");
        }
        dst.put_slice(b"\r\n");
        Ok(())
    }
}

struct FastWrite<'a>(&'a mut BytesMut);

impl Write for FastWrite<'_> {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.0.put_slice(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use http::Request;

    fn head(method: &str, uri: &str) -> RequestHead {
        Request::builder()
            .method(method)
            .uri(uri)
            .header(header::HOST, "example.com")
            .body(())
            .unwrap()
    }

    #[test]
    fn encode_get_without_body() {
        let mut dst = BytesMut::new();
        HeaderEncoder.encode((head("GET", "/v1/containers?format=json"), PayloadSize::Empty), &mut dst).unwrap();

        assert_eq!(&dst[..], b"GET /v1/containers?format=json HTTP/1.1\r\nhost: example.com\r\n\r\n");
    }

    #[test]
    fn encode_fills_content_length() {
        let mut dst = BytesMut::new();
        HeaderEncoder.encode((head("PUT", "/obj"), PayloadSize::Length(20000)), &mut dst).unwrap();
        let text = std::str::from_utf8(&dst).unwrap();
        assert!(text.starts_with("PUT /obj HTTP/1.1\r\n"));
        assert!(text.contains("content-length: 20000\r\n"));
        assert!(text.ends_with("\r\n\r\n"));
    }

    #[test]
    fn encode_keeps_caller_content_length() {
        let mut request = head("PUT", "/obj");
        request.headers_mut().insert(header::CONTENT_LENGTH, HeaderValue::from_static("7"));

        let mut dst = BytesMut::new();
        HeaderEncoder.encode((request, PayloadSize::Length(7)), &mut dst).unwrap();
        let text = std::str::from_utf8(&dst).unwrap();
        assert_eq!(text.matches("content-length").count(), 1);
    }

    #[test]
    fn encode_chunked() {
        let mut dst = BytesMut::new();
        HeaderEncoder.encode((head("PUT", "/obj"), PayloadSize::Chunked), &mut dst).unwrap();
        assert!(std::str::from_utf8(&dst).unwrap().contains("transfer-encoding: chunked\r\n"));
    }

    #[test]
    fn reject_until_close_request() {
        let mut dst = BytesMut::new();
        let result = HeaderEncoder.encode((head("PUT", "/obj"), PayloadSize::UntilClose), &mut dst);
        assert!(matches!(result, Err(SendError::Io { .. })));
    }
}
