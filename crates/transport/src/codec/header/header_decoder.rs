//! Parses the head of an incoming response.
//!
//! Interim `1xx` responses (other than `101 Switching Protocols`) are consumed and
//! skipped, so the decoder only ever yields the final response head.
//!
//! # Limits
//!
//! - Maximum number of headers: 64
//! - Maximum header size: 8KB

use bytes::{Buf, BytesMut};
use http::{HeaderMap, HeaderName, HeaderValue, StatusCode, Version, header};
use httparse::Status;
use tokio_util::codec::Decoder;
use tracing::trace;

use crate::ensure;
use crate::protocol::{ParseError, PayloadSize, ResponseHead};

const MAX_HEADER_NUM: usize = 64;

const MAX_HEADER_BYTES: usize = 8 * 1024;

#[derive(Debug)]
pub struct HeaderDecoder;

impl Decoder for HeaderDecoder {
    type Item = ResponseHead;
    type Error = ParseError;

    fn decode(&mut self, src: &mut BytesMut) -> Result<Option<Self::Item>, Self::Error> {
        loop {
            let Some((head, offset)) = parse_head(src)? else {
                ensure!(src.len() <= MAX_HEADER_BYTES, ParseError::too_large_header(src.len(), MAX_HEADER_BYTES));
                return Ok(None);
            };

            src.advance(offset);

            if head.status().is_informational() && head.status() != StatusCode::SWITCHING_PROTOCOLS {
                trace!(status = %head.status(), "skip interim response");
                continue;
            }

            return Ok(Some(head));
        }
    }
}

fn parse_head(src: &[u8]) -> Result<Option<(ResponseHead, usize)>, ParseError> {
    let mut headers = [httparse::EMPTY_HEADER; MAX_HEADER_NUM];
    let mut res = httparse::Response::new(&mut headers);

    let status = res.parse(src).map_err(|e| match e {
        httparse::Error::TooManyHeaders => ParseError::too_many_headers(MAX_HEADER_NUM),
        httparse::Error::Status => ParseError::InvalidStatus,
        httparse::Error::Version => ParseError::InvalidVersion(None),
        e => ParseError::invalid_header(e.to_string()),
    })?;

    let Status::Complete(offset) = status else {
        return Ok(None);
    };

    trace!(header_size = offset, "parsed response head");
    ensure!(offset <= MAX_HEADER_BYTES, ParseError::too_large_header(offset, MAX_HEADER_BYTES));

    let version = match res.version {
        Some(0) => Version::HTTP_10,
        Some(1) => Version::HTTP_11,
        v => return Err(ParseError::InvalidVersion(v)),
    };

    let code = res.code.ok_or(ParseError::InvalidStatus)?;
    let status = StatusCode::from_u16(code).map_err(|_| ParseError::InvalidStatus)?;
    let reason = match res.reason {
        Some(reason) if !reason.is_empty() => reason.to_string(),
        _ => status.canonical_reason().unwrap_or_default().to_string(),
    };

    let mut header_map = HeaderMap::with_capacity(res.headers.len());
    for h in res.headers.iter() {
        let name = HeaderName::from_bytes(h.name.as_bytes()).map_err(ParseError::invalid_header)?;
        let value = HeaderValue::from_bytes(h.value).map_err(ParseError::invalid_header)?;
        header_map.append(name, value);
    }

    Ok(Some((ResponseHead::new(status, reason, version, header_map), offset)))
}

/// Works out how the body following `head` is framed, see RFC 9112 section 6.3.
///
/// `expect_body` is false for responses to `HEAD` requests.
pub(crate) fn parse_payload(head: &ResponseHead, expect_body: bool) -> Result<PayloadSize, ParseError> {
    let status = head.status();
    if !expect_body
        || status.is_informational()
        || status == StatusCode::NO_CONTENT
        || status == StatusCode::NOT_MODIFIED
    {
        return Ok(PayloadSize::new_empty());
    }

    if let Some(te) = head.headers().get(header::TRANSFER_ENCODING) {
        return Ok(if is_chunked(te) { PayloadSize::new_chunked() } else { PayloadSize::UntilClose });
    }

    match head.headers().get(header::CONTENT_LENGTH) {
        Some(cl) => {
            let cl = cl.to_str().map_err(|_| ParseError::invalid_content_length("value can't to_str"))?;
            let length = cl
                .trim()
                .parse::<u64>()
                .map_err(|_| ParseError::invalid_content_length(format!("value {cl} is not u64")))?;
            Ok(PayloadSize::new_length(length))
        }
        None => Ok(PayloadSize::UntilClose),
    }
}

/// `chunked` must be the last transfer coding when present.
fn is_chunked(value: &HeaderValue) -> bool {
    value.as_bytes().rsplit(|b| *b == b',').next().is_some_and(|last| last.trim_ascii().eq_ignore_ascii_case(b"chunked"))
}
