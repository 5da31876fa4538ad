//! Response head and the parsed, successful response.
//!
//! A [`Response`] is only ever built through [`Response::from_parts`], which
//! decompresses the body, checks the status against the format's success set and
//! either parses the body or turns it into [`HttpError::Status`]. Holding a
//! `Response<T>` therefore means the call succeeded.

use std::borrow::Cow;
use std::io::Read;

use bytes::Bytes;
use flate2::read::{GzDecoder, ZlibDecoder};
use http::{HeaderMap, StatusCode, Version, header};
use tracing::{debug, trace};

use crate::protocol::format::ResponseFormat;
use crate::protocol::{HttpError, ParseError};

#[derive(Debug, Clone)]
pub struct ResponseHead {
    status: StatusCode,
    reason: String,
    version: Version,
    headers: HeaderMap,
}

impl ResponseHead {
    pub fn new(status: StatusCode, reason: String, version: Version, headers: HeaderMap) -> Self {
        Self { status, reason, version, headers }
    }

    pub fn status(&self) -> StatusCode {
        self.status
    }

    /// Reason phrase as sent by the server.
    pub fn reason(&self) -> &str {
        &self.reason
    }

    pub fn version(&self) -> Version {
        self.version
    }

    pub fn headers(&self) -> &HeaderMap {
        &self.headers
    }
}

#[derive(Debug)]
pub struct Response<T> {
    head: ResponseHead,
    body: Bytes,
    object: T,
}

impl<T> Response<T> {
    /// Builds the response for `format`, or the error the server reported.
    ///
    /// `driver` names the provider in [`ParseError::Malformed`] errors.
    pub fn from_parts<F>(format: &F, head: ResponseHead, body: Bytes, driver: Option<&str>) -> Result<Self, HttpError>
    where
        F: ResponseFormat<Output = T> + ?Sized,
    {
        let body = decompress_body(head.headers(), body)?;
        let text = String::from_utf8_lossy(&body);
        let skip_parse = body.is_empty() && !format.parse_zero_length_body();

        if !format.success(head.status()) {
            let message = if skip_parse { String::new() } else { format.parse_error(&text, driver)? };
            debug!(status = %head.status(), reason = head.reason(), "request failed");
            return Err(HttpError::status(head.status(), head.reason(), message));
        }

        let object = if skip_parse { format.empty_body() } else { format.parse_body(&text, driver)? };
        Ok(Self { head, body, object })
    }

    pub fn status(&self) -> StatusCode {
        self.head.status()
    }

    pub fn reason(&self) -> &str {
        self.head.reason()
    }

    pub fn headers(&self) -> &HeaderMap {
        self.head.headers()
    }

    pub fn head(&self) -> &ResponseHead {
        &self.head
    }

    /// Decompressed (or whitespace trimmed) body bytes.
    pub fn body(&self) -> &Bytes {
        &self.body
    }

    pub fn text(&self) -> Cow<'_, str> {
        String::from_utf8_lossy(&self.body)
    }

    /// The body as parsed by the response format.
    pub fn object(&self) -> &T {
        &self.object
    }

    pub fn into_object(self) -> T {
        self.object
    }

    pub fn into_parts(self) -> (ResponseHead, Bytes, T) {
        (self.head, self.body, self.object)
    }
}

/// Undoes `Content-Encoding: gzip|x-gzip|deflate|zlib`, any other body only loses
/// its surrounding ASCII whitespace.
pub fn decompress_body(headers: &HeaderMap, body: Bytes) -> Result<Bytes, ParseError> {
    let encoding = headers.get(header::CONTENT_ENCODING).and_then(|v| v.to_str().ok()).map(str::trim);

    let mut decoded = Vec::with_capacity(body.len() * 2);
    match encoding {
        Some(e) if e.eq_ignore_ascii_case("gzip") || e.eq_ignore_ascii_case("x-gzip") => {
            GzDecoder::new(&body[..])
                .read_to_end(&mut decoded)
                .map_err(|source| ParseError::Decompress { encoding: "gzip", source })?;
        }
        Some(e) if e.eq_ignore_ascii_case("deflate") || e.eq_ignore_ascii_case("zlib") => {
            ZlibDecoder::new(&body[..])
                .read_to_end(&mut decoded)
                .map_err(|source| ParseError::Decompress { encoding: "zlib", source })?;
        }
        _ => return Ok(body.slice_ref(body.trim_ascii())),
    }

    trace!(compressed = body.len(), decompressed = decoded.len(), "decompressed response body");
    Ok(Bytes::from(decoded))
}
