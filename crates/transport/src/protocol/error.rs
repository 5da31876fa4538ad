use std::io;
use std::path::PathBuf;
use std::time::Duration;

use http::StatusCode;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum HttpError {
    #[error("request error: {source}")]
    RequestError {
        #[from]
        source: SendError,
    },

    #[error("response error: {source}")]
    ResponseError {
        #[from]
        source: ParseError,
    },

    #[error("transfer error: {source}")]
    TransferError {
        #[from]
        source: TransferError,
    },

    #[error("unexpected status {status} {reason}: {message}")]
    Status { status: StatusCode, reason: String, message: String },

    #[error("job did not complete in {} seconds", timeout.as_secs_f64())]
    Timeout { timeout: Duration },

    #[error("invalid url {url}: {reason}")]
    InvalidUrl { url: String, reason: String },
}

impl HttpError {
    pub fn status<R: ToString, M: ToString>(status: StatusCode, reason: R, message: M) -> Self {
        Self::Status { status, reason: reason.to_string(), message: message.to_string() }
    }

    pub fn invalid_url<U: ToString, R: ToString>(url: U, reason: R) -> Self {
        Self::InvalidUrl { url: url.to_string(), reason: reason.to_string() }
    }

    /// Returns the status code when the server answered with a non-success status.
    pub fn status_code(&self) -> Option<StatusCode> {
        match self {
            Self::Status { status, .. } => Some(*status),
            _ => None,
        }
    }

    /// True for a job that did not complete in time and for a connect, read or write
    /// that hit the connection timeout.
    pub fn is_timeout(&self) -> bool {
        match self {
            Self::Timeout { .. } | Self::RequestError { source: SendError::ConnectTimeout { .. } } => true,
            Self::RequestError { source: SendError::Io { source } } | Self::ResponseError { source: ParseError::Io { source } } => {
                source.kind() == io::ErrorKind::TimedOut
            }
            _ => false,
        }
    }
}

/// Errors raised while building or writing a request.
#[derive(Error, Debug)]
pub enum SendError {
    #[error("invalid header: {reason}")]
    InvalidHeader { reason: String },

    #[error("invalid request uri: {reason}")]
    InvalidUri { reason: String },

    #[error("can't connect to {host}:{port}, cause: {source}")]
    Connect {
        host: String,
        port: u16,
        #[source]
        source: io::Error,
    },

    #[error("connect to {host}:{port} timed out after {timeout:?}")]
    ConnectTimeout { host: String, port: u16, timeout: Duration },

    #[error("tls error: {reason}")]
    Tls { reason: String },

    #[error("insecure connections are not allowed for {host}")]
    InsecureNotAllowed { host: String },

    #[error("request body already sent")]
    BodyAlreadySent,

    #[error("io error: {source}")]
    Io {
        #[from]
        source: io::Error,
    },
}

impl SendError {
    pub fn invalid_header<S: ToString>(str: S) -> Self {
        Self::InvalidHeader { reason: str.to_string() }
    }

    pub fn invalid_uri<S: ToString>(str: S) -> Self {
        Self::InvalidUri { reason: str.to_string() }
    }

    pub fn tls<S: ToString>(str: S) -> Self {
        Self::Tls { reason: str.to_string() }
    }

    pub fn io<E: Into<io::Error>>(e: E) -> Self {
        Self::Io { source: e.into() }
    }
}

/// Errors raised while reading or interpreting a response.
#[derive(Error, Debug)]
pub enum ParseError {
    #[error("header size too large, current: {current_size} exceed the limit {max_size}")]
    TooLargeHeader { current_size: usize, max_size: usize },

    #[error("header number exceed the limit {max_num}")]
    TooManyHeaders { max_num: usize },

    #[error("invalid header: {reason}")]
    InvalidHeader { reason: String },

    #[error("invalid http version: {0:?}")]
    InvalidVersion(Option<u8>),

    #[error("invalid http status")]
    InvalidStatus,

    #[error("invalid content-length header: {reason}")]
    InvalidContentLength { reason: String },

    #[error("invalid body: {reason}")]
    InvalidBody { reason: String },

    #[error("can't decompress {encoding} body: {source}")]
    Decompress {
        encoding: &'static str,
        #[source]
        source: io::Error,
    },

    #[error("{reason}, driver: {}, body: {body}", driver.as_deref().unwrap_or("unknown"))]
    Malformed { reason: String, body: String, driver: Option<String> },

    #[error("connection closed before the response was complete")]
    UnexpectedEof,

    #[error("io error: {source}")]
    Io {
        #[from]
        source: io::Error,
    },
}

impl ParseError {
    pub fn too_large_header(current_size: usize, max_size: usize) -> Self {
        Self::TooLargeHeader { current_size, max_size }
    }

    pub fn too_many_headers(max_num: usize) -> Self {
        Self::TooManyHeaders { max_num }
    }

    pub fn invalid_header<S: ToString>(str: S) -> Self {
        Self::InvalidHeader { reason: str.to_string() }
    }

    pub fn invalid_body<S: ToString>(str: S) -> Self {
        Self::InvalidBody { reason: str.to_string() }
    }

    pub fn invalid_content_length<S: ToString>(str: S) -> Self {
        Self::InvalidContentLength { reason: str.to_string() }
    }

    pub fn malformed<R: ToString, B: ToString>(reason: R, body: B, driver: Option<&str>) -> Self {
        Self::Malformed { reason: reason.to_string(), body: body.to_string(), driver: driver.map(str::to_owned) }
    }

    pub fn io<E: Into<io::Error>>(e: E) -> Self {
        Self::Io { source: e.into() }
    }
}

/// Errors raised by the upload/download engine.
///
/// Byte-count mismatches are not errors: they are reported through a failed
/// [`TransferResult`](crate::transfer::TransferResult).
#[derive(Error, Debug)]
pub enum TransferError {
    #[error("file {} does not exist", path.display())]
    FileNotFound { path: PathBuf },

    #[error("file {} is not readable: {source}", path.display())]
    FileNotReadable {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("content-type of {name} could not be guessed and no content_type value is provided")]
    UnknownContentType { name: String },

    #[error("path {} does not exist", path.display())]
    PathNotFound { path: PathBuf },

    #[error("file {} already exists, but overwrite_existing=false", path.display())]
    FileExists { path: PathBuf },

    #[error("object {name} does not exist")]
    ObjectNotFound { name: String },

    #[error("unexpected status code: {status}")]
    UnexpectedStatus { status: StatusCode },

    #[error("object upload failed after {bytes_transferred} bytes, perhaps a timeout?")]
    UploadFailed { bytes_transferred: u64 },

    #[error("invalid or unsupported hash type: {name}")]
    UnsupportedHash { name: String },

    #[error("io error: {source}")]
    Io {
        #[from]
        source: io::Error,
    },
}
