use std::fmt;
use std::io;
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use bytes::{Bytes, BytesMut};
use futures::stream::BoxStream;
use futures::{Stream, StreamExt, TryStreamExt};
use http::header::{CONTENT_LENGTH, CONTENT_TYPE, IntoHeaderName, TRANSFER_ENCODING};
use http::{HeaderMap, HeaderValue, Method};
use tokio::fs::File;
use tokio_util::io::ReaderStream;
use tracing::{debug, warn};

use crate::connection::{Connection, ConnectionHooks, Connector, RawRequest, RawResponse};
use crate::protocol::{HttpError, Request, ResponseFormat, SendError, TransferError};
use crate::transfer::{TransferConfig, TransferEngine, TransferResult, stream_data, upload_data};

/// Where upload data comes from.
pub enum UploadSource {
    File(PathBuf),
    Stream(BoxStream<'static, io::Result<Bytes>>),
}

impl UploadSource {
    pub fn file<P: Into<PathBuf>>(path: P) -> Self {
        Self::File(path.into())
    }

    pub fn stream<S>(stream: S) -> Self
    where
        S: Stream<Item = io::Result<Bytes>> + Send + 'static,
    {
        Self::Stream(stream.boxed())
    }

    /// A stream yielding `data` at once.
    pub fn bytes<B: Into<Bytes>>(data: B) -> Self {
        Self::stream(futures::stream::iter([Ok(data.into())]))
    }
}

impl fmt::Debug for UploadSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::File(path) => f.debug_tuple("File").field(path).finish(),
            Self::Stream(_) => f.write_str("Stream(..)"),
        }
    }
}

/// One object upload: where it goes and what it is made of.
#[derive(Debug)]
pub struct UploadRequest {
    object_name: String,
    request_path: String,
    method: Method,
    content_type: Option<String>,
    headers: HeaderMap,
    source: UploadSource,
}

impl UploadRequest {
    pub fn new<N: Into<String>, P: Into<String>>(object_name: N, request_path: P, source: UploadSource) -> Self {
        Self {
            object_name: object_name.into(),
            request_path: request_path.into(),
            method: Method::PUT,
            content_type: None,
            headers: HeaderMap::new(),
            source,
        }
    }

    #[must_use]
    pub fn with_method(mut self, method: Method) -> Self {
        self.method = method;
        self
    }

    #[must_use]
    pub fn with_content_type<T: Into<String>>(mut self, content_type: T) -> Self {
        self.content_type = Some(content_type.into());
        self
    }

    #[must_use]
    pub fn with_header<K: IntoHeaderName>(mut self, name: K, value: HeaderValue) -> Self {
        self.headers.insert(name, value);
        self
    }

    pub fn object_name(&self) -> &str {
        &self.object_name
    }

    pub fn request_path(&self) -> &str {
        &self.request_path
    }

    pub fn method(&self) -> &Method {
        &self.method
    }

    pub fn source(&self) -> &UploadSource {
        &self.source
    }
}

/// The body an [`Uploader`] has to write, with its framing already decided.
pub enum UploadBody {
    /// Written piece by piece, chunk framed when `chunked`.
    Stream { source: BoxStream<'static, io::Result<Bytes>>, chunked: bool },
    /// A stream that was read into memory to learn its length.
    Buffered(Bytes),
}

impl fmt::Debug for UploadBody {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Stream { chunked, .. } => f.debug_struct("Stream").field("chunked", chunked).finish_non_exhaustive(),
            Self::Buffered(data) => f.debug_tuple("Buffered").field(&data.len()).finish(),
        }
    }
}

/// Writes an upload body to a request whose head is already sent.
#[async_trait]
pub trait Uploader: Send + Sync {
    async fn upload(&self, request: &mut RawRequest, body: UploadBody, config: &TransferConfig) -> Result<TransferResult, TransferError>;
}

/// Streams the body in `chunk_size` pieces, hashing it with the configured algorithm.
#[derive(Debug, Clone, Copy)]
pub struct StreamUploader {
    calculate_hash: bool,
}

impl Default for StreamUploader {
    fn default() -> Self {
        Self { calculate_hash: true }
    }
}

impl StreamUploader {
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn with_calculate_hash(mut self, calculate_hash: bool) -> Self {
        self.calculate_hash = calculate_hash;
        self
    }
}

#[async_trait]
impl Uploader for StreamUploader {
    async fn upload(&self, request: &mut RawRequest, body: UploadBody, config: &TransferConfig) -> Result<TransferResult, TransferError> {
        let hash = self.calculate_hash.then_some(config.hash_algorithm());
        match body {
            UploadBody::Stream { source, chunked } => stream_data(request, source, chunked, hash, config.chunk_size()).await,
            UploadBody::Buffered(data) => Ok(upload_data(request, data, hash).await),
        }
    }
}

/// A finished upload: the response, not read yet, and what was sent.
#[derive(Debug)]
pub struct UploadOutcome {
    response: RawResponse,
    result: TransferResult,
}

impl UploadOutcome {
    pub fn response(&mut self) -> &mut RawResponse {
        &mut self.response
    }

    pub fn result(&self) -> &TransferResult {
        &self.result
    }

    pub fn into_parts(self) -> (RawResponse, TransferResult) {
        (self.response, self.result)
    }
}

impl TransferEngine {
    /// Uploads one object through `connection`.
    ///
    /// File sources are checked before anything is sent. A stream is sent chunked when
    /// the provider supports it, otherwise it is read into memory first so that a
    /// `Content-Length` can be sent. Fails with [`TransferError::UploadFailed`] when
    /// `uploader` could not write the whole body.
    pub async fn upload_object<F, H, C, U>(
        &self,
        connection: &mut Connection<F, H, C>,
        request: UploadRequest,
        uploader: &U,
    ) -> Result<UploadOutcome, HttpError>
    where
        F: ResponseFormat,
        H: ConnectionHooks,
        C: Connector,
        U: Uploader + ?Sized,
    {
        let UploadRequest { object_name, request_path, method, content_type, mut headers, source } = request;

        let (body, length, guess_name) = match source {
            UploadSource::File(path) => {
                let (file, length) = open_source_file(&path).await?;
                let source = ReaderStream::with_capacity(file, self.config.chunk_size().max(1)).boxed();
                (UploadBody::Stream { source, chunked: false }, Some(length), path.to_string_lossy().into_owned())
            }
            UploadSource::Stream(source) if self.config.supports_chunked_encoding() => {
                headers.insert(TRANSFER_ENCODING, HeaderValue::from_static("chunked"));
                (UploadBody::Stream { source, chunked: true }, None, object_name)
            }
            UploadSource::Stream(source) => {
                let data = drain(source).await?;
                let length = data.len() as u64;
                debug!(length, object_name = %object_name, "buffered upload stream to learn its length");
                (UploadBody::Buffered(data), Some(length), object_name)
            }
        };

        let content_type = self.resolve_content_type(content_type, &guess_name)?;
        if let Some(length) = length {
            headers.entry(CONTENT_LENGTH).or_insert_with(|| HeaderValue::from(length));
        }
        headers.insert(CONTENT_TYPE, HeaderValue::try_from(content_type).map_err(SendError::invalid_header)?);

        let mut raw = connection.send_raw(Request::new(method, request_path).with_headers(headers)).await?;
        let result = uploader.upload(&mut raw, body, &self.config).await?;
        if !result.success() {
            warn!(bytes_transferred = result.bytes_transferred(), "object upload failed");
            return Err(TransferError::UploadFailed { bytes_transferred: result.bytes_transferred() }.into());
        }

        let response = raw.finish().await?;
        Ok(UploadOutcome { response, result })
    }

    fn resolve_content_type(&self, content_type: Option<String>, name: &str) -> Result<String, TransferError> {
        if let Some(content_type) = content_type.filter(|content_type| !content_type.is_empty()) {
            return Ok(content_type);
        }

        match mime_guess::from_path(name).first() {
            Some(mime) => Ok(mime.essence_str().to_string()),
            None if self.config.strict_mode() => Err(TransferError::UnknownContentType { name: name.to_string() }),
            None => Ok(mime::APPLICATION_OCTET_STREAM.essence_str().to_string()),
        }
    }
}

async fn open_source_file(path: &Path) -> Result<(File, u64), TransferError> {
    let metadata = match tokio::fs::metadata(path).await {
        Ok(metadata) => metadata,
        Err(e) if e.kind() == io::ErrorKind::NotFound => {
            return Err(TransferError::FileNotFound { path: path.to_path_buf() });
        }
        Err(source) => return Err(TransferError::FileNotReadable { path: path.to_path_buf(), source }),
    };
    if !metadata.is_file() {
        let source = io::Error::new(io::ErrorKind::InvalidInput, "not a regular file");
        return Err(TransferError::FileNotReadable { path: path.to_path_buf(), source });
    }

    let file = File::open(path)
        .await
        .map_err(|source| TransferError::FileNotReadable { path: path.to_path_buf(), source })?;
    Ok((file, metadata.len()))
}

async fn drain(source: BoxStream<'static, io::Result<Bytes>>) -> Result<Bytes, TransferError> {
    let data = source
        .try_fold(BytesMut::new(), |mut data, chunk| async move {
            data.extend_from_slice(&chunk);
            Ok(data)
        })
        .await?;
    Ok(data.freeze())
}
