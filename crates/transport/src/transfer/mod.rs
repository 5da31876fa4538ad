//! Moving object data between the local system and a storage endpoint.
//!
//! Uploads go out over a [`RawRequest`](crate::connection::RawRequest) through a
//! [`ByteSink`], downloads are read from a [`RawResponse`](crate::connection::RawResponse)
//! body. Both compute a content hash on the way and report a [`TransferResult`].
//!
//! What a provider supports is described by a [`TransferConfig`]; the
//! [`TransferEngine`] applies it.

mod chunks;
pub use chunks::read_in_chunks;

mod hash;
pub use hash::ContentHasher;
pub use hash::HashAlgorithm;

mod sink;
pub use sink::ByteSink;
pub use sink::LocalByteSink;
pub use sink::WriterSink;

mod stream;
pub use stream::stream_data;
pub use stream::upload_data;

mod object;
pub use object::Container;
pub use object::StorageObject;

mod upload;
pub use upload::StreamUploader;
pub use upload::UploadBody;
pub use upload::UploadOutcome;
pub use upload::UploadRequest;
pub use upload::UploadSource;
pub use upload::Uploader;

mod download;
pub use download::SaveOptions;
pub use download::check_object_response;

pub const DEFAULT_CHUNK_SIZE: usize = 8096;

/// Transfer capabilities of a storage provider.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TransferConfig {
    hash_algorithm: HashAlgorithm,
    supports_chunked_encoding: bool,
    strict_mode: bool,
    chunk_size: usize,
}

impl Default for TransferConfig {
    fn default() -> Self {
        Self {
            hash_algorithm: HashAlgorithm::Md5,
            supports_chunked_encoding: false,
            strict_mode: false,
            chunk_size: DEFAULT_CHUNK_SIZE,
        }
    }
}

impl TransferConfig {
    #[must_use]
    pub fn with_hash_algorithm(mut self, hash_algorithm: HashAlgorithm) -> Self {
        self.hash_algorithm = hash_algorithm;
        self
    }

    /// Whether stream uploads may use `Transfer-Encoding: chunked`. Without it a
    /// stream is read into memory first to learn its length.
    #[must_use]
    pub fn with_chunked_encoding(mut self, supports_chunked_encoding: bool) -> Self {
        self.supports_chunked_encoding = supports_chunked_encoding;
        self
    }

    /// Refuse uploads whose content type can't be guessed instead of sending
    /// `application/octet-stream`.
    #[must_use]
    pub fn with_strict_mode(mut self, strict_mode: bool) -> Self {
        self.strict_mode = strict_mode;
        self
    }

    #[must_use]
    pub fn with_chunk_size(mut self, chunk_size: usize) -> Self {
        self.chunk_size = chunk_size;
        self
    }

    pub fn hash_algorithm(&self) -> HashAlgorithm {
        self.hash_algorithm
    }

    pub fn supports_chunked_encoding(&self) -> bool {
        self.supports_chunked_encoding
    }

    pub fn strict_mode(&self) -> bool {
        self.strict_mode
    }

    pub fn chunk_size(&self) -> usize {
        self.chunk_size
    }
}

/// Outcome of one upload or download attempt.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransferResult {
    success: bool,
    content_hash: Option<String>,
    bytes_transferred: u64,
}

impl TransferResult {
    pub(crate) fn new(success: bool, content_hash: Option<String>, bytes_transferred: u64) -> Self {
        Self { success, content_hash, bytes_transferred }
    }

    pub(crate) fn failed(bytes_transferred: u64) -> Self {
        Self::new(false, None, bytes_transferred)
    }

    pub fn success(&self) -> bool {
        self.success
    }

    /// Hex digest of the transferred payload, absent when hashing was off or the transfer failed.
    pub fn content_hash(&self) -> Option<&str> {
        self.content_hash.as_deref()
    }

    pub fn bytes_transferred(&self) -> u64 {
        self.bytes_transferred
    }
}

/// Uploads and downloads objects the way a provider's [`TransferConfig`] allows.
#[derive(Debug, Clone, Default)]
pub struct TransferEngine {
    config: TransferConfig,
}

impl TransferEngine {
    pub fn new(config: TransferConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &TransferConfig {
        &self.config
    }
}
