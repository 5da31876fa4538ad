use std::io;
use std::path::{MAIN_SEPARATOR, Path, PathBuf};
use std::pin::pin;

use bytes::Bytes;
use futures::{Stream, TryStreamExt};
use http::StatusCode;
use tokio::fs::File;
use tokio::io::AsyncWriteExt;
use tracing::{debug, warn};

use crate::connection::RawResponse;
use crate::protocol::{HttpError, TransferError};
use crate::transfer::{StorageObject, TransferEngine, TransferResult, read_in_chunks};

/// How [`TransferEngine::save_object`] treats the destination.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SaveOptions {
    overwrite_existing: bool,
    delete_on_failure: bool,
    chunk_size: Option<usize>,
}

impl Default for SaveOptions {
    fn default() -> Self {
        Self { overwrite_existing: false, delete_on_failure: true, chunk_size: None }
    }
}

impl SaveOptions {
    #[must_use]
    pub fn with_overwrite_existing(mut self, overwrite_existing: bool) -> Self {
        self.overwrite_existing = overwrite_existing;
        self
    }

    /// Remove the partially written file when the download fails.
    #[must_use]
    pub fn with_delete_on_failure(mut self, delete_on_failure: bool) -> Self {
        self.delete_on_failure = delete_on_failure;
        self
    }

    #[must_use]
    pub fn with_chunk_size(mut self, chunk_size: usize) -> Self {
        self.chunk_size = Some(chunk_size);
        self
    }
}

impl TransferEngine {
    /// Writes an object body to `destination`.
    ///
    /// A directory destination, or one ending with a path separator, receives a file
    /// named after the object. The download fails, without an error, when the body is
    /// empty, breaks off, or its length differs from the object's size; the partial file
    /// is then removed unless disabled in `options`. A local write error is returned
    /// as an error, after the same cleanup.
    pub async fn save_object<S>(
        &self,
        body: S,
        obj: &StorageObject,
        destination: impl AsRef<Path>,
        options: SaveOptions,
    ) -> Result<TransferResult, TransferError>
    where
        S: Stream<Item = Result<Bytes, HttpError>>,
    {
        let file_path = resolve_destination(destination.as_ref(), obj.name()).await?;
        if !options.overwrite_existing && tokio::fs::try_exists(&file_path).await? {
            return Err(TransferError::FileExists { path: file_path });
        }

        let chunk_size = options.chunk_size.unwrap_or(self.config.chunk_size());
        let mut chunks = pin!(read_in_chunks(body, chunk_size, false));

        let mut chunk = match chunks.try_next().await {
            Ok(Some(chunk)) => chunk,
            Ok(None) => {
                debug!(object = obj.name(), "empty response body, nothing saved");
                return Ok(TransferResult::failed(0));
            }
            Err(e) => {
                warn!(object = obj.name(), cause = %e, "can't read object body");
                return Ok(TransferResult::failed(0));
            }
        };

        let mut hasher = self.config.hash_algorithm().hasher();
        let mut bytes_transferred = 0_u64;
        let mut file = File::create(&file_path).await?;

        let written: io::Result<bool> = async {
            loop {
                file.write_all(&chunk).await?;
                hasher.update(&chunk);
                bytes_transferred += chunk.len() as u64;

                match chunks.try_next().await {
                    Ok(Some(next)) => chunk = next,
                    Ok(None) => break,
                    Err(e) => {
                        warn!(object = obj.name(), bytes_transferred, cause = %e, "object body broke off");
                        return Ok(false);
                    }
                }
            }
            file.flush().await?;
            Ok(true)
        }
        .await;
        drop(file);

        let complete = match written {
            Ok(complete) => complete,
            Err(e) => {
                warn!(object = obj.name(), path = %file_path.display(), bytes_transferred, cause = %e, "can't write object to disk");
                if options.delete_on_failure {
                    remove_partial(&file_path).await;
                }
                return Err(e.into());
            }
        };

        if complete && bytes_transferred == obj.size() {
            debug!(object = obj.name(), path = %file_path.display(), bytes_transferred, "object saved");
            return Ok(TransferResult::new(true, Some(hasher.finalize_hex()), bytes_transferred));
        }

        warn!(object = obj.name(), expected = obj.size(), bytes_transferred, "object download incomplete");
        if options.delete_on_failure {
            remove_partial(&file_path).await;
        }
        Ok(TransferResult::failed(bytes_transferred))
    }

    /// The object body as a stream of `chunk_size` pieces.
    pub fn download_as_stream<S>(&self, body: S, chunk_size: Option<usize>) -> impl Stream<Item = Result<Bytes, HttpError>>
    where
        S: Stream<Item = Result<Bytes, HttpError>>,
    {
        read_in_chunks(body, chunk_size.unwrap_or(self.config.chunk_size()), true)
    }
}

/// Checks the status of an object request before its body is used.
///
/// `expected` lets the transfer go on, 404 means the object does not exist, anything
/// else is unexpected.
pub async fn check_object_response(
    response: &mut RawResponse,
    obj: &StorageObject,
    expected: StatusCode,
) -> Result<(), HttpError> {
    match response.status().await? {
        status if status == expected => Ok(()),
        StatusCode::NOT_FOUND => Err(TransferError::ObjectNotFound { name: obj.name().to_string() }.into()),
        status => Err(TransferError::UnexpectedStatus { status }.into()),
    }
}

async fn remove_partial(path: &Path) {
    if let Err(e) = tokio::fs::remove_file(path).await {
        warn!(path = %path.display(), cause = %e, "can't remove partially downloaded file");
    }
}

async fn resolve_destination(destination: &Path, object_name: &str) -> Result<PathBuf, TransferError> {
    let raw = destination.as_os_str().to_string_lossy();
    if raw.ends_with(MAIN_SEPARATOR) || raw.ends_with('/') {
        if !tokio::fs::try_exists(destination).await? {
            return Err(TransferError::PathNotFound { path: destination.to_path_buf() });
        }
        return Ok(destination.join(object_name));
    }

    if tokio::fs::metadata(destination).await.is_ok_and(|metadata| metadata.is_dir()) {
        return Ok(destination.join(object_name));
    }

    match destination.parent() {
        Some(parent) if !parent.as_os_str().is_empty() && !tokio::fs::try_exists(parent).await? => {
            Err(TransferError::PathNotFound { path: parent.to_path_buf() })
        }
        _ => Ok(destination.to_path_buf()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::codec::ClientCodec;
    use crate::connection::BoxedStream;
    use crate::protocol::ParseError;
    use crate::transfer::HashAlgorithm;
    use tokio_util::codec::Framed;

    fn body(pieces: &[&'static [u8]]) -> impl Stream<Item = Result<Bytes, HttpError>> {
        futures::stream::iter(pieces.iter().map(|piece| Ok(Bytes::from_static(piece))).collect::<Vec<_>>())
    }

    #[tokio::test]
    async fn save_into_directory() {
        let dir = tempfile::tempdir().unwrap();
        let engine = TransferEngine::default();
        let obj = StorageObject::new("report.txt", 11);

        let result = engine.save_object(body(&[b"hello ", b"world"]), &obj, dir.path(), SaveOptions::default()).await.unwrap();

        assert!(result.success());
        assert_eq!(result.bytes_transferred(), 11);
        assert_eq!(result.content_hash(), Some(HashAlgorithm::Md5.digest_hex(b"hello world").as_str()));
        assert_eq!(std::fs::read(dir.path().join("report.txt")).unwrap(), b"hello world");
    }

    #[tokio::test]
    async fn size_mismatch_removes_partial_file() {
        let dir = tempfile::tempdir().unwrap();
        let engine = TransferEngine::default();
        let obj = StorageObject::new("a.bin", 100);
        let target = dir.path().join("a.bin");

        let result = engine.save_object(body(&[b"short"]), &obj, &target, SaveOptions::default()).await.unwrap();
        assert!(!result.success());
        assert_eq!(result.bytes_transferred(), 5);
        assert!(!target.exists());

        let keep = SaveOptions::default().with_delete_on_failure(false);
        let result = engine.save_object(body(&[b"short"]), &obj, &target, keep).await.unwrap();
        assert!(!result.success());
        assert!(target.exists());
    }

    #[tokio::test]
    async fn broken_body_is_a_failed_transfer() {
        let dir = tempfile::tempdir().unwrap();
        let obj = StorageObject::new("a.bin", 10);
        let target = dir.path().join("a.bin");
        let broken = futures::stream::iter(vec![Ok(Bytes::from_static(b"abc")), Err(HttpError::from(ParseError::UnexpectedEof))]);

        let result = TransferEngine::default().save_object(broken, &obj, &target, SaveOptions::default()).await.unwrap();
        assert!(!result.success());
        assert!(!target.exists());
    }

    #[cfg(target_os = "linux")]
    #[tokio::test]
    async fn disk_write_error_removes_partial_file() {
        let dir = tempfile::tempdir().unwrap();
        let obj = StorageObject::new("a.bin", 6);
        // every write to /dev/full fails with ENOSPC
        let target = dir.path().join("a.bin");
        std::os::unix::fs::symlink("/dev/full", &target).unwrap();

        let options = SaveOptions::default().with_overwrite_existing(true);
        let err = TransferEngine::default().save_object(body(&[b"abc", b"def"]), &obj, &target, options).await.unwrap_err();

        assert!(matches!(err, TransferError::Io { .. }));
        assert!(std::fs::symlink_metadata(&target).is_err());
    }

    #[tokio::test]
    async fn empty_body_creates_nothing() {
        let dir = tempfile::tempdir().unwrap();
        let obj = StorageObject::new("empty", 0);

        let result = TransferEngine::default().save_object(body(&[]), &obj, dir.path(), SaveOptions::default()).await.unwrap();
        assert!(!result.success());
        assert!(!dir.path().join("empty").exists());
    }

    #[tokio::test]
    async fn destination_checks() {
        let dir = tempfile::tempdir().unwrap();
        let engine = TransferEngine::default();
        let obj = StorageObject::new("a.txt", 1);

        let missing_dir = format!("{}/nope/", dir.path().display());
        let err = engine.save_object(body(&[b"x"]), &obj, &missing_dir, SaveOptions::default()).await.unwrap_err();
        assert!(matches!(err, TransferError::PathNotFound { .. }));

        let orphan = dir.path().join("nope").join("a.txt");
        let err = engine.save_object(body(&[b"x"]), &obj, &orphan, SaveOptions::default()).await.unwrap_err();
        assert!(matches!(err, TransferError::PathNotFound { .. }));

        let existing = dir.path().join("a.txt");
        std::fs::write(&existing, b"old").unwrap();
        let err = engine.save_object(body(&[b"x"]), &obj, &existing, SaveOptions::default()).await.unwrap_err();
        assert!(matches!(err, TransferError::FileExists { .. }));

        let overwrite = SaveOptions::default().with_overwrite_existing(true);
        let result = engine.save_object(body(&[b"x"]), &obj, &existing, overwrite).await.unwrap();
        assert!(result.success());
        assert_eq!(std::fs::read(&existing).unwrap(), b"x");
    }

    #[tokio::test]
    async fn stream_in_fixed_chunks() {
        let engine = TransferEngine::default();
        let chunks: Vec<Bytes> = engine.download_as_stream(body(&[b"abcde", b"fgh"]), Some(3)).try_collect().await.unwrap();
        assert_eq!(chunks, vec![Bytes::from_static(b"abc"), Bytes::from_static(b"def"), Bytes::from_static(b"gh")]);
    }

    async fn response_with_status(status_line: &'static [u8]) -> RawResponse {
        let (client, mut server) = tokio::io::duplex(1024);
        server.write_all(status_line).await.unwrap();
        drop(server);
        RawResponse::new(Framed::new(Box::new(client) as BoxedStream, ClientCodec::new()))
    }

    #[tokio::test]
    async fn object_status_dispatch() {
        let obj = StorageObject::new("a.txt", 1);

        let mut ok = response_with_status(b"HTTP/1.1 200 OK\r\nContent-Length: 1\r\n\r\nx").await;
        check_object_response(&mut ok, &obj, StatusCode::OK).await.unwrap();

        let mut missing = response_with_status(b"HTTP/1.1 404 Not Found\r\nContent-Length: 0\r\n\r\n").await;
        let err = check_object_response(&mut missing, &obj, StatusCode::OK).await.unwrap_err();
        assert!(matches!(err, HttpError::TransferError { source: TransferError::ObjectNotFound { name } } if name == "a.txt"));

        let mut denied = response_with_status(b"HTTP/1.1 403 Forbidden\r\nContent-Length: 0\r\n\r\n").await;
        let err = check_object_response(&mut denied, &obj, StatusCode::OK).await.unwrap_err();
        assert!(matches!(
            err,
            HttpError::TransferError { source: TransferError::UnexpectedStatus { status: StatusCode::FORBIDDEN } }
        ));
    }
}
