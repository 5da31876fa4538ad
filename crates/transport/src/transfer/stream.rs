use std::io;
use std::pin::pin;

use bytes::{BufMut, Bytes, BytesMut};
use futures::{Stream, TryStreamExt};
use tracing::{trace, warn};

use crate::protocol::TransferError;
use crate::transfer::{ByteSink, HashAlgorithm, TransferResult, read_in_chunks};

const LAST_CHUNK: &[u8] = b"0\r\n\r\n";

/// Writes `source` to `sink` in pieces of at most `chunk_size` bytes.
///
/// In chunked mode every piece goes out as one `HEX(len)\r\n<data>\r\n` write and the
/// body ends with a single `0\r\n\r\n`; otherwise pieces are written verbatim and an
/// empty source still makes one empty write. `hash` digests the payload without framing.
///
/// A failing write ends the transfer with an unsuccessful [`TransferResult`] counting the
/// bytes sent so far; a failing source is returned as an error.
pub async fn stream_data<K, S>(
    sink: &mut K,
    source: S,
    chunked: bool,
    hash: Option<HashAlgorithm>,
    chunk_size: usize,
) -> Result<TransferResult, TransferError>
where
    K: ByteSink,
    S: Stream<Item = io::Result<Bytes>>,
{
    let mut hasher = hash.map(HashAlgorithm::hasher);
    let mut chunks = pin!(read_in_chunks(source, chunk_size, true));
    let mut bytes_transferred = 0_u64;

    while let Some(chunk) = chunks.try_next().await? {
        let piece = if chunked { frame_chunk(&chunk) } else { chunk.clone() };
        if let Err(e) = sink.write(piece).await {
            warn!(cause = %e, bytes_transferred, "write failed in the middle of a transfer");
            return Ok(TransferResult::failed(bytes_transferred));
        }

        bytes_transferred += chunk.len() as u64;
        if let Some(hasher) = &mut hasher {
            hasher.update(&chunk);
        }
    }

    let tail = match (chunked, bytes_transferred) {
        (true, _) => Some(Bytes::from_static(LAST_CHUNK)),
        (false, 0) => Some(Bytes::new()),
        (false, _) => None,
    };
    if let Some(tail) = tail {
        if let Err(e) = sink.write(tail).await {
            warn!(cause = %e, bytes_transferred, "write failed at the end of a transfer");
            return Ok(TransferResult::failed(bytes_transferred));
        }
    }

    trace!(bytes_transferred, chunked, "streamed data");
    Ok(TransferResult::new(true, hasher.map(|hasher| hasher.finalize_hex()), bytes_transferred))
}

/// Writes an in-memory buffer with a single write.
pub async fn upload_data<K>(sink: &mut K, data: Bytes, hash: Option<HashAlgorithm>) -> TransferResult
where
    K: ByteSink,
{
    let content_hash = hash.map(|algorithm| algorithm.digest_hex(&data));
    let len = data.len() as u64;

    match sink.write(data).await {
        Ok(()) => TransferResult::new(true, content_hash, len),
        Err(e) => {
            warn!(cause = %e, len, "write of buffered data failed");
            TransferResult::failed(0)
        }
    }
}

fn frame_chunk(chunk: &[u8]) -> Bytes {
    let size = format!("{:X}\r\n", chunk.len());
    let mut frame = BytesMut::with_capacity(size.len() + chunk.len() + 2);
    frame.put_slice(size.as_bytes());
    frame.put_slice(chunk);
    frame.put_slice(b"\r\n");
    frame.freeze()
}
