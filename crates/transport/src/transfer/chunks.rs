use std::pin::Pin;

use bytes::{Bytes, BytesMut};
use futures::{Stream, TryStreamExt};

struct Chunker<S> {
    source: Pin<Box<S>>,
    pending: BytesMut,
    exhausted: bool,
}

/// Re-chunks `source` into pieces of at most `chunk_size` bytes.
///
/// With `fill_size` every piece but the last is exactly `chunk_size` bytes; without it
/// pieces are passed on as they arrive, only split when too large. Empty pieces are skipped.
pub fn read_in_chunks<S, E>(source: S, chunk_size: usize, fill_size: bool) -> impl Stream<Item = Result<Bytes, E>>
where
    S: Stream<Item = Result<Bytes, E>>,
{
    let chunk_size = chunk_size.max(1);
    let chunker = Chunker { source: Box::pin(source), pending: BytesMut::new(), exhausted: false };

    futures::stream::try_unfold(chunker, move |mut chunker| async move {
        loop {
            let ready = if fill_size { chunker.pending.len() >= chunk_size } else { !chunker.pending.is_empty() };
            if ready || (chunker.exhausted && !chunker.pending.is_empty()) {
                let len = chunker.pending.len().min(chunk_size);
                let chunk = chunker.pending.split_to(len).freeze();
                return Ok(Some((chunk, chunker)));
            }
            if chunker.exhausted {
                return Ok(None);
            }

            match chunker.source.try_next().await? {
                Some(data) => chunker.pending.extend_from_slice(&data),
                None => chunker.exhausted = true,
            }
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io;

    fn source(pieces: &[&'static [u8]]) -> impl Stream<Item = io::Result<Bytes>> {
        futures::stream::iter(pieces.iter().map(|piece| Ok(Bytes::from_static(piece))).collect::<Vec<_>>())
    }

    async fn lengths(stream: impl Stream<Item = io::Result<Bytes>>) -> Vec<usize> {
        stream.map_ok(|chunk| chunk.len()).try_collect().await.unwrap()
    }

    #[tokio::test]
    async fn fill_to_chunk_size() {
        let stream = read_in_chunks(source(&[b"ab", b"cde", b"", b"fghij"]), 4, true);
        assert_eq!(lengths(stream).await, vec![4, 4, 2]);
    }

    #[tokio::test]
    async fn pass_through_and_split() {
        let stream = read_in_chunks(source(&[b"ab", b"", b"cdefghij"]), 3, false);
        assert_eq!(lengths(stream).await, vec![2, 3, 3, 2]);
    }

    #[tokio::test]
    async fn empty_source() {
        let stream = read_in_chunks(source(&[]), 8, true);
        assert!(lengths(stream).await.is_empty());
    }

    #[tokio::test]
    async fn source_error_is_forwarded() {
        let failing = futures::stream::iter(vec![Ok(Bytes::from_static(b"abc")), Err(io::Error::other("boom"))]);
        let mut stream = Box::pin(read_in_chunks(failing, 2, false));
        assert_eq!(stream.try_next().await.unwrap().unwrap(), Bytes::from_static(b"ab"));
        assert_eq!(stream.try_next().await.unwrap().unwrap(), Bytes::from_static(b"c"));
        assert!(stream.try_next().await.is_err());
    }
}
