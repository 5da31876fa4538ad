use std::io;

use bytes::Bytes;
use tokio::io::{AsyncWrite, AsyncWriteExt};

/// Destination of a transfer: every call is one write of an already framed piece.
#[trait_variant::make(ByteSink: Send)]
pub trait LocalByteSink {
    async fn write(&mut self, data: Bytes) -> io::Result<()>;
}

/// A [`ByteSink`] over any `AsyncWrite`.
#[derive(Debug)]
pub struct WriterSink<W> {
    writer: W,
}

impl<W: AsyncWrite + Unpin + Send> WriterSink<W> {
    pub fn new(writer: W) -> Self {
        Self { writer }
    }

    pub fn get_ref(&self) -> &W {
        &self.writer
    }

    pub fn into_inner(self) -> W {
        self.writer
    }
}

impl<W: AsyncWrite + Unpin + Send> ByteSink for WriterSink<W> {
    async fn write(&mut self, data: Bytes) -> io::Result<()> {
        self.writer.write_all(&data).await
    }
}

#[cfg(test)]
mod tests {
    use super::{ByteSink, WriterSink};
    use bytes::Bytes;

    #[tokio::test]
    async fn writes_through() {
        let mut sink = WriterSink::new(Vec::new());
        sink.write(Bytes::from_static(b"abc")).await.unwrap();
        sink.write(Bytes::from_static(b"def")).await.unwrap();
        assert_eq!(sink.into_inner(), b"abcdef");
    }
}
