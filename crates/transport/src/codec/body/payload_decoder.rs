use bytes::BytesMut;
use tokio_util::codec::Decoder;

use crate::codec::body::chunked_decoder::ChunkedDecoder;
use crate::codec::body::length_decoder::LengthDecoder;
use crate::protocol::{ParseError, PayloadItem, PayloadSize};

/// Decodes a response body with the strategy its head announced.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PayloadDecoder {
    kind: Kind,
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum Kind {
    Length(LengthDecoder),
    Chunked(ChunkedDecoder),
    /// everything up to the server closing the connection
    UntilClose,
    NoBody,
}

impl PayloadDecoder {
    pub fn empty() -> Self {
        Self { kind: Kind::NoBody }
    }

    pub fn chunked() -> Self {
        Self { kind: Kind::Chunked(ChunkedDecoder::new()) }
    }

    pub fn fix_length(size: u64) -> Self {
        Self { kind: Kind::Length(LengthDecoder::new(size)) }
    }

    pub fn until_close() -> Self {
        Self { kind: Kind::UntilClose }
    }

    pub fn is_until_close(&self) -> bool {
        matches!(self.kind, Kind::UntilClose)
    }

    /// Called once the peer closed the stream.
    ///
    /// Only a read-to-close body may legally end here, every other framing
    /// still missing bytes is reported as [`ParseError::UnexpectedEof`].
    pub fn decode_eof(&mut self, src: &mut BytesMut) -> Result<Option<PayloadItem>, ParseError> {
        if self.is_until_close() {
            if src.is_empty() {
                return Ok(Some(PayloadItem::Eof));
            }
            return Ok(Some(PayloadItem::Chunk(src.split().freeze())));
        }

        match self.decode(src)? {
            Some(item) => Ok(Some(item)),
            None => Err(ParseError::UnexpectedEof),
        }
    }
}

impl From<PayloadSize> for PayloadDecoder {
    fn from(payload_size: PayloadSize) -> Self {
        match payload_size {
            PayloadSize::Length(n) => PayloadDecoder::fix_length(n),
            PayloadSize::Chunked => PayloadDecoder::chunked(),
            PayloadSize::UntilClose => PayloadDecoder::until_close(),
            PayloadSize::Empty => PayloadDecoder::empty(),
        }
    }
}

impl Decoder for PayloadDecoder {
    type Item = PayloadItem;
    type Error = ParseError;

    fn decode(&mut self, src: &mut BytesMut) -> Result<Option<Self::Item>, Self::Error> {
        match &mut self.kind {
            Kind::Length(decoder) => decoder.decode(src),
            Kind::Chunked(decoder) => decoder.decode(src),
            Kind::UntilClose => {
                if src.is_empty() {
                    Ok(None)
                } else {
                    Ok(Some(PayloadItem::Chunk(src.split().freeze())))
                }
            }
            Kind::NoBody => Ok(Some(PayloadItem::Eof)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn until_close_ends_with_stream() {
        let mut decoder = PayloadDecoder::from(PayloadSize::UntilClose);
        let mut buf = BytesMut::from(&b"partial"[..]);

        assert_eq!(decoder.decode(&mut buf).unwrap().unwrap().as_bytes().unwrap(), "partial");
        assert!(decoder.decode(&mut buf).unwrap().is_none());

        buf.extend_from_slice(b"tail");
        assert_eq!(decoder.decode_eof(&mut buf).unwrap().unwrap().as_bytes().unwrap(), "tail");
        assert!(decoder.decode_eof(&mut buf).unwrap().unwrap().is_eof());
    }

    #[test]
    fn truncated_length_is_unexpected_eof() {
        let mut decoder = PayloadDecoder::from(PayloadSize::Length(10));
        let mut buf = BytesMut::new();
        assert!(matches!(decoder.decode_eof(&mut buf), Err(ParseError::UnexpectedEof)));
    }
}
