use bytes::BytesMut;
use tokio_util::codec::Decoder;
use tracing::trace;

use crate::codec::body::PayloadDecoder;
use crate::codec::header::{HeaderDecoder, parse_payload};
use crate::protocol::{Message, ParseError, PayloadItem, PayloadSize, ResponseHead};

/// Decodes an incoming response as a head message followed by payload items.
///
/// Whether a body follows depends on the request method, callers announce a
/// `HEAD` request through [`ResponseDecoder::expect_body`].
#[derive(Debug)]
pub struct ResponseDecoder {
    header_decoder: HeaderDecoder,
    payload_decoder: Option<PayloadDecoder>,
    expect_body: bool,
}

impl ResponseDecoder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn expect_body(&mut self, expect_body: bool) {
        self.expect_body = expect_body;
    }

    fn on_payload(&mut self, item: Option<PayloadItem>) -> Option<Message<(ResponseHead, PayloadSize)>> {
        match item {
            Some(item @ PayloadItem::Chunk(_)) => Some(Message::Payload(item)),
            Some(PayloadItem::Eof) => {
                self.payload_decoder.take();
                Some(Message::Payload(PayloadItem::Eof))
            }
            None => None,
        }
    }
}

impl Default for ResponseDecoder {
    fn default() -> Self {
        Self { header_decoder: HeaderDecoder, payload_decoder: None, expect_body: true }
    }
}

impl Decoder for ResponseDecoder {
    type Item = Message<(ResponseHead, PayloadSize)>;
    type Error = ParseError;

    fn decode(&mut self, src: &mut BytesMut) -> Result<Option<Self::Item>, Self::Error> {
        if let Some(payload_decoder) = &mut self.payload_decoder {
            let item = payload_decoder.decode(src)?;
            return Ok(self.on_payload(item));
        }

        let Some(head) = self.header_decoder.decode(src)? else {
            return Ok(None);
        };

        let payload_size = parse_payload(&head, self.expect_body)?;
        trace!(status = %head.status(), ?payload_size, "decoded response head");
        self.payload_decoder = Some(payload_size.into());
        Ok(Some(Message::Header((head, payload_size))))
    }

    fn decode_eof(&mut self, src: &mut BytesMut) -> Result<Option<Self::Item>, Self::Error> {
        if let Some(payload_decoder) = &mut self.payload_decoder {
            let item = payload_decoder.decode_eof(src)?;
            return Ok(self.on_payload(item));
        }

        match self.decode(src)? {
            Some(message) => Ok(Some(message)),
            None if src.is_empty() => Ok(None),
            None => Err(ParseError::UnexpectedEof),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use http::StatusCode;
    use indoc::indoc;

    fn collect(decoder: &mut ResponseDecoder, buf: &mut BytesMut) -> (ResponseHead, Vec<u8>) {
        let Some(Message::Header((head, _))) = decoder.decode(buf).unwrap() else {
            panic!("expect response head");
        };
        let mut body = Vec::new();
        loop {
            match decoder.decode(buf).unwrap() {
                Some(Message::Payload(PayloadItem::Chunk(bytes))) => body.extend_from_slice(&bytes),
                Some(Message::Payload(PayloadItem::Eof)) => break,
                other => panic!("unexpected message: {other:?}"),
            }
        }
        (head, body)
    }

    #[test]
    fn chunked_response() {
        let mut buf = BytesMut::from(indoc! {"
            HTTP/1.1 200 OK
            Transfer-Encoding: chunked

            4\r
            Wiki\r
            5\r
            pedia\r
            0\r
            \r
        "});
        let (head, body) = collect(&mut ResponseDecoder::new(), &mut buf);
        assert_eq!(head.status(), StatusCode::OK);
        assert_eq!(body, b"Wikipedia");
    }

    #[test]
    fn head_request_has_no_body() {
        let mut decoder = ResponseDecoder::new();
        decoder.expect_body(false);
        let mut buf = BytesMut::from("HTTP/1.1 200 OK\r\nContent-Length: 1024\r\n\r\n");
        let (_, body) = collect(&mut decoder, &mut buf);
        assert!(body.is_empty());
    }

    #[test]
    fn read_until_close() {
        let mut decoder = ResponseDecoder::new();
        let mut buf = BytesMut::from("HTTP/1.0 200 OK\r\n\r\nall of it");

        assert!(matches!(decoder.decode(&mut buf).unwrap(), Some(Message::Header(_))));
        assert!(matches!(decoder.decode(&mut buf).unwrap(), Some(Message::Payload(PayloadItem::Chunk(_)))));
        assert!(decoder.decode(&mut buf).unwrap().is_none());
        assert!(matches!(decoder.decode_eof(&mut buf).unwrap(), Some(Message::Payload(PayloadItem::Eof))));
        assert!(decoder.decode_eof(&mut buf).unwrap().is_none());
    }

    #[test]
    fn closed_inside_head() {
        let mut buf = BytesMut::from("HTTP/1.1 200 OK\r\nContent-");
        assert!(matches!(ResponseDecoder::new().decode_eof(&mut buf), Err(ParseError::UnexpectedEof)));
    }
}
