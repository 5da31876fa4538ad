use bytes::{Buf, BytesMut};
use http::Method;
use tokio_util::codec::{Decoder, Encoder};

use crate::codec::{RequestEncoder, ResponseDecoder};
use crate::protocol::{Message, ParseError, PayloadSize, RequestHead, ResponseHead, SendError};

/// Both halves of one HTTP/1.1 exchange, for use with `tokio_util::codec::Framed`.
///
/// Encoding a request head tells the decoder whether the response will carry a body.
#[derive(Debug, Default)]
pub struct ClientCodec {
    encoder: RequestEncoder,
    decoder: ResponseDecoder,
}

impl ClientCodec {
    pub fn new() -> Self {
        Self::default()
    }
}

impl<D: Buf> Encoder<Message<(RequestHead, PayloadSize), D>> for ClientCodec {
    type Error = SendError;

    fn encode(&mut self, item: Message<(RequestHead, PayloadSize), D>, dst: &mut BytesMut) -> Result<(), Self::Error> {
        if let Message::Header((head, _)) = &item {
            self.decoder.expect_body(*head.method() != Method::HEAD);
        }
        self.encoder.encode(item, dst)
    }
}

impl Decoder for ClientCodec {
    type Item = Message<(ResponseHead, PayloadSize)>;
    type Error = ParseError;

    fn decode(&mut self, src: &mut BytesMut) -> Result<Option<Self::Item>, Self::Error> {
        self.decoder.decode(src)
    }

    fn decode_eof(&mut self, src: &mut BytesMut) -> Result<Option<Self::Item>, Self::Error> {
        self.decoder.decode_eof(src)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::protocol::PayloadItem;
    use bytes::Bytes;
    use futures::{SinkExt, StreamExt};
    use http::Request;
    use tokio::io::{AsyncReadExt, AsyncWriteExt};
    use tokio_util::codec::Framed;

    #[tokio::test]
    async fn head_request_over_framed() {
        let (client, mut server) = tokio::io::duplex(1024);
        let mut framed = Framed::new(client, ClientCodec::new());

        let head = Request::builder().method(Method::HEAD).uri("/c/o").header("host", "h").body(()).unwrap();
        framed.send(Message::<_, Bytes>::Header((head, PayloadSize::Empty))).await.unwrap();

        let mut buf = vec![0; 64];
        let n = server.read(&mut buf).await.unwrap();
        assert_eq!(&buf[..n], b"HEAD /c/o HTTP/1.1\r\nhost: h\r\n\r\n");

        server.write_all(b"HTTP/1.1 200 OK\r\nContent-Length: 512\r\nEtag: abc\r\n\r\n").await.unwrap();

        let Some(Ok(Message::Header((head, size)))) = framed.next().await else {
            panic!("expect response head");
        };
        assert_eq!(head.headers()["etag"], "abc");
        assert!(size.is_empty());
        assert!(matches!(framed.next().await, Some(Ok(Message::Payload(PayloadItem::Eof)))));
    }
}
