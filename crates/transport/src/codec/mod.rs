//! HTTP/1.1 wire codec for the client side of a connection.
//!
//! Outgoing requests are encoded by [`RequestEncoder`] as a head message followed by
//! payload items; incoming responses are decoded by [`ResponseDecoder`] the same way.
//! [`ClientCodec`] joins both so one `Framed` stream carries a whole exchange.
//!
//! ```
//! use bytes::BytesMut;
//! use micro_transport::codec::ResponseDecoder;
//! use micro_transport::protocol::Message;
//! use tokio_util::codec::Decoder;
//!
//! let mut decoder = ResponseDecoder::new();
//! let mut buf = BytesMut::from("HTTP/1.1 204 No Content\r\n\r\n");
//! let message = decoder.decode(&mut buf).unwrap();
//! assert!(matches!(message, Some(Message::Header(_))));
//! ```

mod body;
mod client_codec;
mod header;
mod request_encoder;
mod response_decoder;

pub use client_codec::ClientCodec;
pub use request_encoder::RequestEncoder;
pub use response_decoder::ResponseDecoder;
