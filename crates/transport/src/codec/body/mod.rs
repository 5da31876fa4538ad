//! Body framing for both directions.
//!
//! Requests are written with [`PayloadEncoder`] (`Content-Length` or chunked),
//! responses are read with [`PayloadDecoder`] (`Content-Length`, chunked or
//! read-to-close).

mod chunked_decoder;
mod chunked_encoder;
mod length_decoder;
mod length_encoder;
mod payload_decoder;
mod payload_encoder;

pub use payload_decoder::PayloadDecoder;
pub use payload_encoder::PayloadEncoder;
