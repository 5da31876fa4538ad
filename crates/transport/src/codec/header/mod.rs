//! Request head encoding and response head decoding.
//!
//! - [`HeaderEncoder`] writes the request line and headers, adding the framing
//!   header that matches the body.
//! - [`HeaderDecoder`] parses the status line and headers with `httparse`.

mod header_decoder;
mod header_encoder;

pub use header_decoder::HeaderDecoder;
pub(crate) use header_decoder::parse_payload;
pub use header_encoder::HeaderEncoder;
