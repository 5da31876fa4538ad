//! Protocol types shared by the codec, the connection and the transfer engine.
//!
//! - **Messages** ([`Message`], [`PayloadItem`], [`PayloadSize`]): what the codec
//!   reads and writes, a head followed by payload pieces.
//! - **Requests** ([`Request`], [`QueryParams`], [`RequestContext`]): what a driver
//!   asks for, before the connection hooks run.
//! - **Responses** ([`ResponseHead`], [`Response`], [`ResponseFormat`]): the reply,
//!   decompressed and parsed by a format.
//! - **Errors** ([`HttpError`] and the per layer [`SendError`], [`ParseError`],
//!   [`TransferError`]).

mod message;
pub use message::Message;
pub use message::PayloadItem;
pub use message::PayloadSize;

mod endpoint;
pub use endpoint::Endpoint;
pub use endpoint::HTTPS_PORT;
pub use endpoint::HTTP_PORT;

mod request;
pub(crate) use request::join_query;
pub use request::QueryParams;
pub use request::Request;
pub use request::RequestHead;

mod context;
pub use context::RequestContext;

mod response;
pub use response::Response;
pub use response::ResponseHead;
pub use response::decompress_body;

pub mod format;
pub use format::FormatOptions;
pub use format::JsonFormat;
pub use format::ResponseFormat;
pub use format::TextFormat;
pub use format::XmlFormat;

mod xml;
pub use xml::XmlElement;

mod error;
pub use error::HttpError;
pub use error::ParseError;
pub use error::SendError;
pub use error::TransferError;
