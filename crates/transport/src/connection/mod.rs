//! Issuing requests against a provider endpoint.
//!
//! # Components
//!
//! - [`Connection`]: builds one request through the [`ConnectionHooks`], writes it over
//!   a fresh stream and parses the response with a
//!   [`ResponseFormat`](crate::protocol::ResponseFormat)
//! - [`RawRequest`] / [`RawResponse`]: the streaming variant used for object bodies
//! - [`PollingConnection`]: submit-then-poll for asynchronous provider jobs
//! - [`Connector`]: how streams are opened, plain or TLS through [`open_stream`]
//!
//! Requests and response heads can be logged as `curl` command lines, see [`CURL_TARGET`].

mod config;
pub use config::ConnectionConfig;

mod connector;
pub use connector::BoxedStream;
pub use connector::Connector;
pub use connector::IoStream;
pub use connector::MaybeTlsStream;
pub use connector::TcpConnector;
pub use connector::TimedStream;
pub use connector::open_stream;

mod hooks;
#[cfg(test)]
pub(crate) use hooks::MockConnectionHooks;
pub use hooks::ConnectionHooks;
pub use hooks::DefaultHooks;

mod curl;
pub use curl::CURL_TARGET;
pub use curl::curl_command;

mod raw;
pub use raw::RawRequest;
pub use raw::RawResponse;

mod http_connection;
pub use http_connection::Connection;

mod polling;
pub use polling::AsyncJob;
pub use polling::PollConfig;
pub use polling::PollTarget;
pub use polling::PollingConnection;
