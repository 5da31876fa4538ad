//! An asynchronous HTTP/1.1 transport for cloud API clients
//!
//! This crate provides the plumbing provider drivers build on: a connection that shapes
//! every request through provider hooks and parses every response through a format,
//! a submit-then-poll loop for asynchronous jobs, and a streaming engine that uploads
//! and downloads object data while hashing it.
//!
//! # Features
//!
//! - HTTP/1.1 over plain TCP or rustls
//! - Content-length, chunked and read-to-close response bodies
//! - Transparent gzip and deflate response decompression
//! - Text, JSON and XML response formats with per format success codes
//! - Raw requests whose body is streamed by the caller
//! - Polling of long running jobs with interval and timeout
//! - Object upload and download with MD5, SHA-1 or SHA-256 digests
//! - `curl` command logging of the traffic
//!
//! # Example
//!
//! ```no_run
//! use micro_transport::connection::{Connection, ConnectionConfig};
//! use micro_transport::protocol::{JsonFormat, Request};
//! use tracing::{error, info};
//!
//! #[tokio::main]
//! async fn main() {
//!     tracing_subscriber::fmt().init();
//!
//!     let config = match ConnectionConfig::from_url("https://api.example.com/v2") {
//!         Ok(config) => config.with_driver("example"),
//!         Err(e) => {
//!             error!(cause = %e, "invalid endpoint");
//!             return;
//!         }
//!     };
//!
//!     let mut connection = Connection::new(config).with_format(JsonFormat::new());
//!     match connection.send(Request::get("/servers").param("limit", "10")).await {
//!         Ok(response) => info!(status = %response.status(), body = %response.object(), "listed servers"),
//!         Err(e) => error!(cause = %e, "request failed"),
//!     }
//! }
//! ```
//!
//! # Architecture
//!
//! The crate is organized into several key modules:
//!
//! - [`codec`]: encoding of requests and decoding of responses on the wire
//! - [`connection`]: connections, raw exchanges, polling and stream connectors
//! - [`protocol`]: requests, responses, formats, endpoints and errors
//! - [`transfer`]: object upload and download
//!
//! # Error Handling
//!
//! Every fallible operation returns a [`protocol::HttpError`], which wraps the error of
//! the layer that failed:
//!
//! - [`protocol::SendError`]: building, connecting or writing a request
//! - [`protocol::ParseError`]: reading or parsing a response
//! - [`protocol::TransferError`]: local files and object transfers
//!
//! A transfer that moved fewer bytes than expected is not an error: it is reported as an
//! unsuccessful [`transfer::TransferResult`].

pub mod codec;
pub mod connection;
pub mod protocol;
pub mod transfer;

mod utils;
pub(crate) use utils::ensure;
