//! Debug logging of the wire traffic, as `curl` command lines.
//!
//! Enable the `micro_transport::curl` target at `DEBUG` to get every request as a
//! shell command that replays it, and every response head as received.

use std::fmt::Write;

use http::Method;
use tracing::{Level, debug, enabled};

use crate::protocol::{Endpoint, RequestHead, ResponseHead};

pub const CURL_TARGET: &str = "micro_transport::curl";

pub(crate) fn log_request(endpoint: &Endpoint, head: &RequestHead, body: Option<&[u8]>) {
    if enabled!(target: CURL_TARGET, Level::DEBUG) {
        debug!(target: CURL_TARGET, "{}", curl_command(endpoint, head, body));
    }
}

pub(crate) fn log_response(head: &ResponseHead) {
    if enabled!(target: CURL_TARGET, Level::DEBUG) {
        let mut text = format!("{:?} {} {}\r\n", head.version(), head.status().as_u16(), head.reason());
        for (name, value) in head.headers() {
            let _ = write!(text, "{name}: {}\r\n", String::from_utf8_lossy(value.as_bytes()));
        }
        debug!(target: CURL_TARGET, "{text}");
    }
}

/// A `curl` invocation equivalent to sending `head` and `body` to `endpoint`.
pub fn curl_command(endpoint: &Endpoint, head: &RequestHead, body: Option<&[u8]>) -> String {
    let mut cmd = vec!["curl".to_string(), "-i".to_string()];

    if head.method() == Method::HEAD {
        cmd.push("--head".to_string());
    } else {
        cmd.push("-X".to_string());
        cmd.push(shell_quote(head.method().as_str()));
    }

    for (name, value) in head.headers() {
        cmd.push("-H".to_string());
        cmd.push(shell_quote(&format!("{name}: {}", String::from_utf8_lossy(value.as_bytes()))));
    }

    if let Some(body) = body.filter(|body| !body.is_empty()) {
        cmd.push("--data-binary".to_string());
        cmd.push(shell_quote(&String::from_utf8_lossy(body)));
    }

    cmd.push("--compress".to_string());
    cmd.push(shell_quote(&format!("{}://{}:{}{}", endpoint.scheme(), endpoint.host(), endpoint.port(), head.uri())));
    cmd.join(" ")
}

fn shell_quote(s: &str) -> String {
    if s.is_empty() {
        return "''".to_string();
    }
    if s.bytes().all(|b| b.is_ascii_alphanumeric() || b"@%_-+=:,./".contains(&b)) {
        return s.to_string();
    }
    format!("'{}'", s.replace('\'', r#"'"'"'"#))
}
