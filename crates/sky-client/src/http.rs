//! Minimal blocking HTTP/1.0 over a raw socket.
//!
//! Sky speaks plain request/response JSON for everything except bulk
//! ingest. Each request opens a fresh connection and the server closes it
//! after responding (HTTP/1.0 semantics), so the response body is simply
//! read to EOF.

use std::io::{Read, Write};
use std::net::TcpStream;

use tracing::trace;

use crate::error::{ClientError, ClientResult};

/// Content type of a request body.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum BodyKind {
    Json,
    Text,
}

impl BodyKind {
    fn content_type(self) -> &'static str {
        match self {
            BodyKind::Json => "application/json",
            BodyKind::Text => "text/plain",
        }
    }
}

/// A parsed response: status code plus raw body.
#[derive(Debug)]
pub(crate) struct HttpResponse {
    pub status: u16,
    pub body: Vec<u8>,
}

/// Sends one request and reads the full response.
pub(crate) fn send_request(
    host: &str,
    method: &str,
    path: &str,
    body: Option<(&[u8], BodyKind)>,
) -> ClientResult<HttpResponse> {
    let mut stream = TcpStream::connect(host).map_err(|source| ClientError::Connect {
        addr: host.to_string(),
        source,
    })?;

    let mut request = format!("{method} {path} HTTP/1.0\r\nHost: {host}\r\n");
    if let Some((payload, kind)) = body {
        request.push_str(&format!(
            "Content-Type: {}\r\nContent-Length: {}\r\n",
            kind.content_type(),
            payload.len()
        ));
    }
    request.push_str("\r\n");

    trace!(method, path, "sending request");
    stream.write_all(request.as_bytes())?;
    if let Some((payload, _)) = body {
        stream.write_all(payload)?;
    }

    let mut raw = Vec::new();
    stream.read_to_end(&mut raw)?;
    parse_response(&raw)
}

/// Splits a raw HTTP/1.0 response into status code and body.
fn parse_response(raw: &[u8]) -> ClientResult<HttpResponse> {
    let header_end = raw
        .windows(4)
        .position(|quad| quad == b"\r\n\r\n")
        .ok_or_else(|| ClientError::Http {
            reason: "missing header terminator".to_string(),
        })?;

    let head = &raw[..header_end];
    let line_end = head
        .windows(2)
        .position(|pair| pair == b"\r\n")
        .unwrap_or(head.len());
    let status_line = String::from_utf8_lossy(&head[..line_end]);

    // Status line: "HTTP/1.0 200 OK".
    let status = status_line
        .split_whitespace()
        .nth(1)
        .and_then(|code| code.parse::<u16>().ok())
        .ok_or_else(|| ClientError::Http {
            reason: format!("bad status line: {status_line:?}"),
        })?;

    Ok(HttpResponse {
        status,
        body: raw[header_end + 4..].to_vec(),
    })
}
