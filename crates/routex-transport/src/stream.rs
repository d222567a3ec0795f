//! Minimal HTTP/1.1 framing: one request head in, one response out.

use bytes::{BufMut, BytesMut};
use routex_core::Response;
use std::io;
use tokio::io::{AsyncBufRead, AsyncBufReadExt, AsyncReadExt, Take};

/// Upper bound on the size of a request head.
pub const MAX_HEAD: usize = 16 * 1024;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RequestHead {
    pub method: String,
    pub target: String,
    pub headers: Vec<(String, String)>,
}

impl RequestHead {
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(k, _)| k.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }
}

fn invalid(msg: &str) -> io::Error {
    io::Error::new(io::ErrorKind::InvalidData, msg.to_string())
}

/// Reads one line of the head, failing once the head outgrows `MAX_HEAD`.
async fn next_line<R: AsyncBufRead + Unpin>(reader: &mut Take<R>, line: &mut String) -> io::Result<usize> {
    line.clear();
    let n = reader.read_line(line).await?;
    if !line.ends_with('\n') && reader.limit() == 0 {
        return Err(invalid("request head too large"));
    }
    Ok(n)
}

/// Reads a request line and headers. `Ok(None)` when the peer closed the
/// connection before sending anything.
///
/// Never buffers more than [`MAX_HEAD`] bytes, whatever the peer sends.
pub async fn read_request<R: AsyncBufRead + Unpin>(reader: &mut R) -> io::Result<Option<RequestHead>> {
    let mut reader = reader.take(MAX_HEAD as u64);
    let mut line = String::new();
    if next_line(&mut reader, &mut line).await? == 0 {
        return Ok(None);
    }

    let mut parts = line.split_whitespace();
    let (Some(method), Some(target), Some(version)) = (parts.next(), parts.next(), parts.next()) else {
        return Err(invalid("malformed request line"));
    };
    if !version.starts_with("HTTP/1.") {
        return Err(invalid("unsupported HTTP version"));
    }
    let mut head = RequestHead {
        method: method.to_string(),
        target: target.to_string(),
        headers: Vec::new(),
    };

    loop {
        if next_line(&mut reader, &mut line).await? == 0 {
            return Err(invalid("connection closed inside request head"));
        }
        let trimmed = line.trim_end_matches(['\r', '\n']);
        if trimmed.is_empty() {
            break;
        }
        let (name, value) = trimmed.split_once(':').ok_or_else(|| invalid("malformed header"))?;
        head.headers.push((name.trim().to_string(), value.trim().to_string()));
    }
    Ok(Some(head))
}

pub fn reason(status: u16) -> &'static str {
    match status {
        200 => "OK",
        400 => "Bad Request",
        404 => "Not Found",
        405 => "Method Not Allowed",
        500 => "Internal Server Error",
        _ => "",
    }
}

/// Serialises `response`; `head_only` omits the body (HEAD requests).
pub fn encode_response(response: &Response, head_only: bool) -> BytesMut {
    let mut out = BytesMut::with_capacity(256 + response.body.len());
    out.put_slice(format!("HTTP/1.1 {} {}\r\n", response.status, reason(response.status)).as_bytes());
    if let Some(content_type) = &response.content_type {
        out.put_slice(format!("Content-Type: {}\r\n", content_type).as_bytes());
    }
    for cookie in &response.cookies {
        out.put_slice(format!("Set-Cookie: {}\r\n", cookie.header_value()).as_bytes());
    }
    out.put_slice(format!("Content-Length: {}\r\n", response.body.len()).as_bytes());
    out.put_slice(b"Connection: close\r\n\r\n");
    if !head_only {
        out.put_slice(&response.body);
    }
    out
}
