use bytes::{Buf, BytesMut};
use thiserror::Error;
use tokio::io::{AsyncRead, AsyncReadExt};

use crate::http::headers::HeaderMap;
use crate::http::request::{Method, RequestHead};
use crate::http::response::ResponseHead;

/// Largest request or response head accepted before giving up.
pub const MAX_HEAD_SIZE: usize = 64 * 1024;

const READ_CHUNK: usize = 4096;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ParseError {
    #[error("malformed start line")]
    InvalidRequest,
    #[error("invalid method token")]
    InvalidMethod,
    #[error("malformed header line")]
    InvalidHeader,
    #[error("invalid or conflicting Content-Length")]
    InvalidContentLength,
    #[error("malformed status line")]
    InvalidStatus,
    #[error("malformed chunked body")]
    InvalidChunk,
    #[error("message head exceeds {MAX_HEAD_SIZE} bytes")]
    HeadTooLarge,
    #[error("incomplete message head")]
    Incomplete,
}

/// Parses a request head from the front of `buf`.
///
/// Only the head is consumed; body bytes stay in the buffer and are handed to
/// a body reader. Returns the head and the number of bytes it occupied.
pub fn parse_request_head(buf: &[u8]) -> Result<(RequestHead, usize), ParseError> {
    // Stray CRLFs before the request line are allowed.
    let skipped = buf
        .chunks_exact(2)
        .take_while(|pair| *pair == b"\r\n")
        .count()
        * 2;
    let buf = &buf[skipped..];

    let headers_end = find_headers_end(buf).ok_or(ParseError::Incomplete)?;
    let headers_str = std::str::from_utf8(&buf[..headers_end])
        .map_err(|_| ParseError::InvalidRequest)?;

    let mut lines = headers_str.split("\r\n");

    // Request line
    let request_line = lines.next().ok_or(ParseError::InvalidRequest)?;
    let mut parts = request_line.split_whitespace();

    let method_str = parts.next().ok_or(ParseError::InvalidRequest)?;
    let target = parts.next().ok_or(ParseError::InvalidRequest)?;
    let version = parts.next().ok_or(ParseError::InvalidRequest)?;

    if parts.next().is_some() || !version.starts_with("HTTP/") {
        return Err(ParseError::InvalidRequest);
    }

    let method = Method::from_str(method_str).ok_or(ParseError::InvalidMethod)?;
    let headers = parse_headers(lines)?;

    // Validate framing up front so body readers can trust it.
    headers.content_length()?;

    let request = RequestHead {
        method,
        target: target.to_string(),
        version: version.to_string(),
        headers,
    };

    Ok((request, skipped + headers_end + 4))
}

/// Parses a response head (status line and headers) from the front of `buf`.
pub fn parse_response_head(buf: &[u8]) -> Result<(ResponseHead, usize), ParseError> {
    let headers_end = find_headers_end(buf).ok_or(ParseError::Incomplete)?;
    let headers_str = std::str::from_utf8(&buf[..headers_end])
        .map_err(|_| ParseError::InvalidStatus)?;

    let mut lines = headers_str.split("\r\n");

    let status_line = lines.next().ok_or(ParseError::InvalidStatus)?;
    let mut parts = status_line.splitn(3, ' ');

    let version = parts.next().ok_or(ParseError::InvalidStatus)?;
    if !version.starts_with("HTTP/") {
        return Err(ParseError::InvalidStatus);
    }

    let code = parts.next().ok_or(ParseError::InvalidStatus)?;
    if code.len() != 3 || !code.bytes().all(|b| b.is_ascii_digit()) {
        return Err(ParseError::InvalidStatus);
    }
    let status: u16 = code.parse().map_err(|_| ParseError::InvalidStatus)?;
    let reason = parts.next().unwrap_or("").trim();

    let headers = parse_headers(lines)?;

    Ok((
        ResponseHead {
            status,
            reason: reason.to_string(),
            headers,
        },
        headers_end + 4,
    ))
}

fn parse_headers<'a>(lines: impl Iterator<Item = &'a str>) -> Result<HeaderMap, ParseError> {
    let mut headers = HeaderMap::new();

    for line in lines {
        if line.is_empty() {
            continue;
        }

        let (key, value) = line.split_once(':').ok_or(ParseError::InvalidHeader)?;
        let key = key.trim();
        if key.is_empty() || key.contains(char::is_whitespace) {
            return Err(ParseError::InvalidHeader);
        }

        headers.append(key, value.trim());
    }

    Ok(headers)
}

fn find_headers_end(buf: &[u8]) -> Option<usize> {
    buf.windows(4).position(|w| w == b"\r\n\r\n")
}

/// Reads from `reader` until `parse` can produce a head.
///
/// Bytes past the head remain in `buffer`. Returns `Ok(None)` when the peer
/// closed the connection before sending anything.
pub async fn read_head<R, T>(
    reader: &mut R,
    buffer: &mut BytesMut,
    parse: fn(&[u8]) -> Result<(T, usize), ParseError>,
) -> anyhow::Result<Option<T>>
where
    R: AsyncRead + Unpin,
{
    loop {
        if !buffer.is_empty() {
            match parse(buffer) {
                Ok((head, consumed)) => {
                    buffer.advance(consumed);
                    return Ok(Some(head));
                }
                Err(ParseError::Incomplete) => {}
                Err(e) => return Err(e.into()),
            }
        }

        if buffer.len() > MAX_HEAD_SIZE {
            return Err(ParseError::HeadTooLarge.into());
        }

        buffer.reserve(READ_CHUNK);
        if reader.read_buf(buffer).await? == 0 {
            if buffer.is_empty() {
                return Ok(None);
            }
            anyhow::bail!("connection closed in the middle of a message head");
        }
    }
}
