//! Upstream dispatch
//!
//! Works out which origin a request is meant for, from its Host header, and
//! builds the outbound request that will be sent there.

use crate::http::headers::HeaderMap;
use crate::http::request::{Method, RequestHead};
use crate::http::target::RequestTarget;
use anyhow::{Context, Result};
use std::time::Duration;
use thiserror::Error;
use tokio::net::TcpStream;
use tokio::time::timeout;

/// Port used when the Host header does not name one.
pub const DEFAULT_PORT: u16 = 80;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum DispatchError {
    #[error("request has no Host header")]
    MissingHost,
    #[error("invalid port in Host header: {0}")]
    InvalidPort(String),
}

/// Everything needed to send a request on to its origin.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OutboundRequest {
    pub host: String,
    pub port: u16,
    pub method: Method,
    /// Path plus query string, as sent on the request line
    pub path: String,
    /// Copied from the incoming request
    pub headers: HeaderMap,
}

impl OutboundRequest {
    /// Builds the outbound request from an incoming head.
    pub fn from_request(head: &RequestHead, target: &RequestTarget) -> Result<Self, DispatchError> {
        let host_header = head.header("Host").ok_or(DispatchError::MissingHost)?;
        let (host, port) = split_host(host_header)?;

        Ok(Self {
            host,
            port,
            method: head.method.clone(),
            path: target.path_and_query(),
            headers: head.headers.clone(),
        })
    }

    /// Asks the origin for an uncompressed body by blanking Accept-Encoding.
    pub fn disable_compression(&mut self) {
        self.headers.set("Accept-Encoding", "");
    }

    /// `host:port`, bracketing IPv6 literals.
    pub fn authority(&self) -> String {
        if self.host.contains(':') {
            format!("[{}]:{}", self.host, self.port)
        } else {
            format!("{}:{}", self.host, self.port)
        }
    }

    /// Serializes the request line and headers.
    pub fn head_bytes(&self) -> Vec<u8> {
        let mut buffer = Vec::new();

        buffer.extend_from_slice(
            format!("{} {} HTTP/1.1\r\n", self.method, self.path).as_bytes(),
        );
        self.headers.write_to(&mut buffer);
        buffer.extend_from_slice(b"\r\n");

        buffer
    }

    /// Opens a TCP connection to the origin.
    pub async fn connect(&self, connect_timeout: Duration) -> Result<TcpStream> {
        let stream = timeout(
            connect_timeout,
            TcpStream::connect((self.host.as_str(), self.port)),
        )
        .await
        .context("Connection timeout")?
        .with_context(|| format!("Failed to connect to {}", self.authority()))?;

        tracing::trace!(upstream = %self.authority(), "Connected to upstream");
        Ok(stream)
    }
}

/// Splits a Host header into host and port.
///
/// `example.com` gives port 80, `example.com:9000` gives 9000, and
/// `[::1]:8080` gives host `::1`.
pub fn split_host(value: &str) -> Result<(String, u16), DispatchError> {
    let value = value.trim();
    if value.is_empty() {
        return Err(DispatchError::MissingHost);
    }

    let (host, port) = if let Some(rest) = value.strip_prefix('[') {
        let (host, after) = rest
            .split_once(']')
            .ok_or_else(|| DispatchError::InvalidPort(value.to_string()))?;
        let port = match after.strip_prefix(':') {
            Some(port) => Some(port),
            None if after.is_empty() => None,
            None => return Err(DispatchError::InvalidPort(value.to_string())),
        };
        (host, port)
    } else {
        match value.split_once(':') {
            Some((host, port)) => (host, Some(port)),
            None => (value, None),
        }
    };

    if host.is_empty() {
        return Err(DispatchError::MissingHost);
    }

    let port = match port {
        Some(port) => port
            .parse::<u16>()
            .map_err(|_| DispatchError::InvalidPort(port.to_string()))?,
        None => DEFAULT_PORT,
    };

    Ok((host.to_string(), port))
}
