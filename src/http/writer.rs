use std::io;

use tokio::io::{AsyncWrite, AsyncWriteExt};

use crate::http::response::{Response, ResponseHead};

const HTTP_VERSION: &str = "HTTP/1.1";

/// Serializes a status line and headers, ending with the blank line.
pub fn serialize_head(head: &ResponseHead) -> Vec<u8> {
    let mut buf = Vec::new();

    let status_line = format!("{} {} {}\r\n", HTTP_VERSION, head.status, head.reason);
    buf.extend_from_slice(status_line.as_bytes());

    head.headers.write_to(&mut buf);

    // Header/body separator
    buf.extend_from_slice(b"\r\n");

    buf
}

/// The response side of a client connection.
///
/// Tracks whether a head has been written so that at most one response goes
/// out per connection, and makes ending the response idempotent.
pub struct ClientResponse<W> {
    writer: W,
    head_written: bool,
    ended: bool,
}

impl<W: AsyncWrite + Unpin> ClientResponse<W> {
    pub fn new(writer: W) -> Self {
        Self {
            writer,
            head_written: false,
            ended: false,
        }
    }

    pub fn head_written(&self) -> bool {
        self.head_written
    }

    /// Writes the status line and headers.
    ///
    /// Interim (1xx) heads may precede the final one; anything after a final
    /// head is refused.
    pub async fn write_head(&mut self, head: &ResponseHead) -> io::Result<()> {
        if self.head_written || self.ended {
            return Err(io::Error::other("response head already sent"));
        }

        self.writer.write_all(&serialize_head(head)).await?;
        if !head.is_interim() {
            self.head_written = true;
        }
        Ok(())
    }

    /// Writes body bytes and flushes them so they reach the client promptly.
    pub async fn write_body(&mut self, chunk: &[u8]) -> io::Result<()> {
        if !self.head_written || self.ended {
            return Err(io::Error::other("no open response to write a body to"));
        }

        self.writer.write_all(chunk).await?;
        self.writer.flush().await
    }

    /// Sends a complete locally generated response.
    pub async fn send(&mut self, response: Response) -> io::Result<()> {
        let (head, body) = response.into_parts();
        self.write_head(&head).await?;
        self.write_body(&body).await
    }

    /// Ends the response and closes the write side of the connection.
    ///
    /// Safe to call more than once; errors from a client that already went
    /// away are ignored.
    pub async fn end(&mut self) {
        if self.ended {
            return;
        }
        self.ended = true;

        if let Err(e) = self.writer.flush().await {
            tracing::debug!(error = %e, "Flush failed while ending response");
        }
        if let Err(e) = self.writer.shutdown().await {
            tracing::debug!(error = %e, "Shutdown failed while ending response");
        }
    }
}
