//! Relaying an exchange between a client and its origin.
//!
//! Both relay variants walk the same state machine:
//!
//! ```text
//!   ReceivingRequestBody ──► AwaitingUpstreamHeaders ──► RelayingBody ──► Done
//!            │                        │                       │
//!            └────────────────────────┴───────────────────────┴──► Failed
//! ```
//!
//! The streaming relay leaves `ReceivingRequestBody` as soon as the upstream
//! connection is open and keeps forwarding the request body while it waits for
//! response headers. The transform relay reads the whole request body first.

use std::fmt;
use std::io;
use std::time::Duration;

use anyhow::Context;
use bytes::BytesMut;
use thiserror::Error;
use tokio::io::{AsyncRead, AsyncWrite, AsyncWriteExt};
use tokio::net::tcp::{OwnedReadHalf, OwnedWriteHalf};

use crate::http::body::{BodyReader, Framing};
use crate::http::parser::{parse_response_head, read_head};
use crate::http::response::ResponseHead;
use crate::http::writer::ClientResponse;
use crate::prettify::{self, Beautifier};
use crate::proxy::upstream::OutboundRequest;

const BUFFER_SIZE: usize = 8192;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RelayState {
    ReceivingRequestBody,
    AwaitingUpstreamHeaders,
    RelayingBody,
    Done,
    Failed,
}

impl fmt::Display for RelayState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            RelayState::ReceivingRequestBody => "receiving request body",
            RelayState::AwaitingUpstreamHeaders => "awaiting upstream headers",
            RelayState::RelayingBody => "relaying body",
            RelayState::Done => "done",
            RelayState::Failed => "failed",
        };
        f.write_str(name)
    }
}

#[derive(Debug, Error)]
#[error("relay failed while {state}: {cause:#}")]
pub struct RelayError {
    pub state: RelayState,
    pub cause: anyhow::Error,
}

/// Why the request-body pump stopped early.
enum PumpFailure {
    Client(io::Error),
    Upstream(io::Error),
}

/// One relayed exchange.
pub struct Relay<'a> {
    outbound: &'a OutboundRequest,
    connect_timeout: Duration,
    state: RelayState,
    status: Option<u16>,
}

impl<'a> Relay<'a> {
    pub fn new(outbound: &'a OutboundRequest, connect_timeout: Duration) -> Self {
        Self {
            outbound,
            connect_timeout,
            state: RelayState::ReceivingRequestBody,
            status: None,
        }
    }

    pub fn state(&self) -> RelayState {
        self.state
    }

    /// Status of the final upstream response, once its head has arrived.
    pub fn status(&self) -> Option<u16> {
        self.status
    }

    fn advance(&mut self, next: RelayState) {
        tracing::trace!(from = %self.state, to = %next, "Relay state change");
        self.state = next;
    }

    fn finish(&mut self, result: anyhow::Result<()>) -> Result<(), RelayError> {
        match result {
            Ok(()) => {
                self.advance(RelayState::Done);
                Ok(())
            }
            Err(cause) => {
                let state = self.state;
                self.advance(RelayState::Failed);
                Err(RelayError { state, cause })
            }
        }
    }

    /// Streams the request to the origin and the response back, chunk by chunk.
    ///
    /// Status, headers and body bytes reach the client exactly as the origin
    /// sent them.
    pub async fn stream<R, W>(
        &mut self,
        body: BodyReader<R>,
        client: &mut ClientResponse<W>,
    ) -> Result<(), RelayError>
    where
        R: AsyncRead + Unpin,
        W: AsyncWrite + Unpin,
    {
        let result = self.run_stream(body, client).await;
        self.finish(result)
    }

    /// Buffers the whole response, beautifying it when a beautifier is given.
    ///
    /// The caller is expected to have disabled compression on the outbound
    /// request. `Content-Length` is recomputed for the body actually sent.
    pub async fn transform<R, W>(
        &mut self,
        body: BodyReader<R>,
        client: &mut ClientResponse<W>,
        beautifier: Option<&dyn Beautifier>,
    ) -> Result<(), RelayError>
    where
        R: AsyncRead + Unpin,
        W: AsyncWrite + Unpin,
    {
        let result = self.run_transform(body, client, beautifier).await;
        self.finish(result)
    }

    async fn run_stream<R, W>(
        &mut self,
        mut body: BodyReader<R>,
        client: &mut ClientResponse<W>,
    ) -> anyhow::Result<()>
    where
        R: AsyncRead + Unpin,
        W: AsyncWrite + Unpin,
    {
        let upstream = self.outbound.connect(self.connect_timeout).await?;
        let (mut up_read, mut up_write) = upstream.into_split();

        up_write
            .write_all(&self.outbound.head_bytes())
            .await
            .context("Failed to send request head")?;
        self.advance(RelayState::AwaitingUpstreamHeaders);

        let mut pumping = !body.is_done();
        let pump = pump_request(&mut body, &mut up_write);
        tokio::pin!(pump);
        let response = self.relay_response(&mut up_read, client);
        tokio::pin!(response);

        loop {
            tokio::select! {
                result = &mut pump, if pumping => {
                    pumping = false;
                    match result {
                        Ok(()) => {}
                        Err(PumpFailure::Client(e)) => {
                            return Err(e).context("Client request body failed");
                        }
                        Err(PumpFailure::Upstream(e)) => {
                            // The origin may have answered early; let the
                            // response side decide.
                            tracing::debug!(error = %e, "Upstream stopped accepting the request body");
                        }
                    }
                }
                result = &mut response => return result,
            }
        }
    }

    async fn relay_response<W>(
        &mut self,
        upstream: &mut OwnedReadHalf,
        client: &mut ClientResponse<W>,
    ) -> anyhow::Result<()>
    where
        W: AsyncWrite + Unpin,
    {
        let mut buffer = BytesMut::with_capacity(BUFFER_SIZE);

        let head = loop {
            let head = read_upstream_head(upstream, &mut buffer).await?;
            if !head.is_interim() {
                break head;
            }
            client
                .write_head(&head)
                .await
                .context("Client went away")?;
        };

        tracing::debug!(
            status = head.status,
            headers = head.headers.iter().count(),
            "Upstream response headers received"
        );
        self.status = Some(head.status);
        client
            .write_head(&head)
            .await
            .context("Client went away")?;
        self.advance(RelayState::RelayingBody);

        let framing = Framing::for_response(&head, &self.outbound.method);
        let mut response_body = BodyReader::new(upstream, buffer, framing);
        while let Some(chunk) = response_body
            .next_chunk()
            .await
            .context("Upstream response body failed")?
        {
            client
                .write_body(&chunk.raw)
                .await
                .context("Client went away")?;
        }

        Ok(())
    }

    async fn run_transform<R, W>(
        &mut self,
        mut body: BodyReader<R>,
        client: &mut ClientResponse<W>,
        beautifier: Option<&dyn Beautifier>,
    ) -> anyhow::Result<()>
    where
        R: AsyncRead + Unpin,
        W: AsyncWrite + Unpin,
    {
        let request_body = body
            .collect_raw()
            .await
            .context("Client request body failed")?;

        let upstream = self.outbound.connect(self.connect_timeout).await?;
        let (mut up_read, mut up_write) = upstream.into_split();

        let mut request = self.outbound.head_bytes();
        request.extend_from_slice(&request_body);
        up_write
            .write_all(&request)
            .await
            .context("Failed to send request")?;
        up_write.flush().await.context("Failed to send request")?;
        self.advance(RelayState::AwaitingUpstreamHeaders);

        let mut buffer = BytesMut::with_capacity(BUFFER_SIZE);
        let mut head = loop {
            let head = read_upstream_head(&mut up_read, &mut buffer).await?;
            if !head.is_interim() {
                break head;
            }
        };
        self.status = Some(head.status);
        self.advance(RelayState::RelayingBody);

        let framing = Framing::for_response(&head, &self.outbound.method);
        let payload = BodyReader::new(&mut up_read, buffer, framing)
            .collect()
            .await
            .context("Upstream response body failed")?;

        let payload = match beautifier {
            Some(beautifier) => prettify::apply(beautifier, payload),
            None => payload,
        };

        if framing != Framing::Empty {
            head.set_body_length(payload.len());
        }

        client
            .write_head(&head)
            .await
            .context("Client went away")?;
        if !payload.is_empty() {
            client
                .write_body(&payload)
                .await
                .context("Client went away")?;
        }

        Ok(())
    }
}

async fn read_upstream_head(
    upstream: &mut OwnedReadHalf,
    buffer: &mut BytesMut,
) -> anyhow::Result<ResponseHead> {
    read_head(upstream, buffer, parse_response_head)
        .await
        .context("Invalid upstream response")?
        .context("Upstream closed the connection without responding")
}

async fn pump_request<R>(
    body: &mut BodyReader<R>,
    upstream: &mut OwnedWriteHalf,
) -> Result<(), PumpFailure>
where
    R: AsyncRead + Unpin,
{
    while let Some(chunk) = body.next_chunk().await.map_err(PumpFailure::Client)? {
        upstream
            .write_all(&chunk.raw)
            .await
            .map_err(PumpFailure::Upstream)?;
    }
    upstream.flush().await.map_err(PumpFailure::Upstream)
}
