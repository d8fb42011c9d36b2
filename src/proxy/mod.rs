//! Intercepting proxy logic
//!
//! This module decides, per request, whether to answer locally from the schema
//! or to relay to the origin named by the Host header, and runs the relay.

pub mod relay;
pub mod upstream;

pub use relay::{Relay, RelayError, RelayState};
pub use upstream::{DispatchError, OutboundRequest};

use std::sync::Arc;
use std::time::Duration;

use tokio::io::{AsyncRead, AsyncWrite};
use tokio::time::timeout;
use tracing::{debug, error, info, warn};

use crate::http::body::BodyReader;
use crate::http::request::RequestHead;
use crate::http::response::Response;
use crate::http::target::RequestTarget;
use crate::http::writer::ClientResponse;
use crate::prettify::Beautifier;
use crate::schema::LocalResponder;

/// Connection and request deadlines for relayed requests.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Timeouts {
    /// How long to wait for the origin to accept a connection
    pub connect: Duration,
    /// Upper bound on a whole relayed exchange
    pub request: Duration,
}

/// What the proxy does with requests it cannot answer locally.
pub enum Mode {
    /// Try the schema first, then stream to the origin.
    Schema(LocalResponder),
    /// Buffer responses from the origin and beautify script bodies.
    Prettify(Arc<dyn Beautifier>),
}

/// Per-request routing shared by every connection.
pub struct Interceptor {
    mode: Mode,
    timeouts: Timeouts,
}

impl Interceptor {
    pub fn new(mode: Mode, timeouts: Timeouts) -> Self {
        Self { mode, timeouts }
    }

    pub fn schema(responder: LocalResponder, timeouts: Timeouts) -> Self {
        Self::new(Mode::Schema(responder), timeouts)
    }

    pub fn prettify(beautifier: Arc<dyn Beautifier>, timeouts: Timeouts) -> Self {
        Self::new(Mode::Prettify(beautifier), timeouts)
    }

    /// Handles one request.
    ///
    /// Writes at most one response to `client`. Ending the response is left
    /// to the caller so that it happens on every path.
    pub async fn handle<R, W>(
        &self,
        head: RequestHead,
        mut body: BodyReader<R>,
        client: &mut ClientResponse<W>,
    ) where
        R: AsyncRead + Unpin,
        W: AsyncWrite + Unpin,
    {
        let target = RequestTarget::parse(&head.target);
        info!(method = %head.method, url = %head.target, "Request received");

        if let Mode::Schema(responder) = &self.mode {
            if let Some(document) = responder
                .respond(target.segments(), target.query_pairs())
                .await
            {
                info!(url = %head.target, "Answering from schema");
                self.discard_request_body(&head, &mut body).await;
                if let Err(e) = client.send(Response::json(document)).await {
                    debug!(url = %head.target, error = %e, "Client went away before the response was sent");
                }
                return;
            }
            info!(url = %head.target, "Proxying to origin");
        }

        let mut outbound = match OutboundRequest::from_request(&head, &target) {
            Ok(outbound) => outbound,
            Err(e) => {
                warn!(url = %head.target, error = %e, "Cannot work out the origin");
                let _ = client.send(Response::bad_request()).await;
                return;
            }
        };

        if matches!(self.mode, Mode::Prettify(_)) {
            outbound.disable_compression();
        }

        let mut relay = Relay::new(&outbound, self.timeouts.connect);
        let outcome = match &self.mode {
            Mode::Schema(_) => timeout(self.timeouts.request, relay.stream(body, client)).await,
            Mode::Prettify(beautifier) => {
                let beautifier = target.is_script().then_some(beautifier.as_ref());
                timeout(
                    self.timeouts.request,
                    relay.transform(body, client, beautifier),
                )
                .await
            }
        };

        match outcome {
            Ok(Ok(())) => info!(url = %head.target, status = ?relay.status(), "Request completed"),
            Ok(Err(e)) => error!(url = %head.target, error = %e, "Error encountered handling URL"),
            Err(_) => error!(
                url = %head.target,
                timeout = ?self.timeouts.request,
                "Error encountered handling URL: request deadline exceeded"
            ),
        }
    }

    async fn discard_request_body<R>(&self, head: &RequestHead, body: &mut BodyReader<R>)
    where
        R: AsyncRead + Unpin,
    {
        if !head.has_body() {
            return;
        }

        warn!(url = %head.target, "Unhandled post data detected in request");
        if let Err(e) = body.discard().await {
            debug!(url = %head.target, error = %e, "Failed to read ignored request body");
        }
    }
}
