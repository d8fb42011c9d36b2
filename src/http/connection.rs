use std::net::SocketAddr;
use std::sync::Arc;

use bytes::BytesMut;
use tokio::net::TcpStream;

use crate::http::body::{BodyReader, Framing};
use crate::http::parser::{ParseError, parse_request_head, read_head};
use crate::http::response::Response;
use crate::http::writer::ClientResponse;
use crate::proxy::Interceptor;

/// One accepted client connection.
///
/// Serves a single request and then closes; there is no keep-alive.
pub struct Connection {
    stream: TcpStream,
    peer: SocketAddr,
    buffer: BytesMut,
    interceptor: Arc<Interceptor>,
}

impl Connection {
    pub fn new(stream: TcpStream, peer: SocketAddr, interceptor: Arc<Interceptor>) -> Self {
        Self {
            stream,
            peer,
            buffer: BytesMut::with_capacity(4096),
            interceptor,
        }
    }

    pub async fn run(mut self) -> anyhow::Result<()> {
        let head = match read_head(&mut self.stream, &mut self.buffer, parse_request_head).await {
            Ok(Some(head)) => head,
            // Client closed connection
            Ok(None) => return Ok(()),
            Err(e) => {
                if e.downcast_ref::<ParseError>().is_some() {
                    let mut client = ClientResponse::new(&mut self.stream);
                    let _ = client.send(Response::bad_request()).await;
                    client.end().await;
                }
                return Err(e.context(format!("Bad request from {}", self.peer)));
            }
        };

        let framing = Framing::for_request(&head);
        let (read_half, write_half) = self.stream.into_split();
        let body = BodyReader::new(read_half, self.buffer, framing);
        let mut client = ClientResponse::new(write_half);

        self.interceptor.handle(head, body, &mut client).await;
        client.end().await;

        Ok(())
    }
}
