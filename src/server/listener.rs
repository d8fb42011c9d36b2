use std::sync::Arc;

use tokio::net::TcpListener;
use tracing::{Instrument, error, info, info_span};

use crate::http::connection::Connection;
use crate::proxy::Interceptor;

pub async fn run(listen_addr: &str, interceptor: Arc<Interceptor>) -> anyhow::Result<()> {
    let listener = TcpListener::bind(listen_addr).await?;
    info!("Listening on {}", listen_addr);

    serve(listener, interceptor).await
}

/// Accepts connections forever, one task per connection.
pub async fn serve(listener: TcpListener, interceptor: Arc<Interceptor>) -> anyhow::Result<()> {
    loop {
        let (socket, peer) = match listener.accept().await {
            Ok(accepted) => accepted,
            Err(e) => {
                error!("Accept failed: {}", e);
                continue;
            }
        };
        tracing::debug!("Accepted connection from {}", peer);

        let conn = Connection::new(socket, peer, Arc::clone(&interceptor));
        tokio::spawn(
            async move {
                if let Err(e) = conn.run().await {
                    tracing::warn!("Connection error from {}: {:#}", peer, e);
                }
            }
            .instrument(info_span!("connection", %peer)),
        );
    }
}
