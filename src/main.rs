use std::path::PathBuf;
use std::sync::Arc;

use clap::Parser;
use interposer::config::Config;
use interposer::proxy::Interceptor;
use interposer::schema::{DeclarativeGenerator, LocalResponder, SchemaHandle};
use interposer::{logging, server};

/// Answers requests from a schema, proxies everything else to its origin.
#[derive(Parser)]
#[command(name = "schema-proxy", version)]
struct Cli {
    /// Path to the schema document
    schema: PathBuf,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    logging::init();

    let cfg = Config::load();
    let schema = Arc::new(SchemaHandle::open(&cli.schema)?);
    tracing::info!(
        schema = %schema.path().display(),
        endpoints = schema.document().endpoints.len(),
        "Schema loaded"
    );

    let responder = LocalResponder::new(Arc::new(DeclarativeGenerator), schema);
    let interceptor = Arc::new(Interceptor::schema(responder, cfg.timeouts()));

    tracing::info!("Launched schema proxy on {}", cfg.listen_addr);
    tokio::select! {
        res = server::listener::run(&cfg.listen_addr, interceptor) => {
            res?;
        }

        _ = tokio::signal::ctrl_c() => {
            tracing::info!("Shutdown signal received");
        }
    }

    Ok(())
}
