use std::sync::Arc;

use clap::Parser;
use interposer::config::Config;
use interposer::prettify::JsBeautifier;
use interposer::proxy::Interceptor;
use interposer::{logging, server};

/// Proxies every request to its origin and beautifies JavaScript responses.
#[derive(Parser)]
#[command(name = "prettify-proxy", version)]
struct Cli {}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    Cli::parse();
    logging::init();

    let cfg = Config::load();
    let interceptor = Arc::new(Interceptor::prettify(
        Arc::new(JsBeautifier::default()),
        cfg.timeouts(),
    ));

    tracing::info!("Launched prettify proxy on {}", cfg.listen_addr);
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
