use std::sync::Arc;

use anyhow::Context;
use tokio::net::TcpListener;

use eml2pdf_gateway::config::GatewayConfig;
use eml2pdf_gateway::convert::{Converter, Eml2PdfConverter};
use eml2pdf_gateway::http::gateway_routes;
use eml2pdf_gateway::server::{self, shutdown_signal};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize tracing
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .with_target(false)
        .init();

    let config = GatewayConfig::from_env();
    tracing::info!(
        converter = %config.converter_bin.display(),
        timeout_secs = config.convert_timeout.as_secs(),
        max_body_bytes = config.max_body_bytes,
        "Starting eml2pdf gateway"
    );

    let converter: Arc<dyn Converter> = Arc::new(Eml2PdfConverter::from_config(&config));
    let app = gateway_routes(converter, config.max_body_bytes);

    let addr = config.listen_addr();
    let listener = TcpListener::bind(addr)
        .await
        .with_context(|| format!("Failed to bind {addr}"))?;

    server::run(listener, app, shutdown_signal())
        .await
        .context("Server error")?;

    Ok(())
}
