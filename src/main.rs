//! DeepL X translation server.
//!
//! An HTTP server that translates text by driving the JSON-RPC interface
//! used by the DeepL browser extension, re-exposed through free, pro and
//! official-API-compatible endpoints.

mod client;
mod config;
mod fingerprint;
mod protocol;
mod translator;
mod web;

use anyhow::Result;
use client::DeepLClient;
use config::Config;
use std::sync::Arc;
use tracing::info;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};
use translator::Translator;

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize logging - use RUST_LOG env var, defaulting to info level
    tracing_subscriber::registry()
        .with(fmt::layer())
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("deeplx=info")))
        .init();

    // Load configuration
    let config = Config::load()?;

    if let Some(ref proxy) = config.proxy_url {
        info!("Routing upstream requests through proxy {}", proxy);
    }

    // Create the upstream client and the translation pipeline
    let client = DeepLClient::new(config.proxy_url.as_deref())?;
    let translator = Translator::new(Arc::new(client));

    // Serve the HTTP API until stopped
    web::serve(config, translator).await?;

    Ok(())
}
