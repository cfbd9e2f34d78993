//! Configuration module for the translation server.
//!
//! Handles loading configuration from environment variables and .env files.

use anyhow::{Context, Result};
use std::net::IpAddr;

/// Application configuration loaded from environment variables.
#[derive(Debug, Clone)]
pub struct Config {
    /// Address the HTTP server binds to.
    pub host: IpAddr,

    /// Port the HTTP server listens on.
    pub port: u16,

    /// Optional static access token. When set, every translate route
    /// requires it via `Authorization` header or `?token=` query.
    pub token: Option<String>,

    /// Optional HTTP proxy URL for outbound calls to the backend.
    pub proxy_url: Option<String>,
}

impl Config {
    /// Loads configuration from environment variables.
    ///
    /// Optional environment variables:
    /// - `HOST`: Bind address (default: 0.0.0.0)
    /// - `PORT`: Listen port (default: 1188)
    /// - `TOKEN`: Static access token (default: unset, no authentication)
    /// - `PROXY_URL`: HTTP proxy for upstream requests (default: unset)
    pub fn load() -> Result<Self> {
        // Load .env file if present (ignore errors if not found)
        let _ = dotenvy::dotenv();

        let host: IpAddr = std::env::var("HOST")
            .unwrap_or_else(|_| "0.0.0.0".to_string())
            .parse()
            .context("HOST must be a valid IP address")?;

        let port: u16 = std::env::var("PORT")
            .unwrap_or_else(|_| "1188".to_string())
            .parse()
            .context("PORT must be a valid number")?;

        let token = std::env::var("TOKEN").ok().filter(|t| !t.is_empty());

        let proxy_url = std::env::var("PROXY_URL").ok().filter(|p| !p.is_empty());

        Ok(Config {
            host,
            port,
            token,
            proxy_url,
        })
    }
}
