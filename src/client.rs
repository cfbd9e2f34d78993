//! Upstream DeepL transport and the emulated client profile.
//!
//! The upstream JSON-RPC endpoint only accepts requests that look like they
//! came from the official browser extension, so the URL query, header set and
//! extension version live here as one versioned block. Updating to a newer
//! extension release should only ever touch these constants.

use anyhow::{Context, Result};
use async_trait::async_trait;
use reqwest::header::{HeaderMap, HeaderName, HeaderValue};
use serde_json::Value;
use tracing::{debug, warn};

/// Fixed JSON-RPC endpoint of the translation backend.
const JSONRPC_URL: &str = "https://www2.deepl.com/jsonrpc";

/// Client identifier sent in the URL query, matching the emulated
/// extension version.
const CLIENT_QUERY: &str = "chrome-extension,1.28.0";

/// Header set of the emulated extension, verbatim. Values are a versioned
/// constant, not computed.
const PROFILE_HEADERS: &[(&str, &str)] = &[
    ("accept", "*/*"),
    (
        "accept-language",
        "en-US,en;q=0.9,zh-CN;q=0.8,zh-TW;q=0.7,zh-HK;q=0.6,zh;q=0.5",
    ),
    ("authorization", "None"),
    ("cache-control", "no-cache"),
    ("content-type", "application/json"),
    ("dnt", "1"),
    (
        "origin",
        "chrome-extension://cofdbpoegempjloogbagkncekinflcnj",
    ),
    ("pragma", "no-cache"),
    ("priority", "u=1, i"),
    ("referer", "https://www.deepl.com/"),
    ("sec-fetch-dest", "empty"),
    ("sec-fetch-mode", "cors"),
    ("sec-fetch-site", "none"),
    ("sec-gpc", "1"),
    (
        "user-agent",
        "DeepLBrowserExtension/1.28.0 Mozilla/5.0 (Macintosh; Intel Mac OS X 10_15_7) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/127.0.0.0 Safari/537.36",
    ),
];

/// Performs one HTTP POST against the upstream backend.
///
/// The orchestrator only ever constructs request bodies and parses response
/// bodies; everything network-shaped sits behind this trait so pipeline
/// tests can substitute a recording fake.
#[async_trait]
pub trait Transport: Send + Sync {
    /// Posts `body` to the backend with `method` in the URL query, returning
    /// the parsed JSON response. A session token, when present, is attached
    /// as a `dl_session` cookie.
    async fn call(&self, method: &str, body: String, session: Option<&str>) -> Result<Value>;
}

/// Reqwest-backed transport for the real backend.
pub struct DeepLClient {
    client: reqwest::Client,
}

impl DeepLClient {
    /// Creates the shared HTTP client, optionally routed through a proxy.
    pub fn new(proxy_url: Option<&str>) -> Result<Self> {
        let mut builder = reqwest::Client::builder().timeout(std::time::Duration::from_secs(10));

        if let Some(proxy_url) = proxy_url {
            let proxy = reqwest::Proxy::all(proxy_url)
                .with_context(|| format!("Invalid proxy URL: {}", proxy_url))?;
            builder = builder.proxy(proxy);
        }

        Ok(Self {
            client: builder.build().context("Failed to create HTTP client")?,
        })
    }
}

#[async_trait]
impl Transport for DeepLClient {
    async fn call(&self, method: &str, body: String, session: Option<&str>) -> Result<Value> {
        let url = request_url(method);
        debug!("POST {} ({} bytes)", url, body.len());

        let mut request = self
            .client
            .post(&url)
            .headers(profile_headers())
            .body(body);

        if let Some(session) = session {
            request = request.header("cookie", format!("dl_session={}", session));
        }

        let response = request
            .send()
            .await
            .context("Failed to send request to DeepL")?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            warn!("DeepL API error: {} - {}", status, body);
            anyhow::bail!("DeepL API returned status: {}", status);
        }

        response
            .json::<Value>()
            .await
            .context("Failed to parse DeepL response")
    }
}

/// Builds the full endpoint URL with the client id and method query.
fn request_url(method: &str) -> String {
    format!("{}?client={}&method={}", JSONRPC_URL, CLIENT_QUERY, method)
}

/// Materializes the profile header set.
fn profile_headers() -> HeaderMap {
    let mut headers = HeaderMap::with_capacity(PROFILE_HEADERS.len());
    for (name, value) in PROFILE_HEADERS {
        headers.insert(
            HeaderName::from_static(name),
            HeaderValue::from_static(value),
        );
    }
    headers
}
