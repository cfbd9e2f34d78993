//! HTTP API surface.
//!
//! Exposes the translation pipeline through three POST routes:
//!
//! - `POST /translate` — free-mode endpoint; response upper-cases the
//!   language codes.
//! - `POST /v1/translate` — pro-mode endpoint; requires a `dl_session`
//!   cookie which is forwarded to the backend.
//! - `POST /v2/translate` — official-API-compatible endpoint; accepts JSON
//!   or form bodies and always auto-detects the source language.
//!
//! Every other path answers 404. When a static token is configured, all
//! three routes require it via `Authorization: Bearer`,
//! `Authorization: DeepL-Auth-Key`, or a `token` query parameter.

use crate::config::Config;
use crate::translator::{TranslateError, Translator};
use anyhow::{Context, Result};
use axum::{
    body::Bytes,
    extract::{Query, State},
    http::{header, HeaderMap, StatusCode},
    response::{IntoResponse, Json, Response},
    routing::post,
    Router,
};
use serde::{Deserialize, Serialize};
use std::net::SocketAddr;
use std::sync::Arc;
use tower_http::cors::{Any, CorsLayer};
use tracing::{info, warn};

/// Fixed message for a `tag_handling` value other than "html" or "xml".
const INVALID_TAG_HANDLING: &str =
    "Invalid tag_handling value. Allowed values are 'html' and 'xml'.";

/// Shared state for all route handlers.
struct AppState {
    translator: Translator,
    /// Static access token; `None` disables the auth gate.
    token: Option<String>,
}

/// Query parameters recognized on every translate route.
#[derive(Deserialize, Default)]
struct AuthQuery {
    token: Option<String>,
}

/// Request body for `/translate` and `/v1/translate`.
#[derive(Deserialize)]
struct TranslateBody {
    #[serde(default)]
    text: Option<String>,
    #[serde(default)]
    source_lang: Option<String>,
    #[serde(default)]
    target_lang: Option<String>,
    #[serde(default)]
    tag_handling: Option<String>,
}

/// JSON body for `/v2/translate`, where `text` may be one string or a list.
#[derive(Deserialize)]
struct V2Body {
    #[serde(default)]
    text: Option<V2Text>,
    #[serde(default)]
    target_lang: Option<String>,
}

#[derive(Deserialize)]
#[serde(untagged)]
enum V2Text {
    One(String),
    Many(Vec<String>),
}

impl V2Text {
    /// List inputs are joined with newlines, matching the official API.
    fn join(self) -> String {
        match self {
            V2Text::One(text) => text,
            V2Text::Many(texts) => texts.join("\n"),
        }
    }
}

/// Success body for the free and pro endpoints.
#[derive(Serialize)]
struct TranslateResponse {
    code: u16,
    id: u64,
    data: String,
    alternatives: Vec<String>,
    source_lang: String,
    target_lang: String,
    method: &'static str,
}

/// Success body for the official-API-shaped endpoint.
#[derive(Serialize)]
struct OfficialResponse {
    translations: Vec<OfficialTranslation>,
}

#[derive(Serialize)]
struct OfficialTranslation {
    detected_source_language: String,
    text: String,
}

/// Error body shared by every failure path.
#[derive(Serialize)]
struct ErrorBody {
    code: u16,
    message: String,
}

/// Runs the HTTP server until it fails or the process is stopped.
pub async fn serve(config: Config, translator: Translator) -> Result<()> {
    let state = Arc::new(AppState {
        translator,
        token: config.token.clone(),
    });

    // Allow requests from any origin; this is an open proxy by design.
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    let app = Router::new()
        .route("/translate", post(translate_free))
        .route("/v1/translate", post(translate_pro))
        .route("/v2/translate", post(translate_official))
        .fallback(not_found)
        .layer(cors)
        .with_state(state);

    let addr = SocketAddr::from((config.host, config.port));
    info!("DeepL X has been successfully launched! Listening on {}", addr);
    if config.token.is_some() {
        info!("Access token is set.");
    }

    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .context("Failed to bind to address")?;
    axum::serve(listener, app).await.context("Server error")?;

    Ok(())
}

/// Free-mode endpoint. Language codes in the response are upper-cased.
async fn translate_free(
    State(state): State<Arc<AppState>>,
    Query(auth): Query<AuthQuery>,
    headers: HeaderMap,
    Json(body): Json<TranslateBody>,
) -> Response {
    if !authorized(&state, &headers, auth.token.as_deref()) {
        return error_response(StatusCode::UNAUTHORIZED, "Invalid access token");
    }

    let rich_text_hint = match validate_tag_handling(body.tag_handling.as_deref()) {
        Ok(hint) => hint,
        Err(()) => return error_response(StatusCode::BAD_REQUEST, INVALID_TAG_HANDLING),
    };

    let source_lang = body.source_lang.unwrap_or_default();
    let target_lang = body.target_lang.unwrap_or_else(|| "ZH".to_string());
    let text = body.text.unwrap_or_default();

    match state
        .translator
        .translate(&source_lang, &target_lang, &text, rich_text_hint, None)
        .await
    {
        Ok(result) => Json(TranslateResponse {
            code: 200,
            id: result.id,
            data: result.data,
            alternatives: result.alternatives,
            source_lang: result.source_lang.to_uppercase(),
            target_lang: result.target_lang.to_uppercase(),
            method: result.method,
        })
        .into_response(),
        Err(e) => pipeline_error(e),
    }
}

/// Pro-mode endpoint. Requires a `dl_session` cookie, which is forwarded to
/// the backend; response fields are passed through without normalization.
async fn translate_pro(
    State(state): State<Arc<AppState>>,
    Query(auth): Query<AuthQuery>,
    headers: HeaderMap,
    Json(body): Json<TranslateBody>,
) -> Response {
    if !authorized(&state, &headers, auth.token.as_deref()) {
        return error_response(StatusCode::UNAUTHORIZED, "Invalid access token");
    }

    let rich_text_hint = match validate_tag_handling(body.tag_handling.as_deref()) {
        Ok(hint) => hint,
        Err(()) => return error_response(StatusCode::BAD_REQUEST, INVALID_TAG_HANDLING),
    };

    let Some(session) = session_from_cookies(&headers) else {
        return error_response(StatusCode::UNAUTHORIZED, "No dl_session Found");
    };

    // Pro session tokens never contain a dot; a JWT here means the caller
    // pasted a free-account session.
    if session.contains('.') {
        return error_response(
            StatusCode::UNAUTHORIZED,
            "Your account is not a Pro account. Please upgrade your account or switch to a different account.",
        );
    }

    let source_lang = body.source_lang.unwrap_or_default();
    let target_lang = body.target_lang.unwrap_or_else(|| "ZH".to_string());
    let text = body.text.unwrap_or_default();

    match state
        .translator
        .translate(
            &source_lang,
            &target_lang,
            &text,
            rich_text_hint,
            Some(&session),
        )
        .await
    {
        Ok(result) => Json(TranslateResponse {
            code: 200,
            id: result.id,
            data: result.data,
            alternatives: result.alternatives,
            source_lang: result.source_lang,
            target_lang: result.target_lang,
            method: result.method,
        })
        .into_response(),
        Err(e) => pipeline_error(e),
    }
}

/// Official-API-compatible endpoint. Accepts JSON or form-encoded bodies;
/// the source language is always auto-detected.
async fn translate_official(
    State(state): State<Arc<AppState>>,
    Query(auth): Query<AuthQuery>,
    headers: HeaderMap,
    body: Bytes,
) -> Response {
    if !authorized(&state, &headers, auth.token.as_deref()) {
        return error_response(StatusCode::UNAUTHORIZED, "Invalid access token");
    }

    let Some((text, target_lang)) = parse_v2_body(&headers, &body) else {
        return error_response(StatusCode::BAD_REQUEST, "Invalid request payload");
    };

    match state
        .translator
        .translate("", &target_lang, &text, false, None)
        .await
    {
        Ok(result) => Json(OfficialResponse {
            translations: vec![OfficialTranslation {
                detected_source_language: result.source_lang.to_uppercase(),
                text: result.data,
            }],
        })
        .into_response(),
        Err(e) => pipeline_error(e),
    }
}

/// Fallback for every unknown path.
async fn not_found() -> Response {
    error_response(StatusCode::NOT_FOUND, "Path not found")
}

/// Checks the static token gate. Always passes when no token is configured.
fn authorized(state: &AppState, headers: &HeaderMap, query_token: Option<&str>) -> bool {
    let Some(expected) = &state.token else {
        return true;
    };
    if query_token == Some(expected.as_str()) {
        return true;
    }
    header_token(headers).as_deref() == Some(expected.as_str())
}

/// Extracts the token from `Authorization: Bearer <t>` or
/// `Authorization: DeepL-Auth-Key <t>`.
fn header_token(headers: &HeaderMap) -> Option<String> {
    let value = headers.get(header::AUTHORIZATION)?.to_str().ok()?;
    let mut parts = value.split_whitespace();
    match (parts.next(), parts.next(), parts.next()) {
        (Some("Bearer"), Some(token), None) | (Some("DeepL-Auth-Key"), Some(token), None) => {
            Some(token.to_string())
        }
        _ => None,
    }
}

/// Finds the `dl_session` cookie, if any.
fn session_from_cookies(headers: &HeaderMap) -> Option<String> {
    let cookies = headers.get(header::COOKIE)?.to_str().ok()?;
    cookies
        .split(';')
        .map(str::trim)
        .find_map(|cookie| cookie.strip_prefix("dl_session="))
        .map(|session| session.to_string())
}

/// Validates `tag_handling` and reports whether rich-text splitting was
/// requested. An empty value counts as absent.
fn validate_tag_handling(tag_handling: Option<&str>) -> Result<bool, ()> {
    match tag_handling {
        None | Some("") => Ok(false),
        Some("html") | Some("xml") => Ok(true),
        Some(_) => Err(()),
    }
}

/// Parses the `/v2/translate` body: form-encoded when the content type says
/// so, JSON otherwise. Returns `None` when text or target is missing.
fn parse_v2_body(headers: &HeaderMap, body: &[u8]) -> Option<(String, String)> {
    let is_form = headers
        .get(header::CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .map(|ct| ct.starts_with("application/x-www-form-urlencoded"))
        .unwrap_or(false);

    let (text, target_lang) = if is_form {
        let mut text = None;
        let mut target_lang = None;
        for (key, value) in url::form_urlencoded::parse(body) {
            match key.as_ref() {
                "text" => text = Some(value.into_owned()),
                "target_lang" => target_lang = Some(value.into_owned()),
                _ => {}
            }
        }
        (text, target_lang)
    } else {
        let parsed: V2Body = serde_json::from_slice(body).ok()?;
        (parsed.text.map(V2Text::join), parsed.target_lang)
    };

    match (text, target_lang) {
        (Some(text), Some(target_lang)) if !text.is_empty() && !target_lang.is_empty() => {
            Some((text, target_lang))
        }
        _ => None,
    }
}

/// Converts a pipeline failure into the stable `{code, message}` body.
fn pipeline_error(e: TranslateError) -> Response {
    warn!("Translation request failed: {}", e);
    let status = StatusCode::from_u16(e.code()).unwrap_or(StatusCode::SERVICE_UNAVAILABLE);
    error_response(status, e.to_string())
}

fn error_response(status: StatusCode, message: impl Into<String>) -> Response {
    (
        status,
        Json(ErrorBody {
            code: status.as_u16(),
            message: message.into(),
        }),
    )
        .into_response()
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::HeaderValue;

    fn headers_with(name: header::HeaderName, value: &str) -> HeaderMap {
        let mut headers = HeaderMap::new();
        headers.insert(name, HeaderValue::from_str(value).unwrap());
        headers
    }

    #[test]
    fn test_header_token_forms() {
        let headers = headers_with(header::AUTHORIZATION, "Bearer secret");
        assert_eq!(header_token(&headers).as_deref(), Some("secret"));

        let headers = headers_with(header::AUTHORIZATION, "DeepL-Auth-Key secret");
        assert_eq!(header_token(&headers).as_deref(), Some("secret"));

        let headers = headers_with(header::AUTHORIZATION, "Basic secret");
        assert_eq!(header_token(&headers), None);

        let headers = headers_with(header::AUTHORIZATION, "Bearer");
        assert_eq!(header_token(&headers), None);

        assert_eq!(header_token(&HeaderMap::new()), None);
    }

    #[test]
    fn test_session_from_cookies() {
        let headers = headers_with(header::COOKIE, "dl_session=abc123");
        assert_eq!(session_from_cookies(&headers).as_deref(), Some("abc123"));

        let headers = headers_with(header::COOKIE, "other=1; dl_session=abc123; theme=dark");
        assert_eq!(session_from_cookies(&headers).as_deref(), Some("abc123"));

        let headers = headers_with(header::COOKIE, "other=1");
        assert_eq!(session_from_cookies(&headers), None);

        assert_eq!(session_from_cookies(&HeaderMap::new()), None);
    }

    #[test]
    fn test_validate_tag_handling() {
        assert_eq!(validate_tag_handling(None), Ok(false));
        assert_eq!(validate_tag_handling(Some("")), Ok(false));
        assert_eq!(validate_tag_handling(Some("html")), Ok(true));
        assert_eq!(validate_tag_handling(Some("xml")), Ok(true));
        assert_eq!(validate_tag_handling(Some("pdf")), Err(()));
    }

    #[test]
    fn test_parse_v2_json_body() {
        let headers = headers_with(header::CONTENT_TYPE, "application/json");

        let body = br#"{"text": "hello", "target_lang": "DE"}"#;
        assert_eq!(
            parse_v2_body(&headers, body),
            Some(("hello".to_string(), "DE".to_string()))
        );

        // List inputs are joined with newlines.
        let body = br#"{"text": ["one", "two"], "target_lang": "DE"}"#;
        assert_eq!(
            parse_v2_body(&headers, body),
            Some(("one\ntwo".to_string(), "DE".to_string()))
        );

        let body = br#"{"text": "hello"}"#;
        assert_eq!(parse_v2_body(&headers, body), None);

        let body = br#"{"target_lang": "DE"}"#;
        assert_eq!(parse_v2_body(&headers, body), None);
    }

    #[test]
    fn test_parse_v2_form_body() {
        let headers = headers_with(
            header::CONTENT_TYPE,
            "application/x-www-form-urlencoded",
        );

        let body = b"text=hello%20world&target_lang=DE";
        assert_eq!(
            parse_v2_body(&headers, body),
            Some(("hello world".to_string(), "DE".to_string()))
        );

        let body = b"text=hello";
        assert_eq!(parse_v2_body(&headers, body), None);
    }

    #[test]
    fn test_authorized_gate() {
        let translator = Translator::new(Arc::new(DenyAllTransport));

        let open = AppState {
            translator: translator.clone(),
            token: None,
        };
        assert!(authorized(&open, &HeaderMap::new(), None));

        let gated = AppState {
            translator,
            token: Some("secret".to_string()),
        };
        assert!(!authorized(&gated, &HeaderMap::new(), None));
        assert!(authorized(&gated, &HeaderMap::new(), Some("secret")));
        assert!(!authorized(&gated, &HeaderMap::new(), Some("wrong")));

        let headers = headers_with(header::AUTHORIZATION, "Bearer secret");
        assert!(authorized(&gated, &headers, None));

        let headers = headers_with(header::AUTHORIZATION, "Bearer wrong");
        assert!(!authorized(&gated, &headers, None));
    }

    /// Transport stub for constructing a `Translator` in state tests; the
    /// auth gate never reaches the network.
    struct DenyAllTransport;

    #[async_trait::async_trait]
    impl crate::client::Transport for DenyAllTransport {
        async fn call(
            &self,
            _: &str,
            _: String,
            _: Option<&str>,
        ) -> anyhow::Result<serde_json::Value> {
            anyhow::bail!("not used in tests")
        }
    }
}
