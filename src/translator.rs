//! Translation pipeline driving the DeepL JSON-RPC backend.
//!
//! One translation is a strictly sequential two-call pipeline: the text is
//! first sent to `LMT_split_text` to be segmented into language-tagged
//! chunks, then one job per chunk (with one sentence of neighbouring context
//! on each side) is dispatched to `LMT_handle_jobs`. The multi-beam response
//! is reassembled into a primary translation plus alternatives.
//!
//! The pipeline is stateless and reentrant: every request id, timestamp and
//! job list is created fresh per call, so concurrent translations never
//! share mutable state.

use crate::client::Transport;
use crate::fingerprint;
use crate::protocol::{
    Chunk, CommonJobParams, Job, JobSentence, JobTranslation, JobsLang, JobsParams, JobsResponse,
    JsonRpcRequest, SplitLang, SplitParams, SplitResponse, METHOD_HANDLE_JOBS, METHOD_SPLIT,
};
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::sync::Arc;
use thiserror::Error;
use tracing::debug;

/// Failure taxonomy of the pipeline. Every error carries the numeric code
/// returned to HTTP callers; no other error type crosses this boundary.
#[derive(Debug, Error)]
pub enum TranslateError {
    /// The caller submitted no text.
    #[error("No text to translate")]
    EmptyText,

    /// The backend was unreachable, answered non-2xx, or returned a body
    /// that doesn't match the expected shape.
    #[error("{0}")]
    Upstream(String),

    /// The backend answered, but no usable translation could be assembled.
    #[error("Translation failed")]
    TranslationFailed,
}

impl TranslateError {
    /// The numeric code reported in the response body and used as the HTTP
    /// status.
    pub fn code(&self) -> u16 {
        match self {
            TranslateError::EmptyText => 404,
            TranslateError::Upstream(_) | TranslateError::TranslationFailed => 503,
        }
    }
}

/// A completed translation, the stable contract returned to every HTTP
/// surface.
#[derive(Debug, Clone)]
pub struct Translation {
    /// Correlation id: the request id of the `LMT_handle_jobs` call.
    pub id: u64,
    /// The primary translation (beam 0 of every job, space-joined).
    pub data: String,
    /// Alternative translations, one per beam index observed in the
    /// response.
    pub alternatives: Vec<String>,
    /// Source language actually used: the caller's explicit code, or the
    /// detected code (lower-cased) when detection was requested.
    pub source_lang: String,
    /// Target language exactly as requested, including any regional variant.
    pub target_lang: String,
    /// `"Pro"` when a session token was supplied, `"Free"` otherwise.
    pub method: &'static str,
}

/// Translation service driving the upstream backend through a [`Transport`].
#[derive(Clone)]
pub struct Translator {
    transport: Arc<dyn Transport>,
}

impl Translator {
    pub fn new(transport: Arc<dyn Transport>) -> Self {
        Self { transport }
    }

    /// Translates `text` from `source_lang` to `target_lang`.
    ///
    /// An empty or `"auto"` source language is replaced by the language the
    /// splitter detects. `rich_text_hint` forces rich-text splitting (set
    /// when the caller asked for HTML/XML tag handling); text containing
    /// both `<` and `>` is treated as rich text regardless. A session token,
    /// when present, rides along as a cookie on both upstream calls and
    /// flips the reported method to `"Pro"`.
    pub async fn translate(
        &self,
        source_lang: &str,
        target_lang: &str,
        text: &str,
        rich_text_hint: bool,
        session: Option<&str>,
    ) -> Result<Translation, TranslateError> {
        if text.is_empty() {
            return Err(TranslateError::EmptyText);
        }

        let split = self.split_text(text, rich_text_hint, session).await?;

        let source_lang = if source_lang.is_empty() || source_lang.eq_ignore_ascii_case("auto") {
            split.result.lang.detected.to_lowercase()
        } else {
            source_lang.to_string()
        };

        let chunks = split
            .result
            .texts
            .first()
            .map(|t| t.chunks.as_slice())
            .ok_or_else(|| TranslateError::Upstream("Split response contained no texts".into()))?;
        debug!(
            "Split into {} chunks, detected language {}",
            chunks.len(),
            split.result.lang.detected
        );

        let jobs = build_jobs(chunks)?;

        // A target like "EN-US" is sent as base code "EN" with the original
        // string riding along as the regional variant.
        let (target_code, regional_variant) = split_regional_variant(target_lang);

        let id = fingerprint::next_id();
        let params = JobsParams {
            common_job_params: CommonJobParams::translate(regional_variant),
            lang: JobsLang {
                source_lang_computed: source_lang.to_uppercase(),
                target_lang: target_code.to_uppercase(),
            },
            jobs,
            priority: 1,
            // The timestamp heuristic runs on the original input text, not
            // the per-job sentences.
            timestamp: fingerprint::next_timestamp(text),
        };

        let response: JobsResponse = self
            .dispatch(METHOD_HANDLE_JOBS, id, params, session)
            .await?;

        let translations = response
            .result
            .map(|r| r.translations)
            .unwrap_or_default();
        let (data, alternatives) = assemble(&translations)?;

        Ok(Translation {
            id,
            data,
            alternatives,
            source_lang,
            target_lang: target_lang.to_string(),
            method: if session.is_some() { "Pro" } else { "Free" },
        })
    }

    /// Runs the `LMT_split_text` call.
    async fn split_text(
        &self,
        text: &str,
        rich_text_hint: bool,
        session: Option<&str>,
    ) -> Result<SplitResponse, TranslateError> {
        let params = SplitParams {
            common_job_params: CommonJobParams::translate(None),
            lang: SplitLang {
                lang_user_selected: "AUTO",
            },
            texts: vec![text.to_string()],
            text_type: if rich_text_hint || is_rich_text(text) {
                "richtext"
            } else {
                "plaintext"
            },
        };

        self.dispatch(METHOD_SPLIT, fingerprint::next_id(), params, session)
            .await
    }

    /// Formats one envelope, sends it, and deserializes the reply. Transport
    /// and shape failures both surface as [`TranslateError::Upstream`].
    async fn dispatch<P, R>(
        &self,
        method: &'static str,
        id: u64,
        params: P,
        session: Option<&str>,
    ) -> Result<R, TranslateError>
    where
        P: Serialize + Send + Sync,
        R: DeserializeOwned,
    {
        let request = JsonRpcRequest::new(method, id, params);
        let body = request
            .to_post_string()
            .map_err(|e| TranslateError::Upstream(e.to_string()))?;

        let value = self
            .transport
            .call(method, body, session)
            .await
            .map_err(|e| TranslateError::Upstream(e.to_string()))?;

        serde_json::from_value(value)
            .map_err(|e| TranslateError::Upstream(format!("Unexpected {} response: {}", method, e)))
    }
}

/// Converts the chunk sequence into one job per chunk.
///
/// Each job carries only the *first* sentence of its chunk, and the context
/// arrays hold only the first sentence of the neighbouring chunk. Both
/// truncations match the emulated client and are preserved as compatibility
/// behavior.
fn build_jobs(chunks: &[Chunk]) -> Result<Vec<Job>, TranslateError> {
    let mut jobs = Vec::with_capacity(chunks.len());

    for (idx, chunk) in chunks.iter().enumerate() {
        let sentence = chunk.sentences.first().ok_or_else(|| {
            TranslateError::Upstream("Split response contained an empty chunk".into())
        })?;

        let context_before = if idx > 0 {
            neighbour_context(&chunks[idx - 1])
        } else {
            Vec::new()
        };
        let context_after = if idx + 1 < chunks.len() {
            neighbour_context(&chunks[idx + 1])
        } else {
            Vec::new()
        };

        jobs.push(Job {
            kind: "default",
            preferred_num_beams: 4,
            raw_en_context_before: context_before,
            raw_en_context_after: context_after,
            sentences: vec![JobSentence {
                prefix: sentence.prefix.clone(),
                text: sentence.text.clone(),
                id: idx as u64 + 1,
            }],
        });
    }

    Ok(jobs)
}

/// Zero-or-one context entries from a neighbouring chunk's first sentence.
fn neighbour_context(chunk: &Chunk) -> Vec<String> {
    chunk
        .sentences
        .first()
        .map(|s| s.text.clone())
        .into_iter()
        .collect()
}

/// Merges the multi-beam response into `(primary, alternatives)`.
///
/// Alternative `i` concatenates, per job in order, beam `i`'s first sentence
/// when the job has that beam; shorter-beamed jobs contribute nothing at
/// that index. The primary is the space-joined, trimmed beam-0 text of every
/// job. An empty primary is a failure, never a partial result.
fn assemble(translations: &[JobTranslation]) -> Result<(String, Vec<String>), TranslateError> {
    if translations.is_empty() {
        return Err(TranslateError::TranslationFailed);
    }

    let num_beams = translations[0].beams.len();
    let mut alternatives = Vec::with_capacity(num_beams);
    for i in 0..num_beams {
        let mut alternative = String::new();
        for translation in translations {
            if let Some(beam) = translation.beams.get(i) {
                if let Some(sentence) = beam.sentences.first() {
                    alternative.push_str(&sentence.text);
                }
            }
        }
        if !alternative.is_empty() {
            alternatives.push(alternative);
        }
    }

    let primary = translations
        .iter()
        .map(|translation| {
            translation
                .beams
                .first()
                .and_then(|beam| beam.sentences.first())
                .map(|sentence| sentence.text.as_str())
                .unwrap_or("")
        })
        .collect::<Vec<_>>()
        .join(" ")
        .trim()
        .to_string();

    if primary.is_empty() {
        return Err(TranslateError::TranslationFailed);
    }

    Ok((primary, alternatives))
}

/// Splits a regional target code like "EN-US" into its base code and the
/// original (un-split) string for the `regionalVariant` field.
fn split_regional_variant(target_lang: &str) -> (&str, Option<String>) {
    match target_lang.split_once('-') {
        Some((base, _)) => (base, Some(target_lang.to_string())),
        None => (target_lang, None),
    }
}

/// Text containing both `<` and `>` is split as rich text.
fn is_rich_text(text: &str) -> bool {
    text.contains('<') && text.contains('>')
}
