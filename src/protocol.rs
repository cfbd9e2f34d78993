//! Typed shapes for the DeepL JSON-RPC wire protocol.
//!
//! The upstream service speaks loosely-typed JSON; modelling the request and
//! response envelopes as explicit structs catches shape drift at the
//! deserialization boundary instead of deep inside the pipeline. Field order
//! in the request structs mirrors what the emulated extension sends.

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

/// Method name for the sentence-splitting call.
pub const METHOD_SPLIT: &str = "LMT_split_text";

/// Method name for the translation call.
pub const METHOD_HANDLE_JOBS: &str = "LMT_handle_jobs";

/// JSON-RPC request envelope.
#[derive(Debug, Serialize)]
pub struct JsonRpcRequest<P> {
    pub jsonrpc: &'static str,
    pub method: &'static str,
    pub id: u64,
    pub params: P,
}

impl<P: Serialize> JsonRpcRequest<P> {
    pub fn new(method: &'static str, id: u64, params: P) -> Self {
        Self {
            jsonrpc: "2.0",
            method,
            id,
            params,
        }
    }

    /// Serializes the request to the exact POST body the upstream expects.
    ///
    /// The emulated client varies the whitespace around the `method` key
    /// based on the request id: when `(id+5) % 29 == 0` or `(id+3) % 13 == 0`
    /// the colon gets a space on both sides, otherwise only after. Only the
    /// first occurrence is rewritten. The rule has no documented rationale
    /// upstream; it is preserved as a black-box compatibility shim.
    pub fn to_post_string(&self) -> Result<String> {
        let body = serde_json::to_string(self).context("Failed to serialize request payload")?;
        let spaced = (self.id + 5) % 29 == 0 || (self.id + 3) % 13 == 0;
        let replacement = if spaced {
            "\"method\" : \""
        } else {
            "\"method\": \""
        };
        Ok(body.replacen("\"method\":\"", replacement, 1))
    }
}

/// Shared per-job parameters sent on both calls.
#[derive(Debug, Serialize)]
pub struct CommonJobParams {
    pub mode: &'static str,
    /// Original target code (e.g. "EN-US") when the caller requested a
    /// regional variant; omitted entirely otherwise.
    #[serde(rename = "regionalVariant", skip_serializing_if = "Option::is_none")]
    pub regional_variant: Option<String>,
}

impl CommonJobParams {
    pub fn translate(regional_variant: Option<String>) -> Self {
        Self {
            mode: "translate",
            regional_variant,
        }
    }
}

/// Parameters for `LMT_split_text`.
#[derive(Debug, Serialize)]
pub struct SplitParams {
    #[serde(rename = "commonJobParams")]
    pub common_job_params: CommonJobParams,
    pub lang: SplitLang,
    pub texts: Vec<String>,
    #[serde(rename = "textType")]
    pub text_type: &'static str,
}

/// Language selector for the split call; source detection is always left to
/// the upstream service.
#[derive(Debug, Serialize)]
pub struct SplitLang {
    pub lang_user_selected: &'static str,
}

/// Parameters for `LMT_handle_jobs`.
#[derive(Debug, Serialize)]
pub struct JobsParams {
    #[serde(rename = "commonJobParams")]
    pub common_job_params: CommonJobParams,
    pub lang: JobsLang,
    pub jobs: Vec<Job>,
    pub priority: i32,
    pub timestamp: u64,
}

#[derive(Debug, Serialize)]
pub struct JobsLang {
    pub source_lang_computed: String,
    pub target_lang: String,
}

/// One unit of translation work: a single sentence plus one sentence of
/// surrounding context on each side, when a neighbour exists.
#[derive(Debug, Serialize)]
pub struct Job {
    pub kind: &'static str,
    pub preferred_num_beams: u32,
    pub raw_en_context_before: Vec<String>,
    pub raw_en_context_after: Vec<String>,
    pub sentences: Vec<JobSentence>,
}

#[derive(Debug, Serialize)]
pub struct JobSentence {
    pub prefix: String,
    pub text: String,
    pub id: u64,
}

/// Response to `LMT_split_text`.
#[derive(Debug, Deserialize)]
pub struct SplitResponse {
    pub result: SplitResult,
}

#[derive(Debug, Deserialize)]
pub struct SplitResult {
    pub lang: DetectedLang,
    pub texts: Vec<SplitText>,
}

#[derive(Debug, Deserialize)]
pub struct DetectedLang {
    pub detected: String,
}

#[derive(Debug, Deserialize)]
pub struct SplitText {
    pub chunks: Vec<Chunk>,
}

/// A contiguous group of sentences from the splitter; chunk order is
/// significant and carried through to the jobs.
#[derive(Debug, Deserialize)]
pub struct Chunk {
    pub sentences: Vec<SplitSentence>,
}

#[derive(Debug, Deserialize)]
pub struct SplitSentence {
    #[serde(default)]
    pub prefix: String,
    pub text: String,
}

/// Response to `LMT_handle_jobs`.
#[derive(Debug, Deserialize)]
pub struct JobsResponse {
    pub result: Option<JobsResult>,
}

#[derive(Debug, Deserialize)]
pub struct JobsResult {
    #[serde(default)]
    pub translations: Vec<JobTranslation>,
}

/// Per-job translation result, aligned 1:1 with the dispatched jobs.
#[derive(Debug, Deserialize)]
pub struct JobTranslation {
    #[serde(default)]
    pub beams: Vec<Beam>,
}

/// One candidate decoding for a job; beam 0 is the primary candidate.
#[derive(Debug, Deserialize)]
pub struct Beam {
    #[serde(default)]
    pub sentences: Vec<BeamSentence>,
}

#[derive(Debug, Deserialize)]
pub struct BeamSentence {
    pub text: String,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::{json, Value};

    fn split_request(id: u64) -> JsonRpcRequest<SplitParams> {
        JsonRpcRequest::new(
            METHOD_SPLIT,
            id,
            SplitParams {
                common_job_params: CommonJobParams::translate(None),
                lang: SplitLang {
                    lang_user_selected: "AUTO",
                },
                texts: vec!["hello".to_string()],
                text_type: "plaintext",
            },
        )
    }

    #[test]
    fn test_method_spacing_parity_rule() {
        for id in 0u64..200 {
            let body = split_request(id).to_post_string().unwrap();
            let spaced = (id + 5) % 29 == 0 || (id + 3) % 13 == 0;
            if spaced {
                assert!(
                    body.contains("\"method\" : \""),
                    "id {} should use double-spaced colon: {}",
                    id,
                    body
                );
            } else {
                assert!(
                    body.contains("\"method\": \""),
                    "id {} should use single-spaced colon: {}",
                    id,
                    body
                );
                assert!(!body.contains("\"method\" : \""));
            }
        }
    }

    #[test]
    fn test_post_string_reparses_to_same_object() {
        // The formatting quirk only touches whitespace, so re-parsing must
        // yield the original envelope.
        let request = split_request(8_300_123_000);
        let body = request.to_post_string().unwrap();
        let reparsed: Value = serde_json::from_str(&body).unwrap();
        assert_eq!(reparsed, serde_json::to_value(&request).unwrap());
    }

    #[test]
    fn test_regional_variant_omitted_when_absent() {
        let params = CommonJobParams::translate(None);
        let value = serde_json::to_value(params).unwrap();
        assert_eq!(value, json!({"mode": "translate"}));

        let params = CommonJobParams::translate(Some("EN-US".to_string()));
        let value = serde_json::to_value(params).unwrap();
        assert_eq!(value, json!({"mode": "translate", "regionalVariant": "EN-US"}));
    }

    #[test]
    fn test_jobs_response_tolerates_missing_result() {
        let response: JobsResponse = serde_json::from_value(json!({})).unwrap();
        assert!(response.result.is_none());

        let response: JobsResponse =
            serde_json::from_value(json!({"result": {}})).unwrap();
        assert!(response.result.unwrap().translations.is_empty());
    }
}
