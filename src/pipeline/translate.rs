//! Translation back ends and the retry loop around them.
//!
//! The orchestrator only sees the [`Translator`] trait. Two implementations
//! ship with the crate:
//!
//! * [`LlmTranslator`]: any chat-completion provider from `edgequake-llm`.
//! * [`GoogleTranslator`]: Google Cloud Translation v2 over REST.
//!
//! ## Retry Strategy
//!
//! Both back ends fail transiently under load (HTTP 429 / 503). Exponential
//! backoff (`retry_backoff_ms * 2^(attempt - 1)`) gives, with a 500 ms base and 3
//! retries, the wait sequence 500 ms → 1 s → 2 s before the failure is
//! surfaced as [`SlideGenError::TranslationFailed`].

use crate::config::GenerationConfig;
use crate::error::SlideGenError;
use crate::pipeline::clean::clean_translation;
use crate::prompts::translation_prompt;
use async_trait::async_trait;
use edgequake_llm::{ChatMessage, CompletionOptions, LLMProvider};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Instant;
use thiserror::Error;
use tokio::time::{sleep, Duration};
use tracing::{debug, warn};

const GOOGLE_TRANSLATE_ENDPOINT: &str = "https://translation.googleapis.com/language/translate/v2";

/// A single failed translation attempt.
#[derive(Debug, Error)]
#[error("{0}")]
pub struct TranslateError(pub String);

/// Translates text into a target language.
#[async_trait]
pub trait Translator: Send + Sync {
    /// Translate `text` into the language with ISO-639 code `target_code`.
    async fn translate(&self, text: &str, target_code: &str) -> Result<String, TranslateError>;
}

/// Call `translator` with exponential backoff.
///
/// `language` is only used for logs and the error value.
pub async fn translate_with_retry(
    translator: &dyn Translator,
    text: &str,
    language: &str,
    target_code: &str,
    max_retries: u32,
    retry_backoff_ms: u64,
) -> Result<String, SlideGenError> {
    let start = Instant::now();
    let mut last_err: Option<String> = None;

    for attempt in 0..=max_retries {
        if attempt > 0 {
            let backoff = backoff_ms(retry_backoff_ms, attempt);
            warn!(
                "{}: translation retry {}/{} after {}ms",
                language, attempt, max_retries, backoff
            );
            sleep(Duration::from_millis(backoff)).await;
        }

        match translator.translate(text, target_code).await {
            Ok(translated) => {
                debug!(
                    "{}: translated {} → {} chars in {:?}",
                    language,
                    text.chars().count(),
                    translated.chars().count(),
                    start.elapsed()
                );
                return Ok(translated);
            }
            Err(e) => {
                warn!("{}: translation attempt {} failed: {}", language, attempt + 1, e);
                last_err = Some(e.0);
            }
        }
    }

    Err(SlideGenError::TranslationFailed {
        language: language.to_string(),
        detail: last_err.unwrap_or_else(|| "Unknown error".to_string()),
    })
}

/// Wait before retry `attempt` (1-based): `base * 2^(attempt - 1)`, saturating.
fn backoff_ms(base: u64, attempt: u32) -> u64 {
    2u64.checked_pow(attempt.saturating_sub(1))
        .map_or(u64::MAX, |factor| base.saturating_mul(factor))
}

// ── LLM back end ─────────────────────────────────────────────────────────

/// Translator backed by a chat-completion LLM.
pub struct LlmTranslator {
    provider: Arc<dyn LLMProvider>,
    options: CompletionOptions,
}

impl LlmTranslator {
    pub fn new(provider: Arc<dyn LLMProvider>, config: &GenerationConfig) -> Self {
        Self {
            provider,
            options: build_options(config),
        }
    }
}

#[async_trait]
impl Translator for LlmTranslator {
    async fn translate(&self, text: &str, target_code: &str) -> Result<String, TranslateError> {
        let messages = vec![
            ChatMessage::system(translation_prompt(target_code)),
            ChatMessage::user_with_images(text, vec![]),
        ];

        let response = self
            .provider
            .chat(&messages, Some(&self.options))
            .await
            .map_err(|e| TranslateError(e.to_string()))?;

        debug!(
            "LLM translation: {} input tokens, {} output tokens",
            response.prompt_tokens, response.completion_tokens
        );

        let translated = clean_translation(&response.content);
        if translated.is_empty() && !text.trim().is_empty() {
            return Err(TranslateError("provider returned an empty translation".into()));
        }
        Ok(translated)
    }
}

fn build_options(config: &GenerationConfig) -> CompletionOptions {
    CompletionOptions {
        temperature: Some(config.temperature),
        max_tokens: Some(config.max_tokens),
        ..Default::default()
    }
}

// ── Google back end ──────────────────────────────────────────────────────

/// Translator backed by the Google Cloud Translation v2 REST API.
pub struct GoogleTranslator {
    client: reqwest::Client,
    api_key: String,
    endpoint: String,
}

#[derive(Debug, Serialize)]
struct GoogleRequest<'a> {
    q: &'a str,
    target: &'a str,
    format: &'static str,
}

#[derive(Debug, Deserialize)]
struct GoogleResponse {
    data: GoogleData,
}

#[derive(Debug, Deserialize)]
struct GoogleData {
    translations: Vec<GoogleTranslation>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct GoogleTranslation {
    translated_text: String,
}

impl GoogleTranslator {
    pub fn new(api_key: impl Into<String>, timeout_secs: u64) -> Result<Self, SlideGenError> {
        let client = reqwest::Client::builder()
            .timeout(std::time::Duration::from_secs(timeout_secs))
            .build()
            .map_err(|e| SlideGenError::TranslatorNotConfigured {
                backend: "google".to_string(),
                hint: format!("HTTP client: {e}"),
            })?;
        Ok(Self {
            client,
            api_key: api_key.into(),
            endpoint: GOOGLE_TRANSLATE_ENDPOINT.to_string(),
        })
    }

    /// Point the client at a different endpoint (proxies, test servers).
    pub fn with_endpoint(mut self, endpoint: impl Into<String>) -> Self {
        self.endpoint = endpoint.into();
        self
    }
}

#[async_trait]
impl Translator for GoogleTranslator {
    async fn translate(&self, text: &str, target_code: &str) -> Result<String, TranslateError> {
        let response = self
            .client
            .post(&self.endpoint)
            .query(&[("key", self.api_key.as_str())])
            .json(&GoogleRequest {
                q: text,
                target: target_code,
                format: "text",
            })
            .send()
            .await
            .map_err(|e| TranslateError(e.to_string()))?;

        let status = response.status();
        let body = response
            .text()
            .await
            .map_err(|e| TranslateError(e.to_string()))?;
        if !status.is_success() {
            return Err(TranslateError(format!("HTTP {status}: {}", body.trim())));
        }
        parse_google_response(&body)
    }
}

fn parse_google_response(body: &str) -> Result<String, TranslateError> {
    let parsed: GoogleResponse = serde_json::from_str(body)
        .map_err(|e| TranslateError(format!("unexpected response: {e}")))?;
    parsed
        .data
        .translations
        .into_iter()
        .next()
        .map(|t| clean_translation(&t.translated_text))
        .ok_or_else(|| TranslateError("response contained no translations".into()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};

    /// Fails the first `failures` calls, then echoes `[code] text`.
    struct Flaky {
        failures: u32,
        calls: AtomicU32,
    }

    #[async_trait]
    impl Translator for Flaky {
        async fn translate(&self, text: &str, target_code: &str) -> Result<String, TranslateError> {
            let n = self.calls.fetch_add(1, Ordering::SeqCst);
            if n < self.failures {
                Err(TranslateError(format!("503 attempt {n}")))
            } else {
                Ok(format!("[{target_code}] {text}"))
            }
        }
    }

    #[test]
    fn retry_recovers_from_transient_failures() {
        let t = Flaky { failures: 2, calls: AtomicU32::new(0) };
        let out = tokio_test::block_on(translate_with_retry(&t, "Hi.", "French", "fr", 3, 1));
        assert_eq!(out.unwrap(), "[fr] Hi.");
        assert_eq!(t.calls.load(Ordering::SeqCst), 3);
    }

    #[test]
    fn retry_gives_up_with_last_error() {
        let t = Flaky { failures: 10, calls: AtomicU32::new(0) };
        let err = tokio_test::block_on(translate_with_retry(&t, "Hi.", "French", "fr", 2, 1))
            .unwrap_err();
        assert_eq!(t.calls.load(Ordering::SeqCst), 3);
        match err {
            SlideGenError::TranslationFailed { language, detail } => {
                assert_eq!(language, "French");
                assert_eq!(detail, "503 attempt 2");
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn zero_retries_means_one_attempt() {
        let t = Flaky { failures: 1, calls: AtomicU32::new(0) };
        assert!(tokio_test::block_on(translate_with_retry(&t, "Hi.", "Ukrainian", "uk", 0, 1)).is_err());
        assert_eq!(t.calls.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn backoff_doubles_and_saturates() {
        assert_eq!(backoff_ms(500, 1), 500);
        assert_eq!(backoff_ms(500, 2), 1000);
        assert_eq!(backoff_ms(500, 3), 2000);
        assert_eq!(backoff_ms(500, 60), u64::MAX);
        assert_eq!(backoff_ms(500, 200), u64::MAX);
    }

    #[test]
    fn build_options_defaults() {
        let opts = build_options(&GenerationConfig::default());
        assert_eq!(opts.temperature, Some(0.2));
        assert_eq!(opts.max_tokens, Some(4096));
    }

    #[test]
    fn parse_google_ok() {
        let body = r#"{"data": {"translations": [{"translatedText": "Він закричав.", "detectedSourceLanguage": "en"}]}}"#;
        assert_eq!(parse_google_response(body).unwrap(), "Він закричав.");
    }

    #[test]
    fn parse_google_empty_list() {
        assert!(parse_google_response(r#"{"data": {"translations": []}}"#).is_err());
    }

    #[test]
    fn parse_google_error_document() {
        let body = r#"{"error": {"code": 400, "message": "API key not valid."}}"#;
        assert!(parse_google_response(body).is_err());
    }

    #[test]
    fn google_request_shape() {
        let json = serde_json::to_value(GoogleRequest { q: "Hi.", target: "fr", format: "text" }).unwrap();
        assert_eq!(json, serde_json::json!({"q": "Hi.", "target": "fr", "format": "text"}));
    }
}
