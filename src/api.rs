//! Generative-language API interaction with optional retry.
//!
//! This module is the boundary to the text generation service. It sends one
//! instruction string and gets one natural-language response back.
//!
//! # Architecture
//!
//! The module uses a trait-based design for flexibility:
//! - [`AskAsync`]: Core trait defining async LLM interaction
//! - [`GeminiClient`]: Calls the Gemini `generateContent` endpoint
//! - [`RetryAsk`]: Decorator that adds retry logic to any `AskAsync` implementation
//!
//! # Retry Strategy
//!
//! Retries are off by default (`max_retries = 0`): a failed call fails the
//! generation stage. When enabled:
//! - Exponential backoff starting at 1 second
//! - Maximum delay capped at 30 seconds
//! - Random jitter (0-250ms) added to prevent thundering herd

use crate::config::{Config, GEMINI_API_KEY_VAR};
use crate::error::{ConfigError, GenerationError};
use crate::utils::truncate_for_log;
use rand::{Rng, rng};
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::time::{Duration as StdDuration, Instant};
use tokio::time::sleep;
use tracing::{error, info, instrument, warn};

/// Default Gemini model.
pub const DEFAULT_MODEL: &str = "gemini-1.5-pro-latest";
/// Default Gemini API root.
pub const DEFAULT_GEMINI_API_BASE: &str = "https://generativelanguage.googleapis.com";

/// Trait for async LLM interaction.
///
/// Implementors of this trait can send text to an LLM and receive a response.
/// This abstraction allows for different LLM backends or decorators (like retry logic).
pub trait AskAsync {
    /// Send text to the LLM and receive a response.
    ///
    /// # Arguments
    ///
    /// * `text` - The input text to send to the LLM
    ///
    /// # Returns
    ///
    /// The LLM's response text, or an error if the request failed.
    async fn ask(&self, text: &str) -> Result<String, GenerationError>;
}

/// Wrapper that adds exponential backoff retry logic to any [`AskAsync`] implementation.
///
/// # Backoff Strategy
///
/// The delay between retries follows this formula:
/// ```text
/// delay = min(base_delay * 2^(attempt-1), max_delay) + random_jitter(0..250ms)
/// ```
pub struct RetryAsk<T> {
    /// The underlying LLM client to wrap.
    inner: T,
    /// Maximum number of retry attempts before giving up.
    max_retries: usize,
    /// Initial delay between retries (doubles with each attempt).
    base_delay: StdDuration,
    /// Maximum delay cap to prevent excessive waiting.
    max_delay: StdDuration,
}

impl<T> RetryAsk<T>
where
    T: AskAsync,
{
    /// Create a new retry wrapper around an existing [`AskAsync`] implementation.
    ///
    /// `max_retries = 0` makes this a pass-through.
    pub fn new(inner: T, max_retries: usize, base_delay: StdDuration) -> Self {
        Self {
            inner,
            max_retries,
            base_delay,
            max_delay: StdDuration::from_secs(30),
        }
    }
}

impl<T> fmt::Debug for RetryAsk<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RetryAsk")
            .field("max_retries", &self.max_retries)
            .field("base_delay", &self.base_delay)
            .field("max_delay", &self.max_delay)
            .finish()
    }
}

impl<T> AskAsync for RetryAsk<T>
where
    T: AskAsync + fmt::Debug,
{
    #[instrument(level = "info", skip_all)]
    async fn ask(&self, text: &str) -> Result<String, GenerationError> {
        let total_t0 = Instant::now();
        let mut attempt = 0usize;

        loop {
            let attempt_t0 = Instant::now();
            match self.inner.ask(text).await {
                Ok(resp) => {
                    return Ok(resp);
                }
                Err(e) => {
                    attempt += 1;
                    let attempt_dt = attempt_t0.elapsed();
                    let total_dt = total_t0.elapsed();

                    // Missing credentials will not fix themselves.
                    if attempt > self.max_retries || matches!(e, GenerationError::Config(_)) {
                        error!(
                            attempt,
                            max = self.max_retries,
                            elapsed_ms_attempt = attempt_dt.as_millis() as u64,
                            elapsed_ms_total = total_dt.as_millis() as u64,
                            error = %e,
                            "ask() giving up"
                        );
                        return Err(e);
                    }

                    // backoff calc
                    let mut delay = self.base_delay.saturating_mul(1 << (attempt - 1).min(16));
                    if delay > self.max_delay {
                        delay = self.max_delay;
                    }
                    let jitter_ms: u64 = rng().random_range(0..=250);
                    let delay = delay + StdDuration::from_millis(jitter_ms);

                    warn!(
                        attempt,
                        max = self.max_retries,
                        elapsed_ms_attempt = attempt_dt.as_millis() as u64,
                        elapsed_ms_total = total_dt.as_millis() as u64,
                        ?delay,
                        error = %e,
                        "ask() attempt failed; backing off"
                    );
                    sleep(delay).await;
                }
            }
        }
    }
}

/// Client for the Gemini `generateContent` endpoint.
///
/// A missing API key is only reported when [`ask`](AskAsync::ask) is called,
/// so the failure is attributed to the generation stage.
pub struct GeminiClient {
    http: Client,
    api_key: Option<String>,
    model: String,
    api_base: String,
}

impl GeminiClient {
    pub fn new(http: Client, api_key: Option<String>, model: String, api_base: String) -> Self {
        Self {
            http,
            api_key,
            model,
            api_base: api_base.trim_end_matches('/').to_string(),
        }
    }

    pub fn from_config(config: &Config, http: Client) -> Self {
        Self::new(
            http,
            config.gemini_api_key().ok().map(str::to_string),
            config.model.clone(),
            config.gemini_api_base.clone(),
        )
    }

    fn endpoint(&self) -> String {
        format!(
            "{}/v1beta/models/{}:generateContent",
            self.api_base, self.model
        )
    }
}

impl fmt::Debug for GeminiClient {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("GeminiClient")
            .field("model", &self.model)
            .field("api_base", &self.api_base)
            .finish_non_exhaustive()
    }
}

#[derive(Serialize)]
struct GenerateRequest<'a> {
    contents: Vec<Content<'a>>,
}

#[derive(Serialize)]
struct Content<'a> {
    role: &'a str,
    parts: Vec<Part<'a>>,
}

#[derive(Serialize)]
struct Part<'a> {
    text: &'a str,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct GenerateResponse {
    #[serde(default)]
    candidates: Vec<Candidate>,
    prompt_feedback: Option<PromptFeedback>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct Candidate {
    content: Option<CandidateContent>,
    finish_reason: Option<String>,
}

#[derive(Debug, Deserialize)]
struct CandidateContent {
    #[serde(default)]
    parts: Vec<ResponsePart>,
}

#[derive(Debug, Deserialize)]
struct ResponsePart {
    text: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct PromptFeedback {
    block_reason: Option<String>,
}

/// Pull the generated text out of a `generateContent` response body.
fn extract_text(body: &str) -> Result<String, GenerationError> {
    let parsed: GenerateResponse = serde_json::from_str(body).map_err(|e| {
        GenerationError::Malformed(format!("{e}; body: {}", truncate_for_log(body, 300)))
    })?;

    let Some(candidate) = parsed.candidates.into_iter().next() else {
        let reason = parsed
            .prompt_feedback
            .and_then(|f| f.block_reason)
            .unwrap_or_else(|| "no candidates".to_string());
        return Err(GenerationError::Malformed(format!("response has no candidates ({reason})")));
    };

    let text: String = candidate
        .content
        .map(|c| c.parts.into_iter().filter_map(|p| p.text).collect())
        .unwrap_or_default();

    if text.trim().is_empty() {
        warn!(finish_reason = ?candidate.finish_reason, "Candidate carried no text");
        return Err(GenerationError::EmptyResponse);
    }
    Ok(text)
}

impl AskAsync for GeminiClient {
    #[instrument(level = "info", skip_all, fields(model = %self.model))]
    async fn ask(&self, text: &str) -> Result<String, GenerationError> {
        let api_key = self.api_key.as_deref().ok_or(ConfigError::MissingCredential {
            name: GEMINI_API_KEY_VAR,
        })?;

        let t0 = Instant::now();
        let req = GenerateRequest {
            contents: vec![Content {
                role: "user",
                parts: vec![Part { text }],
            }],
        };

        let resp = self
            .http
            .post(self.endpoint())
            .header("x-goog-api-key", api_key)
            .json(&req)
            .send()
            .await
            .map_err(|e| GenerationError::Transport(e.to_string()))?;

        let status = resp.status();
        let body = resp
            .text()
            .await
            .map_err(|e| GenerationError::Transport(e.to_string()))?;
        let dt = t0.elapsed();

        if !status.is_success() {
            warn!(
                status = status.as_u16(),
                elapsed_ms = dt.as_millis() as u64,
                body = %truncate_for_log(&body, 300),
                "API call failed"
            );
            return Err(GenerationError::Status {
                status: status.as_u16(),
                body,
            });
        }

        let out = extract_text(&body)?;
        info!(elapsed_ms = dt.as_millis() as u64, chars = out.len(), "API call succeeded");
        Ok(out)
    }
}


#[cfg(test)]
mod tests {
    use super::testing::ScriptedAsk;
    use super::*;

    #[test]
    fn test_extract_text_joins_parts() {
        let body = r#"{
            "candidates": [{
                "content": {"parts": [{"text": "Hello "}, {"text": "designers!"}], "role": "model"},
                "finishReason": "STOP"
            }]
        }"#;
        assert_eq!(extract_text(body).unwrap(), "Hello designers!");
    }

    #[test]
    fn test_extract_text_blocked_prompt() {
        let body = r#"{"promptFeedback": {"blockReason": "SAFETY"}}"#;
        let err = extract_text(body).unwrap_err();
        assert!(matches!(err, GenerationError::Malformed(ref m) if m.contains("SAFETY")));
    }

    #[test]
    fn test_extract_text_empty_candidate() {
        let body = r#"{"candidates": [{"finishReason": "MAX_TOKENS"}]}"#;
        assert!(matches!(extract_text(body), Err(GenerationError::EmptyResponse)));
    }

    #[test]
    fn test_extract_text_not_json() {
        assert!(matches!(
            extract_text("<html>502 Bad Gateway</html>"),
            Err(GenerationError::Malformed(_))
        ));
    }

    #[test]
    fn test_endpoint_and_debug_hide_key() {
        let client = GeminiClient::new(
            Client::new(),
            Some("secret-key-9999".to_string()),
            DEFAULT_MODEL.to_string(),
            format!("{DEFAULT_GEMINI_API_BASE}/"),
        );
        assert_eq!(
            client.endpoint(),
            "https://generativelanguage.googleapis.com/v1beta/models/gemini-1.5-pro-latest:generateContent"
        );
        assert!(!format!("{client:?}").contains("secret-key"));
    }

    #[tokio::test]
    async fn test_missing_key_is_config_error() {
        let client = GeminiClient::new(
            Client::new(),
            None,
            DEFAULT_MODEL.to_string(),
            DEFAULT_GEMINI_API_BASE.to_string(),
        );
        let err = client.ask("prompt").await.unwrap_err();
        assert!(err.to_string().contains("GEMINI_API_KEY"));
    }

    #[tokio::test]
    async fn test_retry_disabled_calls_once() {
        let inner = ScriptedAsk::new(vec![
            Err(GenerationError::Transport("quota".to_string())),
            Ok("second".to_string()),
        ]);
        let api = RetryAsk::new(inner, 0, StdDuration::from_millis(1));
        assert!(api.ask("prompt").await.is_err());
        assert_eq!(api.inner.calls.get(), 1);
    }

    #[tokio::test]
    async fn test_retry_recovers() {
        let inner = ScriptedAsk::new(vec![
            Err(GenerationError::Status {
                status: 503,
                body: "overloaded".to_string(),
            }),
            Ok("second".to_string()),
        ]);
        let api = RetryAsk::new(inner, 2, StdDuration::from_millis(1));
        assert_eq!(api.ask("prompt").await.unwrap(), "second");
        assert_eq!(api.inner.calls.get(), 2);
    }

    #[tokio::test]
    async fn test_retry_skips_config_errors() {
        let inner = ScriptedAsk::new(vec![
            Err(ConfigError::MissingCredential {
                name: "GEMINI_API_KEY",
            }
            .into()),
            Ok("never".to_string()),
        ]);
        let api = RetryAsk::new(inner, 3, StdDuration::from_millis(1));
        assert!(matches!(api.ask("prompt").await, Err(GenerationError::Config(_))));
        assert_eq!(api.inner.calls.get(), 1);
    }
}
