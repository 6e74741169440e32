//! LLM Client: unified interface for Ollama and OpenAI-compatible backends.

use std::time::{Duration, Instant};

use reqwest::Client;
use serde_json::{Value, json};
use tracing::{debug, warn};

use crate::error::LlmError;
use crate::generator::LineGenerator;
use crate::types::{LineRequest, LlmResponse, LlmSettings, ProviderKind};

/// Provider backend for line generation.
#[derive(Debug, Clone)]
pub enum LlmProvider {
    /// Ollama running locally.
    Ollama { base_url: String },
    /// OpenAI-compatible API.
    OpenAiCompatible { base_url: String, api_key: String },
    /// No backend; all calls return an error and the caller falls back.
    None,
}

/// Routes line requests to the configured backend.
#[derive(Debug, Clone)]
pub struct LlmClient {
    provider: LlmProvider,
    http: Client,
    model: String,
    max_retries: u32,
}

impl LlmClient {
    /// Create a new client.
    #[must_use]
    pub fn new(provider: LlmProvider, model: impl Into<String>, max_retries: u32) -> Self {
        Self {
            provider,
            http: Client::new(),
            model: model.into(),
            max_retries,
        }
    }

    /// Create a client with no backend.
    #[must_use]
    pub fn none() -> Self {
        Self::new(LlmProvider::None, String::new(), 0)
    }

    /// Build a client from `[llm]` settings.
    ///
    /// # Errors
    /// Returns `LlmError::ConfigError` when an OpenAI-compatible provider is
    /// selected without an API key.
    pub fn from_settings(settings: &LlmSettings) -> Result<Self, LlmError> {
        let base_url = settings.base_url.trim_end_matches('/').to_string();
        let provider = match settings.provider {
            ProviderKind::None => LlmProvider::None,
            ProviderKind::Ollama => LlmProvider::Ollama { base_url },
            ProviderKind::OpenAiCompatible => {
                let api_key = settings
                    .api_key
                    .clone()
                    .filter(|k| !k.trim().is_empty())
                    .ok_or_else(|| LlmError::ConfigError("openai provider needs api_key".into()))?;
                LlmProvider::OpenAiCompatible { base_url, api_key }
            }
        };
        Ok(Self::new(provider, settings.model.clone(), settings.max_retries))
    }

    /// Generate a raw response.
    ///
    /// # Errors
    /// Returns `Err` if no backend is configured or all retries fail.
    pub async fn generate(&self, request: &LineRequest) -> Result<LlmResponse, LlmError> {
        match &self.provider {
            LlmProvider::None => Err(LlmError::Unavailable("No LLM provider configured".into())),
            LlmProvider::Ollama { base_url } => {
                let url = format!("{base_url}/api/generate");
                let body = json!({
                    "model": self.model,
                    "system": request.system,
                    "prompt": request.user,
                    "stream": false,
                    "options": {
                        "temperature": request.temperature,
                        "num_predict": request.max_tokens,
                    }
                });
                self.post_with_retries(&url, None, &body, request.timeout_ms, |json| {
                    let text = json["response"].as_str()?.to_string();
                    let tokens = json["eval_count"].as_u64().unwrap_or(0);
                    Some((text, tokens))
                })
                .await
            }
            LlmProvider::OpenAiCompatible { base_url, api_key } => {
                let url = format!("{base_url}/v1/chat/completions");
                let body = json!({
                    "model": self.model,
                    "messages": [
                        { "role": "system", "content": request.system },
                        { "role": "user", "content": request.user },
                    ],
                    "max_tokens": request.max_tokens,
                    "temperature": request.temperature,
                });
                self.post_with_retries(&url, Some(api_key), &body, request.timeout_ms, |json| {
                    let text = json["choices"][0]["message"]["content"].as_str()?.to_string();
                    let tokens = json["usage"]["completion_tokens"].as_u64().unwrap_or(0);
                    Some((text, tokens))
                })
                .await
            }
        }
    }

    async fn post_with_retries(
        &self,
        url: &str,
        bearer: Option<&str>,
        body: &Value,
        timeout_ms: u64,
        extract: impl Fn(&Value) -> Option<(String, u64)>,
    ) -> Result<LlmResponse, LlmError> {
        let mut last_error = String::new();
        for attempt in 0..=self.max_retries {
            if attempt > 0 {
                debug!(attempt = attempt + 1, of = self.max_retries + 1, "Retrying LLM call");
            }

            let start = Instant::now();
            let mut req = self
                .http
                .post(url)
                .json(body)
                .timeout(Duration::from_millis(timeout_ms));
            if let Some(key) = bearer {
                req = req.bearer_auth(key);
            }
            let result = req.send().await;
            let latency_ms = u64::try_from(start.elapsed().as_millis()).unwrap_or(u64::MAX);

            match result {
                Ok(resp) if resp.status().is_success() => {
                    let json: Value = resp
                        .json()
                        .await
                        .map_err(|e| LlmError::ParseError(e.to_string()))?;
                    let Some((text, tokens)) = extract(&json) else {
                        return Err(LlmError::ParseError(format!("unexpected response shape: {json}")));
                    };
                    return Ok(LlmResponse {
                        text,
                        tokens_generated: u32::try_from(tokens).unwrap_or(u32::MAX),
                        latency_ms,
                        model: self.model.clone(),
                    });
                }
                Ok(resp) => {
                    let status = resp.status();
                    last_error = format!("HTTP {status}: {}", resp.text().await.unwrap_or_default());
                    warn!(url, %status, "LLM backend returned an error");
                }
                Err(e) => {
                    if e.is_timeout() {
                        warn!(url, timeout_ms, "LLM request timed out");
                    } else {
                        warn!(url, error = %e, "LLM request failed");
                    }
                    last_error = e.to_string();
                }
            }
        }

        Err(LlmError::RetriesExhausted {
            attempts: self.max_retries + 1,
            last_error,
        })
    }

    /// Check if the client has a backend configured.
    #[must_use]
    pub fn is_available(&self) -> bool {
        !matches!(self.provider, LlmProvider::None)
    }
}

/// Reduce raw model output to one speakable line.
///
/// Keeps the first non-empty paragraph, drops a leading `Name:` speaker tag
/// and surrounding quotes.
#[must_use]
pub fn clean_line(raw: &str) -> String {
    let first = raw
        .split("\n\n")
        .map(str::trim)
        .find(|p| !p.is_empty())
        .unwrap_or("");
    let first = first.split('\n').map(str::trim).collect::<Vec<_>>().join(" ");
    let without_tag = match first.split_once(':') {
        Some((tag, rest)) if !tag.is_empty() && tag.len() <= 24 && !tag.contains(' ') => rest.trim(),
        _ => first.as_str(),
    };
    without_tag
        .trim_matches(|c| c == '"' || c == '\u{201c}' || c == '\u{201d}')
        .trim()
        .to_string()
}

impl LineGenerator for LlmClient {
    async fn generate_line(&self, request: &LineRequest) -> Result<String, LlmError> {
        let response = self.generate(request).await?;
        debug!(
            model = %response.model,
            tokens = response.tokens_generated,
            latency_ms = response.latency_ms,
            "Line generated"
        );
        let line = clean_line(&response.text);
        if line.is_empty() {
            return Err(LlmError::EmptyLine);
        }
        Ok(line)
    }
}
