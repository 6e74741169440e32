//! Core types for line-generation requests and responses.

use serde::{Deserialize, Serialize};

/// Which backend serves generation requests.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProviderKind {
    /// No backend; every request fails and the caller falls back.
    #[default]
    None,
    /// Ollama running locally.
    Ollama,
    /// Any OpenAI-compatible chat completions endpoint.
    #[serde(rename = "openai")]
    OpenAiCompatible,
}

/// `[llm]` settings as read from a host config file.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LlmSettings {
    /// Backend selection.
    pub provider: ProviderKind,
    /// Base URL of the backend, without a trailing path.
    pub base_url: String,
    /// Model name passed to the backend.
    pub model: String,
    /// Bearer token for OpenAI-compatible endpoints.
    pub api_key: Option<String>,
    /// Extra attempts after the first failure.
    pub max_retries: u32,
    /// Per-request HTTP timeout.
    pub timeout_ms: u64,
    /// Generation length cap.
    pub max_tokens: u32,
    /// Sampling temperature.
    pub temperature: f32,
}

impl Default for LlmSettings {
    fn default() -> Self {
        Self {
            provider: ProviderKind::None,
            base_url: "http://localhost:11434".to_string(),
            model: "llama3.2:1b".to_string(),
            api_key: None,
            max_retries: 1,
            timeout_ms: 4000,
            max_tokens: 80,
            temperature: 0.8,
        }
    }
}

/// A request for one line of character dialogue.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct LineRequest {
    /// Character persona and rules.
    pub system: String,
    /// What the player said, with scene context.
    pub user: String,
    /// Maximum tokens to generate.
    pub max_tokens: u32,
    /// Temperature (0.0 = deterministic, 1.0 = creative).
    pub temperature: f32,
    /// Request timeout in milliseconds.
    pub timeout_ms: u64,
}

impl LineRequest {
    /// A request with the default generation limits.
    #[must_use]
    pub fn new(system: impl Into<String>, user: impl Into<String>) -> Self {
        let defaults = LlmSettings::default();
        Self {
            system: system.into(),
            user: user.into(),
            max_tokens: defaults.max_tokens,
            temperature: defaults.temperature,
            timeout_ms: defaults.timeout_ms,
        }
    }

    /// Apply the limits from `settings`.
    #[must_use]
    pub fn with_limits(mut self, settings: &LlmSettings) -> Self {
        self.max_tokens = settings.max_tokens;
        self.temperature = settings.temperature;
        self.timeout_ms = settings.timeout_ms;
        self
    }
}

/// Raw backend response.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LlmResponse {
    /// Generated text, untrimmed.
    pub text: String,
    /// Tokens the backend reports generating.
    pub tokens_generated: u32,
    /// Wall-clock latency of the successful attempt.
    pub latency_ms: u64,
    /// Model that answered.
    pub model: String,
}
