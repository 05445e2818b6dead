//! # Hosted Model Client
//!
//! Sends the analysis prompt to Gemini, Claude or OpenAI and returns the
//! narrative text. The provider is picked from whichever API key is present
//! in the environment; the model name can be overridden.
//!
//! Callers depend on the [`ModelClient`] trait so tests can substitute a
//! scripted model.

use std::time::Duration;

use async_trait::async_trait;

use crate::error::{Result, SmartBiError};

pub const DEFAULT_GEMINI_MODEL: &str = "gemini-2.5-flash-lite";
pub const DEFAULT_CLAUDE_MODEL: &str = "claude-sonnet-4-20250514";
pub const DEFAULT_OPENAI_MODEL: &str = "gpt-4o";

/// Something that turns a prompt into narrative text.
#[async_trait]
pub trait ModelClient: Send + Sync {
    /// Human-readable provider name, e.g. "Google Gemini".
    fn provider(&self) -> &str;

    fn model_name(&self) -> &str;

    /// Generate a response. Empty output is an error.
    async fn generate(&self, prompt: &str) -> Result<String>;
}

/// Supported hosted model providers.
#[derive(Debug, Clone)]
pub enum Provider {
    Gemini { api_key: String, model: String },
    Claude { api_key: String, model: String },
    OpenAI { api_key: String, model: String },
}

impl Provider {
    /// Pick a provider from environment variables.
    ///
    /// Checks `GEMINI_API_KEY`, then `ANTHROPIC_API_KEY`, then
    /// `OPENAI_API_KEY`. Returns `None` when none is set.
    pub fn from_env(model_override: Option<&str>) -> Option<Self> {
        Self::from_lookup(|key| std::env::var(key).ok(), model_override)
    }

    pub fn from_lookup<F>(lookup: F, model_override: Option<&str>) -> Option<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let key = |name: &str| lookup(name).filter(|v| !v.trim().is_empty());
        let model = |default: &str| model_override.unwrap_or(default).to_string();

        if let Some(api_key) = key("GEMINI_API_KEY") {
            return Some(Provider::Gemini {
                api_key,
                model: model(DEFAULT_GEMINI_MODEL),
            });
        }
        if let Some(api_key) = key("ANTHROPIC_API_KEY") {
            return Some(Provider::Claude {
                api_key,
                model: model(DEFAULT_CLAUDE_MODEL),
            });
        }
        if let Some(api_key) = key("OPENAI_API_KEY") {
            return Some(Provider::OpenAI {
                api_key,
                model: model(DEFAULT_OPENAI_MODEL),
            });
        }
        None
    }

    pub fn display_name(&self) -> &'static str {
        match self {
            Provider::Gemini { .. } => "Google Gemini",
            Provider::Claude { .. } => "Anthropic Claude",
            Provider::OpenAI { .. } => "OpenAI",
        }
    }

    pub fn model(&self) -> &str {
        match self {
            Provider::Gemini { model, .. }
            | Provider::Claude { model, .. }
            | Provider::OpenAI { model, .. } => model,
        }
    }
}

/// A [`ModelClient`] backed by a provider's REST API.
pub struct HostedModel {
    provider: Provider,
    http: reqwest::Client,
}

impl HostedModel {
    pub fn new(provider: Provider, timeout: Duration) -> Self {
        Self {
            provider,
            http: build_http_client(timeout),
        }
    }

    /// Configure from the environment, or `None` when no API key is set.
    pub fn from_env(model_override: Option<&str>, timeout: Duration) -> Option<Self> {
        Provider::from_env(model_override).map(|p| Self::new(p, timeout))
    }
}

#[async_trait]
impl ModelClient for HostedModel {
    fn provider(&self) -> &str {
        self.provider.display_name()
    }

    fn model_name(&self) -> &str {
        self.provider.model()
    }

    async fn generate(&self, prompt: &str) -> Result<String> {
        tracing::info!(
            "Sending prompt to {} ({} chars)",
            self.provider.display_name(),
            prompt.len()
        );

        let text = match &self.provider {
            Provider::Gemini { api_key, model } => {
                call_gemini(&self.http, api_key, model, prompt).await?
            }
            Provider::Claude { api_key, model } => {
                call_claude(&self.http, api_key, model, prompt).await?
            }
            Provider::OpenAI { api_key, model } => {
                call_openai(&self.http, api_key, model, prompt).await?
            }
        };

        let text = text.trim();
        if text.is_empty() {
            return Err(SmartBiError::ModelApi {
                message: format!("{} returned an empty response", self.provider.display_name()),
            });
        }

        tracing::info!("Received {} chars from model", text.len());
        Ok(text.to_string())
    }
}

fn build_http_client(timeout: Duration) -> reqwest::Client {
    reqwest::Client::builder()
        .timeout(timeout)
        .build()
        .unwrap_or_else(|_| reqwest::Client::new())
}

/// Send a JSON body and return the parsed JSON reply, mapping transport
/// errors and non-2xx statuses to `ModelApi`.
async fn post_json(
    request: reqwest::RequestBuilder,
    body: &serde_json::Value,
    api_name: &str,
) -> Result<serde_json::Value> {
    let response = request
        .header("content-type", "application/json")
        .json(body)
        .send()
        .await
        .map_err(|e| SmartBiError::ModelApi {
            message: format!("Failed to call {} API: {}", api_name, e),
        })?;

    let status = response.status();
    let response_text = response.text().await.map_err(|e| SmartBiError::ModelApi {
        message: format!("Failed to read {} API response: {}", api_name, e),
    })?;

    if !status.is_success() {
        return Err(SmartBiError::ModelApi {
            message: format!(
                "{} API returned {}: {}",
                api_name,
                status,
                truncate(&response_text, 500),
            ),
        });
    }

    serde_json::from_str(&response_text).map_err(|e| SmartBiError::ModelApi {
        message: format!("Failed to parse {} API response JSON: {}", api_name, e),
    })
}

/// Call the Gemini `generateContent` endpoint.
async fn call_gemini(
    http: &reqwest::Client,
    api_key: &str,
    model: &str,
    prompt: &str,
) -> Result<String> {
    let body = serde_json::json!({
        "contents": [
            { "parts": [ { "text": prompt } ] }
        ]
    });

    let url = format!(
        "https://generativelanguage.googleapis.com/v1beta/models/{}:generateContent",
        model
    );
    let parsed = post_json(
        http.post(url).header("x-goog-api-key", api_key),
        &body,
        "Gemini",
    )
    .await?;

    extract_gemini_text(&parsed).ok_or_else(|| SmartBiError::ModelApi {
        message: "Gemini API response missing candidates[0].content.parts".to_string(),
    })
}

fn extract_gemini_text(parsed: &serde_json::Value) -> Option<String> {
    let parts = parsed["candidates"]
        .as_array()?
        .first()?
        .get("content")?
        .get("parts")?
        .as_array()?;

    Some(
        parts
            .iter()
            .filter_map(|part| part["text"].as_str())
            .collect::<Vec<_>>()
            .join(""),
    )
}

/// Call the Anthropic Messages API.
async fn call_claude(
    http: &reqwest::Client,
    api_key: &str,
    model: &str,
    prompt: &str,
) -> Result<String> {
    let body = serde_json::json!({
        "model": model,
        "max_tokens": 8192,
        "messages": [
            {
                "role": "user",
                "content": prompt
            }
        ]
    });

    let parsed = post_json(
        http.post("https://api.anthropic.com/v1/messages")
            .header("x-api-key", api_key)
            .header("anthropic-version", "2023-06-01"),
        &body,
        "Claude",
    )
    .await?;

    let text = parsed["content"]
        .as_array()
        .map(|blocks| {
            blocks
                .iter()
                .filter_map(|block| block["text"].as_str())
                .collect::<Vec<_>>()
                .join("")
        })
        .ok_or_else(|| SmartBiError::ModelApi {
            message: "Claude API response missing content".to_string(),
        })?;

    Ok(text)
}

/// Call the OpenAI Chat Completions API.
async fn call_openai(
    http: &reqwest::Client,
    api_key: &str,
    model: &str,
    prompt: &str,
) -> Result<String> {
    let body = serde_json::json!({
        "model": model,
        "messages": [
            {
                "role": "user",
                "content": prompt
            }
        ]
    });

    let parsed = post_json(
        http.post("https://api.openai.com/v1/chat/completions")
            .header("Authorization", format!("Bearer {}", api_key)),
        &body,
        "OpenAI",
    )
    .await?;

    let text = parsed["choices"]
        .as_array()
        .and_then(|arr| arr.first())
        .and_then(|choice| choice["message"]["content"].as_str())
        .ok_or_else(|| SmartBiError::ModelApi {
            message: "OpenAI API response missing choices[0].message.content".to_string(),
        })?;

    Ok(text.to_string())
}

/// Cut `s` to at most `max` bytes without splitting a character.
fn truncate(s: &str, max: usize) -> &str {
    if s.len() <= max {
        return s;
    }
    let mut end = max;
    while !s.is_char_boundary(end) {
        end -= 1;
    }
    &s[..end]
}
