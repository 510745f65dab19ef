//! Completion capability abstraction and implementation.
//!
//! Defines the [`CompletionClient`] trait — the injectable text-generation
//! capability — and the OpenAI chat-completions implementation. Prompts are
//! two-part [`Prompt`] values (system + user), mirroring the chat message
//! shape the provider expects.
//!
//! Retry strategy matches [`crate::embedding`]: 429/5xx/network errors are
//! retried with exponential backoff, other client errors fail immediately.

use async_trait::async_trait;
use std::time::Duration;

use crate::config::LlmConfig;
use crate::error::{Error, Result};

/// A two-part structured generation prompt.
#[derive(Debug, Clone, PartialEq)]
pub struct Prompt {
    /// Role/instruction part.
    pub system: String,
    /// Task part.
    pub user: String,
}

impl Prompt {
    pub fn new(system: impl Into<String>, user: impl Into<String>) -> Self {
        Self {
            system: system.into(),
            user: user.into(),
        }
    }
}

/// An external capability that completes a structured prompt into text at a
/// given sampling temperature.
#[async_trait]
pub trait CompletionClient: Send + Sync {
    async fn complete(&self, prompt: &Prompt, temperature: f32) -> Result<String>;
}

// ============ OpenAI Completion ============

/// Completion client backed by the OpenAI chat-completions API.
///
/// Requires the `OPENAI_API_KEY` environment variable to be set.
pub struct OpenAiCompletion {
    model: String,
    timeout: Duration,
    max_retries: u32,
}

impl OpenAiCompletion {
    /// Create a new completion client from configuration.
    ///
    /// # Errors
    ///
    /// Returns an error if `OPENAI_API_KEY` is not in the environment.
    pub fn new(config: &LlmConfig) -> Result<Self> {
        if std::env::var("OPENAI_API_KEY").is_err() {
            return Err(Error::Config(
                "OPENAI_API_KEY environment variable not set".to_string(),
            ));
        }
        Ok(Self {
            model: config.model.clone(),
            timeout: Duration::from_secs(config.timeout_secs),
            max_retries: config.max_retries,
        })
    }
}

#[async_trait]
impl CompletionClient for OpenAiCompletion {
    async fn complete(&self, prompt: &Prompt, temperature: f32) -> Result<String> {
        let api_key = std::env::var("OPENAI_API_KEY")
            .map_err(|_| Error::Config("OPENAI_API_KEY not set".to_string()))?;

        let client = reqwest::Client::builder()
            .timeout(self.timeout)
            .build()
            .map_err(|e| Error::Completion(e.to_string()))?;

        let body = serde_json::json!({
            "model": self.model,
            "temperature": temperature,
            "messages": [
                { "role": "system", "content": prompt.system },
                { "role": "user", "content": prompt.user },
            ],
        });

        let mut last_err = None;

        for attempt in 0..=self.max_retries {
            if attempt > 0 {
                let delay = Duration::from_secs(1 << (attempt - 1).min(5));
                tokio::time::sleep(delay).await;
            }

            let resp = client
                .post("https://api.openai.com/v1/chat/completions")
                .header("Authorization", format!("Bearer {}", api_key))
                .header("Content-Type", "application/json")
                .json(&body)
                .send()
                .await;

            match resp {
                Ok(response) => {
                    let status = response.status();

                    if status.is_success() {
                        let json: serde_json::Value = response
                            .json()
                            .await
                            .map_err(|e| Error::Completion(e.to_string()))?;
                        return parse_chat_response(&json);
                    }

                    if status.as_u16() == 429 || status.is_server_error() {
                        let body_text = response.text().await.unwrap_or_default();
                        last_err = Some(Error::Completion(format!(
                            "OpenAI API error {}: {}",
                            status, body_text
                        )));
                        continue;
                    }

                    let body_text = response.text().await.unwrap_or_default();
                    return Err(Error::Completion(format!(
                        "OpenAI API error {}: {}",
                        status, body_text
                    )));
                }
                Err(e) => {
                    last_err = Some(Error::Completion(e.to_string()));
                    continue;
                }
            }
        }

        Err(last_err
            .unwrap_or_else(|| Error::Completion("completion failed after retries".to_string())))
    }
}

/// Parse the chat-completions response JSON into the assistant text.
fn parse_chat_response(json: &serde_json::Value) -> Result<String> {
    json.get("choices")
        .and_then(|c| c.as_array())
        .and_then(|c| c.first())
        .and_then(|choice| choice.get("message"))
        .and_then(|m| m.get("content"))
        .and_then(|c| c.as_str())
        .map(str::to_string)
        .ok_or_else(|| Error::Completion("invalid OpenAI response: missing message content".to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_chat_response() {
        let json = serde_json::json!({
            "choices": [
                { "message": { "role": "assistant", "content": "A quiet little film." } }
            ]
        });
        assert_eq!(parse_chat_response(&json).unwrap(), "A quiet little film.");
    }

    #[test]
    fn test_parse_chat_response_missing_choices() {
        let json = serde_json::json!({ "error": { "message": "bad request" } });
        assert!(parse_chat_response(&json).is_err());
    }
}
