//! HTTP client for the OpenAI Responses API.
//!
//! The [`CompletionModel`] trait is the seam the proposal engine and
//! comment pipeline call through; tests swap in a fake, production
//! uses [`OpenAiModel`].

use anyhow::{bail, Context, Result};
use async_trait::async_trait;
use serde_json::{json, Value};
use std::time::Duration;

use crate::config::ModelConfig;

const OPENAI_URL: &str = "https://api.openai.com/v1/responses";

/// A text-in, text-out completion backend.
#[async_trait]
pub trait CompletionModel: Send + Sync {
    async fn complete(&self, system: &str, user: &str) -> Result<String>;
}

/// Client for the OpenAI Responses endpoint. Reads `OPENAI_API_KEY`
/// from the environment at call time, so the binary can start without
/// a key and only the AI commands require one.
pub struct OpenAiModel {
    client: reqwest::Client,
    model: String,
}

impl OpenAiModel {
    pub fn from_config(config: &ModelConfig) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .context("failed to build HTTP client")?;
        Ok(Self {
            client,
            model: config.model.clone(),
        })
    }
}

#[async_trait]
impl CompletionModel for OpenAiModel {
    async fn complete(&self, system: &str, user: &str) -> Result<String> {
        let api_key = match std::env::var("OPENAI_API_KEY") {
            Ok(key) if !key.trim().is_empty() => key,
            _ => bail!("OPENAI_API_KEY not set"),
        };

        let body = json!({
            "model": self.model,
            "input": [
                {
                    "role": "system",
                    "content": [{ "type": "input_text", "text": system }]
                },
                {
                    "role": "user",
                    "content": [{ "type": "input_text", "text": user }]
                }
            ]
        });

        let response = self
            .client
            .post(OPENAI_URL)
            .bearer_auth(&api_key)
            .json(&body)
            .send()
            .await
            .context("model API request failed")?;

        let status = response.status();
        if !status.is_success() {
            let text = response.text().await.unwrap_or_default();
            bail!("model API error {}: {}", status.as_u16(), text);
        }

        let payload: Value = response
            .json()
            .await
            .context("failed to parse model API response")?;
        let text = extract_output_text(&payload);
        if text.is_empty() {
            bail!("model API returned an empty response");
        }
        Ok(text)
    }
}

/// Pull the generated text out of a Responses API payload: the
/// convenience `output_text` field when present, otherwise the text
/// items in the `output` array.
pub fn extract_output_text(payload: &Value) -> String {
    if let Some(text) = payload.get("output_text").and_then(Value::as_str) {
        return text.trim().to_string();
    }

    let mut parts = Vec::new();
    if let Some(output) = payload.get("output").and_then(Value::as_array) {
        for item in output {
            if let Some(content) = item.get("content").and_then(Value::as_array) {
                for block in content {
                    let is_text = block
                        .get("type")
                        .and_then(Value::as_str)
                        .map(|t| t == "text" || t == "output_text")
                        .unwrap_or(false);
                    if is_text {
                        if let Some(text) = block.get("text").and_then(Value::as_str) {
                            parts.push(text);
                        }
                    }
                }
            }
        }
    }
    parts.join("\n").trim().to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn extract_prefers_output_text_field() {
        let payload = json!({ "output_text": "  hello world  " });
        assert_eq!(extract_output_text(&payload), "hello world");
    }

    #[test]
    fn extract_walks_output_array() {
        let payload = json!({
            "output": [
                {
                    "type": "message",
                    "content": [
                        { "type": "text", "text": "first" },
                        { "type": "reasoning", "text": "ignored" },
                        { "type": "output_text", "text": "second" }
                    ]
                }
            ]
        });
        assert_eq!(extract_output_text(&payload), "first\nsecond");
    }

    #[test]
    fn extract_empty_on_unrecognized_shape() {
        assert_eq!(extract_output_text(&json!({ "id": "resp_1" })), "");
    }
}
