//! Completion providers.
//!
//! [`OpenAiCompletion`] calls `POST {base_url}/chat/completions`;
//! [`DisabledCompletion`] fails every call with a descriptive error, which
//! keeps catalog browsing and search usable without an API key.

use std::sync::Arc;
use std::time::Duration;

use anyhow::{anyhow, bail, Context, Result};
use async_trait::async_trait;
use fretwise_core::completion::Completion;
use serde::{Deserialize, Serialize};

use crate::config::CompletionConfig;

const SYSTEM_PROMPT: &str =
    "You are a knowledgeable guitar shop assistant. Only describe products that appear in the provided context.";

pub struct OpenAiCompletion {
    client: reqwest::Client,
    api_key: String,
    endpoint: String,
    model: String,
    temperature: f32,
    max_tokens: usize,
}

impl OpenAiCompletion {
    pub fn new(config: &CompletionConfig) -> Result<Self> {
        let api_key = std::env::var("OPENAI_API_KEY")
            .map_err(|_| anyhow!("OPENAI_API_KEY environment variable not set"))?;
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .context("failed to build OpenAI HTTP client")?;
        Ok(Self {
            client,
            api_key,
            endpoint: format!(
                "{}/chat/completions",
                config.base_url.trim_end_matches('/')
            ),
            model: config.model.clone(),
            temperature: config.temperature,
            max_tokens: config.max_tokens,
        })
    }
}

#[async_trait]
impl Completion for OpenAiCompletion {
    fn model_name(&self) -> &str {
        &self.model
    }

    async fn complete(&self, prompt: &str) -> Result<String> {
        let body = ChatRequest {
            model: &self.model,
            temperature: self.temperature,
            max_tokens: self.max_tokens,
            messages: vec![
                ChatMessage {
                    role: "system",
                    content: SYSTEM_PROMPT,
                },
                ChatMessage {
                    role: "user",
                    content: prompt,
                },
            ],
        };

        let resp = self
            .client
            .post(&self.endpoint)
            .bearer_auth(self.api_key.trim())
            .json(&body)
            .send()
            .await
            .context("failed to call OpenAI chat completions")?;

        if !resp.status().is_success() {
            let status = resp.status();
            let text = resp
                .text()
                .await
                .unwrap_or_else(|_| "<body unavailable>".to_string());
            bail!("OpenAI returned {}: {}", status, text);
        }

        let parsed: ChatResponse = resp
            .json()
            .await
            .context("failed to parse OpenAI response")?;
        first_choice(parsed)
    }
}

fn first_choice(parsed: ChatResponse) -> Result<String> {
    parsed
        .choices
        .into_iter()
        .find_map(|choice| choice.message.content)
        .ok_or_else(|| anyhow!("OpenAI response contained no message content"))
}

#[derive(Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    temperature: f32,
    max_tokens: usize,
    messages: Vec<ChatMessage<'a>>,
}

#[derive(Serialize)]
struct ChatMessage<'a> {
    role: &'a str,
    content: &'a str,
}

#[derive(Debug, Deserialize)]
struct ChatResponse {
    choices: Vec<ChatChoice>,
}

#[derive(Debug, Deserialize)]
struct ChatChoice {
    message: AssistantMessage,
}

#[derive(Debug, Deserialize)]
struct AssistantMessage {
    #[serde(default)]
    content: Option<String>,
}

/// Completion provider used when no language model is configured.
pub struct DisabledCompletion;

#[async_trait]
impl Completion for DisabledCompletion {
    fn model_name(&self) -> &str {
        "disabled"
    }

    async fn complete(&self, _prompt: &str) -> Result<String> {
        bail!("completion provider is disabled; set [completion] provider = \"openai\"")
    }
}

pub fn create_completion(config: &CompletionConfig) -> Result<Arc<dyn Completion>> {
    match config.provider.as_str() {
        "openai" => Ok(Arc::new(OpenAiCompletion::new(config)?)),
        "disabled" => Ok(Arc::new(DisabledCompletion)),
        other => bail!("Unknown completion provider: {}", other),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_first_choice_skips_empty_content() {
        let parsed: ChatResponse = serde_json::from_str(
            r#"{"choices": [{"message": {"content": null}}, {"message": {"content": "hi"}}]}"#,
        )
        .unwrap();
        assert_eq!(first_choice(parsed).unwrap(), "hi");
    }

    #[test]
    fn test_first_choice_without_choices_is_error() {
        let parsed: ChatResponse = serde_json::from_str(r#"{"choices": []}"#).unwrap();
        assert!(first_choice(parsed).is_err());
    }

    #[tokio::test]
    async fn test_disabled_completion_errors() {
        let completion = create_completion(&CompletionConfig {
            provider: "disabled".to_string(),
            ..Default::default()
        })
        .unwrap();
        assert_eq!(completion.model_name(), "disabled");
        assert!(completion.complete("hello").await.is_err());
    }
}
