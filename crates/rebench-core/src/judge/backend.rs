//! Judge model backends.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::config::JudgeConfig;
use crate::domain::error::{JudgeError, JudgeResult};

const ANTHROPIC_VERSION: &str = "2023-06-01";

/// Prompt in, free text out.
#[async_trait]
pub trait JudgeBackend: Send + Sync {
    /// Model identifier recorded on every judgement.
    fn model(&self) -> &str;

    async fn complete(&self, prompt: &str) -> JudgeResult<String>;
}

/// Anthropic Messages API client.
pub struct AnthropicBackend {
    http_client: reqwest::Client,
    api_key: String,
    config: JudgeConfig,
}

#[derive(Serialize)]
struct MessagesRequest<'a> {
    model: &'a str,
    max_tokens: u32,
    messages: [Message<'a>; 1],
}

#[derive(Serialize)]
struct Message<'a> {
    role: &'static str,
    content: &'a str,
}

#[derive(Deserialize)]
struct MessagesResponse {
    content: Vec<ContentBlock>,
}

#[derive(Deserialize)]
struct ContentBlock {
    #[serde(rename = "type")]
    kind: String,
    #[serde(default)]
    text: Option<String>,
}

impl AnthropicBackend {
    pub fn new(api_key: impl Into<String>, config: JudgeConfig) -> JudgeResult<Self> {
        let http_client = reqwest::Client::builder()
            .timeout(config.timeout())
            .build()?;
        Ok(Self {
            http_client,
            api_key: api_key.into(),
            config,
        })
    }

    /// Read the API key from `ANTHROPIC_API_KEY`.
    pub fn from_env(config: JudgeConfig) -> JudgeResult<Self> {
        let api_key = std::env::var("ANTHROPIC_API_KEY")
            .map_err(|_| JudgeError::Backend("ANTHROPIC_API_KEY is not set".to_string()))?;
        Self::new(api_key, config)
    }
}

#[async_trait]
impl JudgeBackend for AnthropicBackend {
    fn model(&self) -> &str {
        &self.config.model
    }

    async fn complete(&self, prompt: &str) -> JudgeResult<String> {
        let request = MessagesRequest {
            model: &self.config.model,
            max_tokens: self.config.max_tokens,
            messages: [Message {
                role: "user",
                content: prompt,
            }],
        };

        let response = self
            .http_client
            .post(&self.config.api_url)
            .header("x-api-key", &self.api_key)
            .header("anthropic-version", ANTHROPIC_VERSION)
            .json(&request)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(JudgeError::Backend(format!("HTTP {status}: {body}")));
        }

        let body: MessagesResponse = response.json().await?;
        text_of(body)
    }
}

fn text_of(body: MessagesResponse) -> JudgeResult<String> {
    let text: String = body
        .content
        .into_iter()
        .filter(|block| block.kind == "text")
        .filter_map(|block| block.text)
        .collect();
    if text.is_empty() {
        return Err(JudgeError::Backend(
            "response contained no text content".to_string(),
        ));
    }
    Ok(text)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn request_body_shape() {
        let request = MessagesRequest {
            model: "m",
            max_tokens: 2048,
            messages: [Message {
                role: "user",
                content: "hi",
            }],
        };
        let json = serde_json::to_value(&request).unwrap();
        assert_eq!(json["max_tokens"], 2048);
        assert_eq!(json["messages"][0]["role"], "user");
        assert_eq!(json["messages"][0]["content"], "hi");
    }

    #[test]
    fn text_blocks_are_joined() {
        let body: MessagesResponse = serde_json::from_str(
            r#"{"content":[{"type":"text","text":"{\"a\":"},{"type":"tool_use","id":"x"},{"type":"text","text":"1}"}]}"#,
        )
        .unwrap();
        assert_eq!(text_of(body).unwrap(), "{\"a\":1}");
    }

    #[test]
    fn empty_content_is_backend_error() {
        let body: MessagesResponse = serde_json::from_str(r#"{"content":[]}"#).unwrap();
        assert!(matches!(text_of(body), Err(JudgeError::Backend(_))));
    }

    #[test]
    fn backend_reports_configured_model() {
        let backend = AnthropicBackend::new("key", JudgeConfig::default().with_model("judge-x")).unwrap();
        assert_eq!(backend.model(), "judge-x");
    }
}
