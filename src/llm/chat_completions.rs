//! OpenAI-compatible chat completions client

use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use super::{LlmBackend, LlmError};
use crate::config::LlmConfig;

#[derive(Debug, Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: [ChatMessage<'a>; 1],
    temperature: f64,
    max_tokens: u32,
}

#[derive(Debug, Serialize)]
struct ChatMessage<'a> {
    role: &'static str,
    content: &'a str,
}

#[derive(Debug, Deserialize)]
struct ChatResponse {
    #[serde(default)]
    choices: Vec<Choice>,
}

#[derive(Debug, Deserialize)]
struct Choice {
    message: ResponseMessage,
}

#[derive(Debug, Deserialize)]
struct ResponseMessage {
    #[serde(default)]
    content: Option<String>,
}

/// Single-model client for `{base_url}/chat/completions`
#[derive(Clone)]
pub struct ChatCompletionsBackend {
    http: reqwest::Client,
    endpoint: String,
    api_key: String,
    model: String,
    temperature: f64,
    max_tokens: u32,
    timeout_secs: u64,
}

impl ChatCompletionsBackend {
    pub fn new(
        config: &LlmConfig,
        api_key: &str,
        model: &str,
        temperature: f64,
    ) -> Result<Self, LlmError> {
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()?;

        Ok(Self {
            http,
            endpoint: format!("{}/chat/completions", config.base_url.trim_end_matches('/')),
            api_key: api_key.to_string(),
            model: model.to_string(),
            temperature,
            max_tokens: config.max_tokens,
            timeout_secs: config.timeout_secs,
        })
    }

    pub fn model(&self) -> &str {
        &self.model
    }
}

#[async_trait]
impl LlmBackend for ChatCompletionsBackend {
    async fn generate(&self, prompt: &str) -> Result<String, LlmError> {
        let body = ChatRequest {
            model: &self.model,
            messages: [ChatMessage {
                role: "user",
                content: prompt,
            }],
            temperature: self.temperature,
            max_tokens: self.max_tokens,
        };

        let resp = self
            .http
            .post(&self.endpoint)
            .bearer_auth(&self.api_key)
            .json(&body)
            .send()
            .await
            .map_err(|e| self.classify(e))?;

        let status = resp.status();
        if !status.is_success() {
            let body = resp.text().await.unwrap_or_default();
            return Err(LlmError::Status {
                status: status.as_u16(),
                body: body.chars().take(300).collect(),
            });
        }

        let parsed: ChatResponse = resp.json().await.map_err(|e| self.classify(e))?;
        let text = parsed
            .choices
            .into_iter()
            .next()
            .and_then(|c| c.message.content)
            .map(|c| c.trim().to_string())
            .unwrap_or_default();

        if text.is_empty() {
            return Err(LlmError::EmptyResponse);
        }

        tracing::debug!(model = %self.model, chars = text.len(), "LLM response received");
        Ok(text)
    }

    fn backend_name(&self) -> &'static str {
        "chat-completions"
    }
}

impl ChatCompletionsBackend {
    fn classify(&self, e: reqwest::Error) -> LlmError {
        if e.is_timeout() {
            LlmError::Timeout(self.timeout_secs)
        } else {
            LlmError::Http(e)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_endpoint_trims_trailing_slash() {
        let config = LlmConfig {
            base_url: "https://api.example.test/v1/".to_string(),
            ..LlmConfig::default()
        };
        let backend =
            ChatCompletionsBackend::new(&config, "key", "llama", 0.3).expect("client builds");
        assert_eq!(backend.endpoint, "https://api.example.test/v1/chat/completions");
        assert_eq!(backend.model(), "llama");
    }

    #[test]
    fn test_response_without_choices_parses() {
        let parsed: ChatResponse = serde_json::from_str("{}").expect("parses");
        assert!(parsed.choices.is_empty());

        let parsed: ChatResponse =
            serde_json::from_str(r#"{"choices":[{"message":{"role":"assistant","content":" hi "}}]}"#)
                .expect("parses");
        assert_eq!(parsed.choices[0].message.content.as_deref(), Some(" hi "));
    }

    #[test]
    fn test_request_shape() {
        let body = ChatRequest {
            model: "m",
            messages: [ChatMessage {
                role: "user",
                content: "p",
            }],
            temperature: 0.1,
            max_tokens: 16,
        };
        let v = serde_json::to_value(&body).expect("serializes");
        assert_eq!(v["messages"][0]["role"], "user");
        assert_eq!(v["max_tokens"], 16);
    }
}
