use async_trait::async_trait;
use serde::Deserialize;
use std::time::Instant;
use tracing::debug;

use crate::{Generation, GenerationOptions, Generator, GeneratorError, GeneratorType};

pub const DEFAULT_ANTHROPIC_MODEL: &str = "claude-sonnet-4-20250514";

const MESSAGES_URL: &str = "https://api.anthropic.com/v1/messages";
const API_VERSION: &str = "2023-06-01";

/// Generator calling the Anthropic Messages API directly
pub struct AnthropicGenerator {
    api_key: String,
    endpoint: String,
    default_model: String,
    client: reqwest::Client,
}

impl AnthropicGenerator {
    pub fn new(api_key: String) -> Self {
        Self {
            api_key,
            endpoint: MESSAGES_URL.to_string(),
            default_model: DEFAULT_ANTHROPIC_MODEL.to_string(),
            client: reqwest::Client::new(),
        }
    }

    /// Point at a different Messages-compatible endpoint
    pub fn with_endpoint(mut self, endpoint: String) -> Self {
        self.endpoint = endpoint;
        self
    }

    pub fn with_default_model(mut self, model: String) -> Self {
        self.default_model = model;
        self
    }

    fn request_body(&self, prompt: &str, options: &GenerationOptions) -> serde_json::Value {
        serde_json::json!({
            "model": options.model.as_deref().unwrap_or(&self.default_model),
            "max_tokens": options.max_tokens,
            "temperature": options.temperature,
            "messages": [{
                "role": "user",
                "content": prompt,
            }]
        })
    }
}

#[derive(Debug, Deserialize)]
struct MessagesResponse {
    #[serde(default)]
    model: Option<String>,
    #[serde(default)]
    content: Vec<ContentBlock>,
}

#[derive(Debug, Deserialize)]
struct ContentBlock {
    #[serde(rename = "type")]
    kind: String,
    #[serde(default)]
    text: Option<String>,
}

impl MessagesResponse {
    fn text(&self) -> String {
        self.content
            .iter()
            .filter(|block| block.kind == "text")
            .filter_map(|block| block.text.as_deref())
            .collect::<Vec<_>>()
            .join("")
    }
}

#[async_trait]
impl Generator for AnthropicGenerator {
    fn name(&self) -> &str {
        "Anthropic API"
    }

    fn generator_type(&self) -> GeneratorType {
        GeneratorType::Anthropic
    }

    async fn is_available(&self) -> bool {
        !self.api_key.is_empty()
    }

    async fn generate(
        &self,
        prompt: &str,
        options: &GenerationOptions,
    ) -> Result<Generation, GeneratorError> {
        let start = Instant::now();
        debug!(
            generator = self.name(),
            prompt_len = prompt.len(),
            temperature = options.temperature,
            "Generating via HTTP"
        );

        let mut request = self
            .client
            .post(&self.endpoint)
            .header("x-api-key", &self.api_key)
            .header("anthropic-version", API_VERSION)
            .json(&self.request_body(prompt, options));
        if let Some(timeout) = options.timeout {
            request = request.timeout(timeout);
        }

        let resp = request.send().await.map_err(|e| match options.timeout {
            Some(limit) if e.is_timeout() => GeneratorError::Timeout(limit),
            _ => GeneratorError::Http(e),
        })?;

        if !resp.status().is_success() {
            let status = resp.status().as_u16();
            let body = resp.text().await.unwrap_or_default();
            return Err(GeneratorError::Api { status, body });
        }

        let body: MessagesResponse = resp.json().await?;
        let generation = Generation::new(body.text(), start.elapsed());

        Ok(match body.model {
            Some(model) => generation.with_model(model),
            None => generation,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_request_body_honors_options() {
        let generator = AnthropicGenerator::new("key".into());
        let options = GenerationOptions::default()
            .with_temperature(0.7)
            .with_model("claude-test".into());

        let body = generator.request_body("critique this", &options);
        assert_eq!(body["model"], "claude-test");
        assert_eq!(body["max_tokens"], 4096);
        assert!((body["temperature"].as_f64().unwrap() - 0.7).abs() < 1e-6);
        assert_eq!(body["messages"][0]["role"], "user");
        assert_eq!(body["messages"][0]["content"], "critique this");
    }

    #[test]
    fn test_request_body_default_model() {
        let generator = AnthropicGenerator::new("key".into());
        let body = generator.request_body("p", &GenerationOptions::default());
        assert_eq!(body["model"], DEFAULT_ANTHROPIC_MODEL);
    }

    #[test]
    fn test_response_text_joins_text_blocks() {
        let body: MessagesResponse = serde_json::from_str(
            r#"{"model":"m","content":[{"type":"text","text":"Hello "},{"type":"tool_use","id":"x"},{"type":"text","text":"world"}]}"#,
        )
        .unwrap();
        assert_eq!(body.text(), "Hello world");
    }
}
