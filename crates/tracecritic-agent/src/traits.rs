use async_trait::async_trait;
use std::time::Duration;
use thiserror::Error;

use crate::Generation;

/// Default sampling temperature for critique and aggregation calls
pub const DEFAULT_TEMPERATURE: f32 = 0.2;

/// Default upper bound on generated tokens
pub const DEFAULT_MAX_TOKENS: u32 = 4096;

/// Errors that can occur during text generation
#[derive(Error, Debug)]
pub enum GeneratorError {
    #[error("Failed to spawn generator process: {0}")]
    SpawnFailed(#[from] std::io::Error),

    #[error("Generation timed out after {0:?}")]
    Timeout(Duration),

    #[error("Generator configuration error: {0}")]
    ConfigError(String),

    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Generator API error {status}: {body}")]
    Api { status: u16, body: String },

    #[error("Generation failed: {0}")]
    ExecutionFailed(String),
}

/// Per-call generation options
#[derive(Debug, Clone, PartialEq)]
pub struct GenerationOptions {
    pub temperature: f32,
    /// Model to use (None = backend default)
    pub model: Option<String>,
    pub max_tokens: u32,
    /// Optional timeout (None = no limit)
    pub timeout: Option<Duration>,
}

impl Default for GenerationOptions {
    fn default() -> Self {
        Self {
            temperature: DEFAULT_TEMPERATURE,
            model: None,
            max_tokens: DEFAULT_MAX_TOKENS,
            timeout: None,
        }
    }
}

impl GenerationOptions {
    pub fn with_temperature(mut self, temperature: f32) -> Self {
        self.temperature = temperature;
        self
    }

    pub fn with_model(mut self, model: String) -> Self {
        self.model = Some(model);
        self
    }

    pub fn with_max_tokens(mut self, max_tokens: u32) -> Self {
        self.max_tokens = max_tokens;
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }
}

/// Supported generator backends
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum GeneratorType {
    ClaudeCli,
    Anthropic,
}

impl std::fmt::Display for GeneratorType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            GeneratorType::ClaudeCli => write!(f, "claude-cli"),
            GeneratorType::Anthropic => write!(f, "anthropic"),
        }
    }
}

impl std::str::FromStr for GeneratorType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "claude" | "claude-cli" | "claude-code" => Ok(GeneratorType::ClaudeCli),
            "anthropic" | "api" => Ok(GeneratorType::Anthropic),
            _ => Err(format!("Unknown generator type: {}", s)),
        }
    }
}

/// Opaque text-generation capability
#[async_trait]
pub trait Generator: Send + Sync {
    /// Human-readable name of the backend
    fn name(&self) -> &str;

    fn generator_type(&self) -> GeneratorType;

    /// Send `prompt` as a single user message and return the generated text
    async fn generate(
        &self,
        prompt: &str,
        options: &GenerationOptions,
    ) -> Result<Generation, GeneratorError>;

    /// Check if the backend can be reached
    async fn is_available(&self) -> bool;
}
