mod anthropic;
mod claude;
mod output;
mod spawner;
mod traits;

pub use anthropic::{AnthropicGenerator, DEFAULT_ANTHROPIC_MODEL};
pub use claude::ClaudeCliGenerator;
pub use output::Generation;
pub use spawner::{ProcessOutput, ProcessSpawner};
pub use traits::{
    GenerationOptions, Generator, GeneratorError, GeneratorType, DEFAULT_MAX_TOKENS,
    DEFAULT_TEMPERATURE,
};

/// Create a generator by type.
///
/// The HTTP backend requires an API key.
pub fn create_generator(
    generator_type: GeneratorType,
    api_key: Option<String>,
) -> Result<Box<dyn Generator>, GeneratorError> {
    match generator_type {
        GeneratorType::ClaudeCli => Ok(Box::new(ClaudeCliGenerator::new())),
        GeneratorType::Anthropic => {
            let key = api_key.filter(|k| !k.is_empty()).ok_or_else(|| {
                GeneratorError::ConfigError("ANTHROPIC_API_KEY is not set".into())
            })?;
            Ok(Box::new(AnthropicGenerator::new(key)))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_create_generator_requires_key_for_http() {
        assert!(matches!(
            create_generator(GeneratorType::Anthropic, None),
            Err(GeneratorError::ConfigError(_))
        ));
        let generator = create_generator(GeneratorType::Anthropic, Some("k".into())).unwrap();
        assert_eq!(generator.generator_type(), GeneratorType::Anthropic);
    }

    #[test]
    fn test_generator_type_parsing() {
        assert_eq!("claude".parse::<GeneratorType>().unwrap(), GeneratorType::ClaudeCli);
        assert_eq!(GeneratorType::Anthropic.to_string(), "anthropic");
        assert!("gpt".parse::<GeneratorType>().is_err());
    }

    #[tokio::test]
    async fn test_missing_cli_binary_is_unavailable() {
        let generator =
            ClaudeCliGenerator::with_binary_path("/nonexistent/tracecritic-claude".into());
        assert!(!generator.is_available().await);
        let err = generator
            .generate("hi", &GenerationOptions::default())
            .await
            .unwrap_err();
        assert!(matches!(err, GeneratorError::SpawnFailed(_)));
    }
}
