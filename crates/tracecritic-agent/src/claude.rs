use async_trait::async_trait;
use std::path::{Path, PathBuf};
use tokio::process::Command;
use tracing::debug;

use crate::{
    Generation, GenerationOptions, Generator, GeneratorError, GeneratorType, ProcessSpawner,
};

/// Generator backed by the `claude` CLI in non-interactive print mode
pub struct ClaudeCliGenerator {
    binary_path: PathBuf,
}

impl ClaudeCliGenerator {
    pub fn new() -> Self {
        Self {
            binary_path: PathBuf::from("claude"),
        }
    }

    pub fn with_binary_path(path: PathBuf) -> Self {
        Self { binary_path: path }
    }

    pub fn binary_path(&self) -> &Path {
        &self.binary_path
    }
}

impl Default for ClaudeCliGenerator {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Generator for ClaudeCliGenerator {
    fn name(&self) -> &str {
        "Claude CLI"
    }

    fn generator_type(&self) -> GeneratorType {
        GeneratorType::ClaudeCli
    }

    async fn is_available(&self) -> bool {
        Command::new(&self.binary_path)
            .arg("--version")
            .output()
            .await
            .map(|o| o.status.success())
            .unwrap_or(false)
    }

    async fn generate(
        &self,
        prompt: &str,
        options: &GenerationOptions,
    ) -> Result<Generation, GeneratorError> {
        // The CLI exposes no sampling controls
        debug!(
            generator = self.name(),
            prompt_len = prompt.len(),
            temperature = options.temperature,
            "Generating via CLI"
        );

        let mut args = vec!["--print"];

        let model_arg;
        if let Some(ref model) = options.model {
            args.push("--model");
            model_arg = model.clone();
            args.push(&model_arg);
        }

        // End of options, so prompts starting with '-' stay positional
        args.push("--");
        args.push(prompt);

        let output = ProcessSpawner::spawn(&self.binary_path, &args, options.timeout).await?;

        if !output.success() {
            return Err(GeneratorError::ExecutionFailed(format!(
                "{} exited with code {}: {}",
                self.binary_path.display(),
                output.exit_code,
                output.stderr.trim()
            )));
        }

        let generation = Generation::new(output.stdout, output.duration);
        Ok(match options.model.clone() {
            Some(model) => generation.with_model(model),
            None => generation,
        })
    }
}
