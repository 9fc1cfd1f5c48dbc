//! Project configuration file support for tracecritic.
//!
//! Loads configuration from `tracecritic.toml` in the working directory and
//! merges it with command-line flags and the environment.

use anyhow::{Context, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::time::Duration;

use tracecritic_agent::{GenerationOptions, GeneratorType, DEFAULT_TEMPERATURE};
use tracecritic_core::DEFAULT_CONCURRENCY;
use tracecritic_trace::DEFAULT_DATA_DIR;

/// Project-level configuration loaded from `tracecritic.toml`
#[derive(Debug, Deserialize, Default)]
#[serde(deny_unknown_fields)]
pub struct ProjectConfig {
    /// Directory holding fetched traces
    pub data_dir: Option<PathBuf>,
    /// Maximum concurrent span critiques
    pub concurrency: Option<usize>,
    /// Produce a whole-trace summary on every run
    pub summarize: Option<bool>,
    #[serde(default)]
    pub generator: GeneratorConfig,
    /// Overrides for the aggregation and summary calls
    #[serde(default)]
    pub aggregator: AggregatorConfig,
    #[serde(default)]
    pub logfire: LogfireConfig,
}

#[derive(Debug, Deserialize, Default)]
#[serde(deny_unknown_fields)]
pub struct GeneratorConfig {
    /// `claude-cli` or `anthropic`
    pub backend: Option<String>,
    pub model: Option<String>,
    pub temperature: Option<f32>,
    /// Per-call timeout, e.g. "120s"
    #[serde(default, with = "humantime_serde")]
    pub timeout: Option<Duration>,
}

#[derive(Debug, Deserialize, Default)]
#[serde(deny_unknown_fields)]
pub struct AggregatorConfig {
    pub model: Option<String>,
    pub temperature: Option<f32>,
}

#[derive(Debug, Deserialize, Default)]
#[serde(deny_unknown_fields)]
pub struct LogfireConfig {
    pub base_url: Option<String>,
}

/// The config file name
pub const CONFIG_FILE_NAME: &str = "tracecritic.toml";

impl ProjectConfig {
    /// Load configuration from the working directory.
    ///
    /// Returns:
    /// - `Ok(Some(config))` if file exists and parses successfully
    /// - `Ok(None)` if file does not exist
    /// - `Err(...)` if file exists but fails to parse (hard error)
    pub fn load(working_dir: &Path) -> Result<Option<Self>> {
        let config_path = working_dir.join(CONFIG_FILE_NAME);

        if !config_path.exists() {
            return Ok(None);
        }

        let content = std::fs::read_to_string(&config_path)
            .with_context(|| format!("Failed to read {}", config_path.display()))?;

        let config: ProjectConfig = toml::from_str(&content)
            .with_context(|| format!("Failed to parse {}", config_path.display()))?;

        if config.concurrency == Some(0) {
            anyhow::bail!(
                "Invalid {}: concurrency must be at least 1",
                config_path.display()
            );
        }

        Ok(Some(config))
    }

    /// Get the effective generator backend, if configured.
    pub fn generator_type(&self) -> Result<Option<GeneratorType>> {
        self.generator
            .backend
            .as_deref()
            .map(|backend| backend.parse::<GeneratorType>().map_err(anyhow::Error::msg))
            .transpose()
    }
}

/// Values given on the command line
#[derive(Debug, Default)]
pub struct Overrides {
    pub data_dir: Option<PathBuf>,
    pub concurrency: Option<usize>,
    pub summarize: bool,
    pub generator: Option<GeneratorType>,
    pub model: Option<String>,
}

/// Effective settings for one invocation.
///
/// Priority: command line > config file > environment > built-in default
#[derive(Debug)]
pub struct Settings {
    pub data_dir: PathBuf,
    pub concurrency: usize,
    pub summarize: bool,
    pub generator: GeneratorType,
    pub critique_options: GenerationOptions,
    pub aggregate_options: GenerationOptions,
    pub logfire_base_url: Option<String>,
}

impl Settings {
    pub fn resolve(
        config: &ProjectConfig,
        overrides: &Overrides,
        env_base_url: Option<String>,
    ) -> Result<Self> {
        let generator = match overrides.generator {
            Some(generator) => generator,
            None => config.generator_type()?.unwrap_or(GeneratorType::ClaudeCli),
        };

        let temperature = config.generator.temperature.unwrap_or(DEFAULT_TEMPERATURE);
        let model = overrides
            .model
            .clone()
            .or_else(|| config.generator.model.clone());

        let mut critique_options = GenerationOptions::default().with_temperature(temperature);
        if let Some(model) = model.clone() {
            critique_options = critique_options.with_model(model);
        }
        if let Some(timeout) = config.generator.timeout {
            critique_options = critique_options.with_timeout(timeout);
        }

        let mut aggregate_options = critique_options
            .clone()
            .with_temperature(config.aggregator.temperature.unwrap_or(temperature));
        // A model given on the command line applies to every call
        if overrides.model.is_none() {
            if let Some(model) = config.aggregator.model.clone() {
                aggregate_options = aggregate_options.with_model(model);
            }
        }

        Ok(Self {
            data_dir: overrides
                .data_dir
                .clone()
                .or_else(|| config.data_dir.clone())
                .unwrap_or_else(|| PathBuf::from(DEFAULT_DATA_DIR)),
            concurrency: overrides
                .concurrency
                .or(config.concurrency)
                .unwrap_or(DEFAULT_CONCURRENCY),
            summarize: overrides.summarize || config.summarize.unwrap_or(false),
            generator,
            critique_options,
            aggregate_options,
            logfire_base_url: config
                .logfire
                .base_url
                .clone()
                .or(env_base_url.filter(|url| !url.is_empty())),
        })
    }
}
