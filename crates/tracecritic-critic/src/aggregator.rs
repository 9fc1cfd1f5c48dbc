use serde::Serialize;
use tracing::{debug, info};

use tracecritic_agent::{GenerationOptions, Generator};

use crate::{CritiqueError, CritiquePrompts};

/// Folds span critiques, or a whole trace, into a single document
pub struct Aggregator<'a> {
    generator: &'a dyn Generator,
    options: GenerationOptions,
}

impl<'a> Aggregator<'a> {
    pub fn new(generator: &'a dyn Generator) -> Self {
        Self {
            generator,
            options: GenerationOptions::default(),
        }
    }

    pub fn with_options(mut self, options: GenerationOptions) -> Self {
        self.options = options;
        self
    }

    /// Consolidate ordered per-span critiques. The generated text is
    /// returned untrimmed.
    pub async fn aggregate_critiques(&self, critiques: &[String]) -> Result<String, CritiqueError> {
        let prompt = CritiquePrompts::build_aggregate_prompt(critiques);
        debug!(
            critiques = critiques.len(),
            prompt_len = prompt.len(),
            "Aggregating critiques"
        );

        let generation = self.generator.generate(&prompt, &self.options).await?;
        info!(
            duration_secs = generation.duration.as_secs_f64(),
            "Aggregation completed"
        );
        Ok(generation.text)
    }

    /// Task / Approach / Output summary of the full trace
    pub async fn summarize_trace<T: Serialize + Sync>(
        &self,
        records: &[T],
    ) -> Result<String, CritiqueError> {
        let trace_text = serde_json::to_string_pretty(records).unwrap_or_default();
        let prompt = CritiquePrompts::build_trace_summary_prompt(&trace_text);
        debug!(
            records = records.len(),
            prompt_len = prompt.len(),
            "Summarizing trace"
        );

        let generation = self.generator.generate(&prompt, &self.options).await?;
        info!(
            duration_secs = generation.duration.as_secs_f64(),
            "Trace summary completed"
        );
        Ok(generation.text)
    }
}
