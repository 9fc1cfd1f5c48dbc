use serde_json::Value;
use tracing::{debug, info};

use tracecritic_agent::{GenerationOptions, Generator, GeneratorError};
use tracecritic_trace::{format_interaction, format_many, normalize_payload, Interaction, Span};

use crate::CritiquePrompts;

/// Returned by [`CritiqueEngine::critique_raw`] when a payload carries no
/// recognizable conversation.
pub const NO_HISTORY_SENTINEL: &str = "No conversation history found.";

#[derive(Debug, thiserror::Error)]
pub enum CritiqueError {
    #[error("Generation failed: {0}")]
    Generation(#[from] GeneratorError),
}

impl CritiqueError {
    pub fn kind(&self) -> &'static str {
        match self {
            CritiqueError::Generation(_) => "GenerationError",
        }
    }
}

/// Outcome of critiquing a backend-native span
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RawCritique {
    Critique(String),
    NoHistory,
}

/// Produces a natural-language critique of one assistant interaction
pub struct CritiqueEngine<'a> {
    generator: &'a dyn Generator,
    options: GenerationOptions,
}

impl<'a> CritiqueEngine<'a> {
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

    pub fn options(&self) -> &GenerationOptions {
        &self.options
    }

    /// Critique `target` given the interactions that preceded it
    pub async fn critique(
        &self,
        context: &[Interaction],
        target: &Interaction,
    ) -> Result<String, CritiqueError> {
        let prompt = CritiquePrompts::build_span_critique_prompt(
            &format_many(context),
            &format_interaction(target),
        );

        debug!(
            prompt_len = prompt.len(),
            context_len = context.len(),
            "Running span critique"
        );
        self.run(&prompt).await
    }

    pub async fn critique_span(&self, span: &Span<'_>) -> Result<String, CritiqueError> {
        self.critique(span.context, span.target).await
    }

    /// Critique a backend-native span payload.
    ///
    /// The payload is normalized first. When its history ends in an assistant
    /// turn it is critiqued like any other span; otherwise the serialized
    /// payload itself is embedded in the prompt. Payloads without history
    /// short-circuit to [`RawCritique::NoHistory`] with no generation call.
    pub async fn critique_payload(&self, payload: &Value) -> Result<RawCritique, CritiqueError> {
        let Some(history) = normalize_payload(payload) else {
            debug!("Raw span has no conversation history");
            return Ok(RawCritique::NoHistory);
        };

        let text = match history.split_last() {
            Some((target, context)) if target.is_assistant() => {
                self.critique(context, target).await?
            }
            _ => {
                let serialized =
                    serde_json::to_string_pretty(payload).unwrap_or_else(|_| payload.to_string());
                let prompt = CritiquePrompts::build_raw_span_prompt(&serialized);
                debug!(prompt_len = prompt.len(), "Running raw span critique");
                self.run(&prompt).await?
            }
        };
        Ok(RawCritique::Critique(text))
    }

    /// Text form of [`critique_payload`](Self::critique_payload), with
    /// [`NO_HISTORY_SENTINEL`] standing in for a payload without history
    pub async fn critique_raw(&self, payload: &Value) -> Result<String, CritiqueError> {
        Ok(match self.critique_payload(payload).await? {
            RawCritique::Critique(text) => text,
            RawCritique::NoHistory => NO_HISTORY_SENTINEL.to_string(),
        })
    }

    async fn run(&self, prompt: &str) -> Result<String, CritiqueError> {
        let generation = self.generator.generate(prompt, &self.options).await?;

        info!(
            generator = self.generator.name(),
            duration_secs = generation.duration.as_secs_f64(),
            "Critique completed"
        );

        Ok(generation.text.trim().to_string())
    }
}
