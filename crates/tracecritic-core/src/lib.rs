//! # tracecritic-core
//!
//! Orchestrates a critique run: fetch a trace, split it into spans, critique
//! the spans concurrently and fold the critiques into a [`TraceReport`].

mod context;
mod error;
mod plan;
mod report;
mod runner;

pub use context::{RunContext, DEFAULT_CONCURRENCY};
pub use error::PipelineError;
pub use plan::{SpanPlan, SpanTarget};
pub use report::{CritiqueOutcome, SpanCritique, TraceReport, NO_SPANS_SUMMARY};
pub use runner::PipelineRunner;
pub use tracecritic_critic::NO_HISTORY_SENTINEL;
pub use tracecritic_logging::PipelineStage;
