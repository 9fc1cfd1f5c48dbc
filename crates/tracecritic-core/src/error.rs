use thiserror::Error;

use tracecritic_critic::CritiqueError;
use tracecritic_logfire::QueryError;
use tracecritic_logging::PipelineStage;
use tracecritic_trace::TraceError;

/// Failures that abort a run. Per-span failures never surface here.
#[derive(Error, Debug)]
pub enum PipelineError {
    #[error("No trace backend configured to fetch trace {trace_id}")]
    NoBackend { trace_id: String },

    #[error("Fetching trace {trace_id} failed: {source}")]
    Fetch {
        trace_id: String,
        source: QueryError,
    },

    #[error("Trace {trace_id} has no records in the lookback window")]
    EmptyTrace { trace_id: String },

    #[error("Storing trace {trace_id} failed: {source}")]
    Store {
        trace_id: String,
        source: TraceError,
    },

    #[error("Decomposing trace {trace_id} failed: {source}")]
    Decompose {
        trace_id: String,
        source: TraceError,
    },

    #[error("Aggregating trace {trace_id} failed: {source}")]
    Aggregate {
        trace_id: String,
        source: CritiqueError,
    },
}

impl PipelineError {
    pub fn kind(&self) -> &'static str {
        match self {
            PipelineError::NoBackend { .. } => "ConfigError",
            PipelineError::Fetch { source, .. } => source.kind(),
            PipelineError::EmptyTrace { .. } => "NotFoundError",
            PipelineError::Store { source, .. } | PipelineError::Decompose { source, .. } => {
                source.kind()
            }
            PipelineError::Aggregate { source, .. } => source.kind(),
        }
    }

    /// Stage the run was in when it aborted
    pub fn stage(&self) -> PipelineStage {
        match self {
            PipelineError::NoBackend { .. }
            | PipelineError::Fetch { .. }
            | PipelineError::EmptyTrace { .. }
            | PipelineError::Store { .. } => PipelineStage::Fetch,
            PipelineError::Decompose { .. } => PipelineStage::Decompose,
            PipelineError::Aggregate { .. } => PipelineStage::Aggregate,
        }
    }

    pub fn trace_id(&self) -> &str {
        match self {
            PipelineError::NoBackend { trace_id }
            | PipelineError::Fetch { trace_id, .. }
            | PipelineError::EmptyTrace { trace_id }
            | PipelineError::Store { trace_id, .. }
            | PipelineError::Decompose { trace_id, .. }
            | PipelineError::Aggregate { trace_id, .. } => trace_id,
        }
    }
}
