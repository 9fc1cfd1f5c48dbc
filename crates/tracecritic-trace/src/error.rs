use thiserror::Error;

use crate::Role;

#[derive(Error, Debug)]
pub enum TraceError {
    #[error("Invalid input: {0}")]
    Validation(String),

    #[error("Span position {position} is outside trace bounds [1, {len}]")]
    OutOfRange { position: usize, len: usize },

    #[error("Interaction at position {position} has role '{role}', expected 'assistant'")]
    InvalidRole { position: usize, role: Role },

    #[error("No data found for trace '{trace_id}'")]
    TraceNotFound { trace_id: String },

    #[error("No span '{span_id}' found in trace '{trace_id}'")]
    SpanNotFound { trace_id: String, span_id: String },

    #[error("Trace storage I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Malformed trace data: {0}")]
    Json(#[from] serde_json::Error),
}

impl TraceError {
    /// Taxonomy name surfaced to users and in per-span placeholders
    pub fn kind(&self) -> &'static str {
        match self {
            TraceError::Validation(_) | TraceError::Json(_) => "ValidationError",
            TraceError::OutOfRange { .. } => "OutOfRangeError",
            TraceError::InvalidRole { .. } => "InvalidRoleError",
            TraceError::TraceNotFound { .. } | TraceError::SpanNotFound { .. } => "NotFoundError",
            TraceError::Io(_) => "IoError",
        }
    }
}
