use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use serde::Serialize;
use tracing::debug;

use crate::{normalize_payload, Interaction, SpanRecord, TraceError};

/// Default directory for stored traces, relative to the working directory
pub const DEFAULT_DATA_DIR: &str = "data";

/// Flat keyed storage of trace records, one `<trace_id>.json` file per trace.
///
/// Writes are last-write-wins. Concurrent runs against the same trace id
/// must be serialized by the caller.
#[derive(Debug, Clone)]
pub struct TraceStore {
    data_dir: PathBuf,
}

impl Default for TraceStore {
    fn default() -> Self {
        Self::with_dir(PathBuf::from(DEFAULT_DATA_DIR))
    }
}

impl TraceStore {
    pub fn with_dir(data_dir: PathBuf) -> Self {
        Self { data_dir }
    }

    pub fn data_dir(&self) -> &Path {
        &self.data_dir
    }

    /// Path of the file backing `trace_id`
    pub fn path_for(&self, trace_id: &str) -> Result<PathBuf, TraceError> {
        validate_trace_id(trace_id)?;
        Ok(self.data_dir.join(format!("{}.json", trace_id)))
    }

    pub fn exists(&self, trace_id: &str) -> bool {
        self.path_for(trace_id)
            .map(|path| path.is_file())
            .unwrap_or(false)
    }

    /// Write `records` under `trace_id`, replacing any previous content
    pub fn save<T: Serialize>(&self, trace_id: &str, records: &[T]) -> Result<PathBuf, TraceError> {
        let path = self.path_for(trace_id)?;
        fs::create_dir_all(&self.data_dir)?;

        let json = serde_json::to_string(records)?;
        fs::write(&path, json)?;

        debug!(trace_id, records = records.len(), path = %path.display(), "Saved trace");
        Ok(path)
    }

    /// Load a trace whose records are all normalized interactions
    pub fn load(&self, trace_id: &str) -> Result<Vec<Interaction>, TraceError> {
        let content = self.read(trace_id)?;
        serde_json::from_str(&content).map_err(|e| {
            TraceError::Validation(format!(
                "trace '{}' is not a list of interactions: {}",
                trace_id, e
            ))
        })
    }

    /// Load a trace that may mix normalized interactions and raw backend spans
    pub fn load_records(&self, trace_id: &str) -> Result<Vec<SpanRecord>, TraceError> {
        let content = self.read(trace_id)?;
        Ok(serde_json::from_str(&content)?)
    }

    /// Find the record whose span identifier equals `span_id`.
    ///
    /// Raw backend spans are normalized and the last turn of their history
    /// is returned, carrying `span_id` as its identifier.
    pub fn load_one(&self, trace_id: &str, span_id: &str) -> Result<Interaction, TraceError> {
        let record = self
            .load_records(trace_id)?
            .into_iter()
            .find(|candidate| candidate.span_id() == Some(span_id))
            .ok_or_else(|| TraceError::SpanNotFound {
                trace_id: trace_id.to_string(),
                span_id: span_id.to_string(),
            })?;

        match record {
            SpanRecord::Interaction(interaction) => Ok(interaction),
            SpanRecord::Raw(payload) => normalize_payload(&payload)
                .and_then(|mut history| history.pop())
                .map(|interaction| interaction.with_id(span_id))
                .ok_or_else(|| {
                    TraceError::Validation(format!(
                        "span '{}' in trace '{}' carries no conversation history",
                        span_id, trace_id
                    ))
                }),
            SpanRecord::Invalid { error, .. } => Err(TraceError::Validation(format!(
                "span '{}' in trace '{}' is malformed: {}",
                span_id, trace_id, error
            ))),
        }
    }

    fn read(&self, trace_id: &str) -> Result<String, TraceError> {
        let path = self.path_for(trace_id)?;
        fs::read_to_string(&path).map_err(|e| match e.kind() {
            io::ErrorKind::NotFound => TraceError::TraceNotFound {
                trace_id: trace_id.to_string(),
            },
            _ => TraceError::Io(e),
        })
    }
}

/// Trace ids become file names, so they must not escape the data directory
fn validate_trace_id(trace_id: &str) -> Result<(), TraceError> {
    if trace_id.is_empty() {
        return Err(TraceError::Validation("trace id must not be empty".into()));
    }
    if trace_id == "." || trace_id == ".." || trace_id.contains(['/', '\\']) {
        return Err(TraceError::Validation(format!(
            "trace id '{}' contains path characters",
            trace_id
        )));
    }
    Ok(())
}
