use serde::{Deserialize, Serialize};

use tracecritic_critic::NO_HISTORY_SENTINEL;

/// Critique summary used when there is nothing to aggregate
pub const NO_SPANS_SUMMARY: &str = "No assistant interactions to critique.";

/// Result of critiquing one span
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum CritiqueOutcome {
    Critique { text: String },
    /// Raw span without a recognizable conversation
    NoHistory,
    /// The span could not be critiqued; `kind` is the error taxonomy name
    Unavailable { kind: String, reason: String },
}

impl CritiqueOutcome {
    /// Text handed to the aggregator. Spans without history are left out.
    pub fn aggregate_text(&self) -> Option<String> {
        match self {
            CritiqueOutcome::Critique { text } => Some(text.clone()),
            CritiqueOutcome::NoHistory => None,
            CritiqueOutcome::Unavailable { kind, .. } => Some(placeholder(kind)),
        }
    }

    pub fn is_unavailable(&self) -> bool {
        matches!(self, CritiqueOutcome::Unavailable { .. })
    }
}

fn placeholder(kind: &str) -> String {
    format!("critique unavailable: {}", kind)
}

/// One walkthrough entry
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SpanCritique {
    /// 1-based record position
    pub position: usize,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub span_id: Option<String>,
    pub outcome: CritiqueOutcome,
}

/// Final document of a run
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TraceReport {
    pub trace_id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub trace_summary: Option<String>,
    pub critique_summary: String,
    pub entries: Vec<SpanCritique>,
}

impl TraceReport {
    /// Ordered aggregator inputs for `entries`
    pub fn aggregate_inputs(entries: &[SpanCritique]) -> Vec<String> {
        entries
            .iter()
            .filter_map(|entry| entry.outcome.aggregate_text())
            .collect()
    }

    pub fn failed_count(&self) -> usize {
        self.entries
            .iter()
            .filter(|entry| entry.outcome.is_unavailable())
            .count()
    }

    pub fn render_markdown(&self) -> String {
        let mut out = format!("# Trace report: {}\n\n", self.trace_id);

        if let Some(summary) = &self.trace_summary {
            out.push_str("## Trace Summary\n\n");
            out.push_str(summary.trim());
            out.push_str("\n\n");
        }

        out.push_str("## Critique Summary\n\n");
        out.push_str(self.critique_summary.trim());
        out.push_str("\n\n## Annotated Walkthrough\n");

        if self.entries.is_empty() {
            out.push_str("\nNo spans were critiqued.\n");
        }

        for entry in &self.entries {
            match &entry.span_id {
                Some(span_id) => {
                    out.push_str(&format!("\n### Span {} ({})\n\n", entry.position, span_id))
                }
                None => out.push_str(&format!("\n### Span {}\n\n", entry.position)),
            }
            match &entry.outcome {
                CritiqueOutcome::Critique { text } => out.push_str(text),
                CritiqueOutcome::NoHistory => out.push_str(NO_HISTORY_SENTINEL),
                CritiqueOutcome::Unavailable { kind, reason } => {
                    out.push_str(&format!("_{}_\n\n> {}", placeholder(kind), reason))
                }
            }
            out.push('\n');
        }

        out
    }
}
