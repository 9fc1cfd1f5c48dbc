use serde_json::Value;

use tracecritic_trace::{Span, SpanRecord, Trace, TraceError};

/// What a record position resolves to
#[derive(Debug)]
pub enum SpanTarget<'a> {
    Interaction(Span<'a>),
    Raw(&'a Value),
}

/// The decomposed view of a stored trace.
///
/// Positions are 1-based indexes into the stored records. Normalized
/// interactions are additionally kept as a contiguous [`Trace`] so spans can
/// be split from it.
#[derive(Debug, Clone)]
pub struct SpanPlan {
    records: Vec<SpanRecord>,
    trace: Trace,
    /// For each record, its 1-based position among the interactions
    interaction_positions: Vec<Option<usize>>,
}

impl SpanPlan {
    pub fn new(trace_id: impl Into<String>, records: Vec<SpanRecord>) -> Self {
        let mut interactions = Vec::new();
        let mut interaction_positions = Vec::with_capacity(records.len());

        for record in &records {
            match record {
                SpanRecord::Interaction(interaction) => {
                    interactions.push(interaction.clone());
                    interaction_positions.push(Some(interactions.len()));
                }
                SpanRecord::Raw(_) | SpanRecord::Invalid { .. } => {
                    interaction_positions.push(None)
                }
            }
        }

        Self {
            records,
            trace: Trace::new(trace_id, interactions),
            interaction_positions,
        }
    }

    pub fn records(&self) -> &[SpanRecord] {
        &self.records
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn trace(&self) -> &Trace {
        &self.trace
    }

    /// Every position worth critiquing, in record order: assistant
    /// interactions, raw backend spans and records that failed to parse
    pub fn default_positions(&self) -> Vec<usize> {
        self.records
            .iter()
            .enumerate()
            .filter(|(_, record)| match record {
                SpanRecord::Interaction(interaction) => interaction.is_assistant(),
                SpanRecord::Raw(_) | SpanRecord::Invalid { .. } => true,
            })
            .map(|(index, _)| index + 1)
            .collect()
    }

    pub fn span_id(&self, position: usize) -> Option<String> {
        position
            .checked_sub(1)
            .and_then(|index| self.records.get(index))
            .and_then(SpanRecord::span_id)
            .map(str::to_string)
    }

    pub fn target(&self, position: usize) -> Result<SpanTarget<'_>, TraceError> {
        let index = position.checked_sub(1).filter(|i| *i < self.records.len());
        let Some(index) = index else {
            return Err(TraceError::OutOfRange {
                position,
                len: self.records.len(),
            });
        };

        match (&self.records[index], self.interaction_positions[index]) {
            (SpanRecord::Interaction(_), Some(interaction_position)) => {
                self.trace
                    .span(interaction_position)
                    .map(SpanTarget::Interaction)
                    .map_err(|err| match err {
                        // Report the record position the caller asked for
                        TraceError::InvalidRole { role, .. } => {
                            TraceError::InvalidRole { position, role }
                        }
                        other => other,
                    })
            }
            (SpanRecord::Raw(payload), _) => Ok(SpanTarget::Raw(payload)),
            (SpanRecord::Invalid { error, .. }, _) => Err(TraceError::Validation(format!(
                "record {} is not a valid interaction: {}",
                position, error
            ))),
            (SpanRecord::Interaction(_), None) => Err(TraceError::Validation(format!(
                "record {} has no interaction index",
                position
            ))),
        }
    }
}
