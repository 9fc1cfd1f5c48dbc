use tracing::debug;

use crate::{format_interaction, format_many, Interaction, TraceError};

/// An ordered sequence of interactions belonging to one agent run
#[derive(Debug, Clone, PartialEq)]
pub struct Trace {
    trace_id: String,
    interactions: Vec<Interaction>,
}

impl Trace {
    pub fn new(trace_id: impl Into<String>, interactions: Vec<Interaction>) -> Self {
        Self {
            trace_id: trace_id.into(),
            interactions,
        }
    }

    pub fn trace_id(&self) -> &str {
        &self.trace_id
    }

    pub fn interactions(&self) -> &[Interaction] {
        &self.interactions
    }

    pub fn len(&self) -> usize {
        self.interactions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.interactions.is_empty()
    }

    /// 1-based positions of every assistant interaction, in trace order
    pub fn assistant_positions(&self) -> Vec<usize> {
        self.interactions
            .iter()
            .enumerate()
            .filter(|(_, interaction)| interaction.is_assistant())
            .map(|(index, _)| index + 1)
            .collect()
    }

    pub fn span(&self, position: usize) -> Result<Span<'_>, TraceError> {
        extract(&self.interactions, position)
    }
}

/// One assistant interaction together with everything that preceded it
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Span<'a> {
    /// 1-based position of the target within the trace
    pub position: usize,
    pub context: &'a [Interaction],
    pub target: &'a Interaction,
}

impl Span<'_> {
    pub fn formatted_context(&self) -> String {
        format_many(self.context)
    }

    pub fn formatted_target(&self) -> String {
        format_interaction(self.target)
    }
}

/// Split a trace at a 1-based position.
///
/// The target is `trace[position - 1]`, which must be an assistant turn. The
/// context is every interaction strictly before it; nothing after the target
/// is ever included.
pub fn extract(trace: &[Interaction], position: usize) -> Result<Span<'_>, TraceError> {
    if position == 0 || position > trace.len() {
        return Err(TraceError::OutOfRange {
            position,
            len: trace.len(),
        });
    }

    let target = &trace[position - 1];
    if !target.is_assistant() {
        return Err(TraceError::InvalidRole {
            position,
            role: target.role,
        });
    }

    debug!(position, context_len = position - 1, "Extracted span");

    Ok(Span {
        position,
        context: &trace[..position - 1],
        target,
    })
}
