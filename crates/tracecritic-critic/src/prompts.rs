use std::borrow::Cow;

use tracing::warn;

/// Upper bound on raw payload / trace text embedded in a prompt
const MAX_RAW_TEXT: usize = 60_000;

/// Prompt templates for critique and aggregation
pub struct CritiquePrompts;

impl CritiquePrompts {
    /// Critique of one assistant turn given everything before it
    pub fn build_span_critique_prompt(context: &str, target: &str) -> String {
        let context = if context.trim().is_empty() {
            "(no prior conversation)"
        } else {
            context
        };

        format!(
            r#"You are reviewing one step of an AI agent's execution trace.

## Conversation So Far
{context}

## Interaction To Critique
{target}

---

{instructions}"#,
            context = context,
            target = target,
            instructions = CRITIQUE_INSTRUCTIONS,
        )
    }

    /// Critique of a backend-native span whose conversation could not be split
    pub fn build_raw_span_prompt(payload: &str) -> String {
        format!(
            r#"You are reviewing one span of an AI agent's execution trace. The span is given as the raw record exported by the tracing backend.

## Span
```json
{payload}
```

---

{instructions}"#,
            payload = truncate_text(payload, MAX_RAW_TEXT),
            instructions = CRITIQUE_INSTRUCTIONS,
        )
    }

    /// Fold per-span critiques into one structured summary
    pub fn build_aggregate_prompt(critiques: &[String]) -> String {
        let listing = critiques
            .iter()
            .enumerate()
            .map(|(index, critique)| format!("### Critique {}\n{}", index + 1, critique))
            .collect::<Vec<_>>()
            .join("\n\n");

        format!(
            r#"Below are critiques of the individual steps of one AI agent run, in execution order.

{listing}

---

## Instructions

Write a consolidated critique of the whole run:
- Extract the themes that recur across steps and state them once.
- Keep actionable specifics: name the step, the tool call or the claim each point refers to.
- Entries marked "critique unavailable" could not be reviewed; mention them without guessing their content.
- Present the result as a structured summary with Markdown headers and bullet points.
- Write in English."#,
            listing = listing,
        )
    }

    /// Task / Approach / Output summary of a full trace
    pub fn build_trace_summary_prompt(trace_text: &str) -> String {
        format!(
            r#"Below is the complete execution trace of an AI agent run.

```json
{trace}
```

---

## Instructions

Summarize the run in three parts:

### Task
What the user asked the agent to do.

### Approach
How the agent went about it: the steps it took and the tools it called, in order.

### Output
What the agent finally delivered, and whether it answered the task.

Stay under 500 words unless the run is complex enough to require more. Write in English."#,
            trace = truncate_text(trace_text, MAX_RAW_TEXT),
        )
    }
}

const CRITIQUE_INSTRUCTIONS: &str = r#"## Instructions

Critique the interaction above for correctness.

- Respond in English only and be concise.
- Reference the specific parts of the conversation your points are about.
- If the interaction calls a tool, judge whether the arguments are correct and sufficient for what the user asked.
- Flag hallucinated facts, misuse of tools, and information the agent ignored or omitted.
- Judge whether the response is clear to the user.
- Do not comment on anything else: no remarks on duration, token usage or business impact."#;

/// Truncate at a line boundary, never splitting a UTF-8 character. A cut
/// is marked with a trailing `[... truncated N bytes]` line.
fn truncate_text(text: &str, max_len: usize) -> Cow<'_, str> {
    if text.len() <= max_len {
        return Cow::Borrowed(text);
    }

    let mut end = max_len;
    while !text.is_char_boundary(end) {
        end -= 1;
    }

    let kept = match text[..end].rfind('\n') {
        Some(pos) => &text[..pos],
        None => &text[..end],
    };
    let dropped = text.len() - kept.len();
    warn!(
        original_len = text.len(),
        dropped, "Prompt text exceeds the embedding limit, truncating"
    );

    Cow::Owned(format!("{}\n[... truncated {} bytes]", kept, dropped))
}
