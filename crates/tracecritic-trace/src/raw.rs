//! Normalization of backend-native span payloads.
//!
//! LLM spans exported by instrumentation libraries carry the conversation in
//! vendor-specific attribute keys. This adapter looks for the known keys and
//! turns whatever it finds into [`Interaction`]s.

use serde_json::Value;
use tracing::debug;

use crate::{Interaction, Role, ToolCall};

/// Attribute keys that hold a list of conversation messages, in lookup order
const HISTORY_KEYS: &[&str] = &[
    "all_messages_events",
    "gen_ai.input.messages",
    "messages",
    "events",
];

const OUTPUT_KEY: &str = "gen_ai.output.messages";

/// Extract the conversation history embedded in a raw span payload.
///
/// Returns `None` when no recognizable history is present.
pub fn normalize_payload(payload: &Value) -> Option<Vec<Interaction>> {
    let attributes = payload.get("attributes").map(decode_embedded);

    let containers = std::iter::once(payload).chain(attributes.as_ref());
    for container in containers {
        for key in HISTORY_KEYS {
            let Some(messages) = container.get(*key).map(decode_embedded) else {
                continue;
            };
            let mut interactions = normalize_messages(&messages);
            if let Some(output) = container.get(OUTPUT_KEY).map(decode_embedded) {
                interactions.extend(normalize_messages(&output));
            }
            if !interactions.is_empty() {
                debug!(key, count = interactions.len(), "Normalized raw span history");
                return Some(interactions);
            }
        }
    }

    None
}

/// Attribute values are sometimes stored as JSON-encoded strings
fn decode_embedded(value: &Value) -> Value {
    match value {
        Value::String(s) => serde_json::from_str(s).unwrap_or_else(|_| value.clone()),
        other => other.clone(),
    }
}

fn normalize_messages(messages: &Value) -> Vec<Interaction> {
    messages
        .as_array()
        .map(|items| items.iter().filter_map(normalize_message).collect())
        .unwrap_or_default()
}

fn normalize_message(message: &Value) -> Option<Interaction> {
    let nested = message.get("message");
    let role = message_role(message).or_else(|| nested.and_then(message_role))?;

    let content = message_content(message).or_else(|| nested.and_then(message_content));
    let tool_calls = message_tool_calls(message)
        .or_else(|| nested.and_then(message_tool_calls))
        .unwrap_or_default();

    if content.is_none() && tool_calls.is_empty() {
        return None;
    }

    Some(Interaction {
        id: None,
        role,
        name: message.get("name").and_then(Value::as_str).map(String::from),
        content,
        tool_calls,
    })
}

fn message_role(message: &Value) -> Option<Role> {
    if let Some(role) = message.get("role").and_then(Value::as_str) {
        return role.parse().ok();
    }

    // OpenTelemetry GenAI event names: gen_ai.user.message, gen_ai.choice, ...
    let event_name = message
        .get("event.name")
        .or_else(|| message.get("event_name"))
        .and_then(Value::as_str)?;
    if event_name == "gen_ai.choice" {
        return Some(Role::Assistant);
    }
    event_name
        .strip_prefix("gen_ai.")
        .and_then(|rest| rest.strip_suffix(".message"))
        .and_then(|role| role.parse().ok())
}

fn message_content(message: &Value) -> Option<String> {
    match message.get("content") {
        Some(Value::String(s)) => return Some(s.clone()),
        Some(Value::Null) | None => {}
        Some(other) => return Some(other.to_string()),
    }

    // gen_ai.input.messages style: {"parts": [{"type": "text", "content": "..."}]}
    let parts = message.get("parts")?.as_array()?;
    let text: Vec<String> = parts
        .iter()
        .filter_map(|part| match part.get("content") {
            Some(Value::String(s)) => Some(s.clone()),
            Some(Value::Null) | None => None,
            Some(other) => Some(other.to_string()),
        })
        .collect();

    if text.is_empty() {
        None
    } else {
        Some(text.join("\n"))
    }
}

fn message_tool_calls(message: &Value) -> Option<Vec<ToolCall>> {
    let calls = message.get("tool_calls")?;
    serde_json::from_value::<Vec<ToolCall>>(calls.clone())
        .ok()
        .filter(|calls| !calls.is_empty())
}
