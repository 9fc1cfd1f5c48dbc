//! Canonical text rendering of interactions.
//!
//! Each interaction becomes one block headed by `[role]` or `[role: name]`
//! (system turns are rendered without a header). Tool calls render as a
//! function signature, tool results as an indented key-ordered block when
//! their content parses as structured JSON.

use serde_json::Value;

use crate::{Interaction, Payload, Role, ToolCall};

const INDENT: &str = "    ";

/// Render a single interaction
pub fn format_interaction(interaction: &Interaction) -> String {
    let body = match interaction.payload() {
        Payload::ToolCall(call) => format_tool_call(call),
        Payload::Text(content) if interaction.role == Role::Tool => format_tool_result(content),
        Payload::Text(content) => content.to_string(),
    };

    match (interaction.role, interaction.name.as_deref()) {
        (Role::System, _) => body,
        (role, Some(name)) => format!("[{}: {}]\n{}", role, name, body),
        (role, None) => format!("[{}]\n{}", role, body),
    }
}

/// Render interactions in input order separated by a blank line
pub fn format_many(interactions: &[Interaction]) -> String {
    interactions
        .iter()
        .map(format_interaction)
        .collect::<Vec<_>>()
        .join("\n\n")
}

fn format_tool_call(call: &ToolCall) -> String {
    let mut out = format!("Tool call:\n{}(", call.function_name);

    match serde_json::from_str::<Value>(&call.arguments) {
        Ok(Value::Object(map)) if map.is_empty() => {}
        Ok(Value::Object(map)) => {
            out.push('\n');
            let mut entries: Vec<(&String, &Value)> = map.iter().collect();
            entries.sort_by(|a, b| a.0.cmp(b.0));
            for (key, value) in entries {
                out.push_str(&format!("{}{}={},\n", INDENT, key, value));
            }
        }
        _ if call.arguments.trim().is_empty() => {}
        _ => {
            out.push('\n');
            out.push_str(&format!("{}{},\n", INDENT, call.arguments.trim()));
        }
    }

    out.push(')');
    out
}

fn format_tool_result(content: &str) -> String {
    match serde_json::from_str::<Value>(content) {
        Ok(value @ (Value::Object(_) | Value::Array(_))) => {
            let mut out = String::new();
            write_block(&value, 0, &mut out);
            out.trim_end().to_string()
        }
        Ok(scalar) => scalar_text(&scalar),
        Err(_) => content.to_string(),
    }
}

fn scalar_text(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

fn is_nested(value: &Value) -> bool {
    match value {
        Value::Object(map) => !map.is_empty(),
        Value::Array(items) => !items.is_empty(),
        _ => false,
    }
}

fn inline_text(value: &Value) -> String {
    match value {
        Value::Object(_) => "{}".to_string(),
        Value::Array(_) => "[]".to_string(),
        scalar => scalar_text(scalar),
    }
}

fn write_block(value: &Value, depth: usize, out: &mut String) {
    let indent = INDENT.repeat(depth);
    match value {
        Value::Object(map) => {
            let mut keys: Vec<&String> = map.keys().collect();
            keys.sort();
            for key in keys {
                let child = &map[key.as_str()];
                if is_nested(child) {
                    out.push_str(&format!("{}{}:\n", indent, key));
                    write_block(child, depth + 1, out);
                } else {
                    out.push_str(&format!("{}{}: {}\n", indent, key, inline_text(child)));
                }
            }
        }
        Value::Array(items) => {
            for item in items {
                if is_nested(item) {
                    out.push_str(&format!("{}-\n", indent));
                    write_block(item, depth + 1, out);
                } else {
                    out.push_str(&format!("{}- {}\n", indent, inline_text(item)));
                }
            }
        }
        scalar => out.push_str(&format!("{}{}\n", indent, scalar_text(scalar))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_plain_content_with_header() {
        let text = format_interaction(&Interaction::user("Where is order 12345?"));
        assert_eq!(text, "[user]\nWhere is order 12345?");
    }

    #[test]
    fn test_named_header() {
        let text = format_interaction(&Interaction::assistant("hello").with_name("support_bot"));
        assert_eq!(text, "[assistant: support_bot]\nhello");
    }

    #[test]
    fn test_system_has_no_header() {
        let text = format_interaction(&Interaction::system("You are helpful."));
        assert_eq!(text, "You are helpful.");
    }

    #[test]
    fn test_tool_call_signature() {
        let interaction = Interaction::tool_calls(vec![ToolCall::new(
            "get_status",
            r#"{"id":"12345","verbose":true}"#,
        )]);
        assert_eq!(
            format_interaction(&interaction),
            "[assistant]\nTool call:\nget_status(\n    id=\"12345\",\n    verbose=true,\n)"
        );
    }

    #[test]
    fn test_only_first_tool_call_rendered() {
        let interaction = Interaction::tool_calls(vec![
            ToolCall::new("first", "{}"),
            ToolCall::new("second", "{}"),
        ]);
        let text = format_interaction(&interaction);
        assert!(text.contains("first()"));
        assert!(!text.contains("second"));
    }

    #[test]
    fn test_unparseable_tool_arguments() {
        let interaction = Interaction::tool_calls(vec![ToolCall::new("run", "not json")]);
        assert_eq!(
            format_interaction(&interaction),
            "[assistant]\nTool call:\nrun(\n    not json,\n)"
        );
    }

    #[test]
    fn test_tool_result_structured_block() {
        let text = format_interaction(&Interaction::tool(
            r#"{"status":"shipped","eta":{"days":2},"items":["a","b"]}"#,
        ));
        assert_eq!(
            text,
            "[tool]\neta:\n    days: 2\nitems:\n    - a\n    - b\nstatus: shipped"
        );
    }

    #[test]
    fn test_tool_result_scalar_and_raw() {
        assert_eq!(format_interaction(&Interaction::tool("42")), "[tool]\n42");
        assert_eq!(
            format_interaction(&Interaction::tool(r#""quoted""#)),
            "[tool]\nquoted"
        );
        assert_eq!(
            format_interaction(&Interaction::tool("plain text result")),
            "[tool]\nplain text result"
        );
    }

    #[test]
    fn test_format_many_preserves_order() {
        let a = Interaction::user("alpha");
        let b = Interaction::assistant("beta");
        let forward = format_many(&[a.clone(), b.clone()]);
        let reversed = format_many(&[b, a]);
        assert_eq!(forward, "[user]\nalpha\n\n[assistant]\nbeta");
        assert_eq!(reversed, "[assistant]\nbeta\n\n[user]\nalpha");
    }

    #[test]
    fn test_format_many_empty() {
        assert_eq!(format_many(&[]), "");
    }
}
