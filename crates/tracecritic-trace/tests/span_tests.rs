use tracecritic_trace::{extract, format_many, Interaction, Role, ToolCall, Trace, TraceError};

fn order_trace() -> Vec<Interaction> {
    vec![
        Interaction::user("Where is order 12345?"),
        Interaction::tool_calls(vec![ToolCall::new("get_status", r#"{"id":"12345"}"#)]),
        Interaction::tool(r#"{"status":"shipped"}"#),
        Interaction::assistant("Your order has shipped."),
    ]
}

#[test]
fn test_extract_final_answer() {
    let trace = order_trace();
    let span = extract(&trace, 4).unwrap();

    assert_eq!(span.position, 4);
    assert_eq!(span.context, &trace[..3]);
    assert_eq!(span.target, &trace[3]);
}

#[test]
fn test_context_length_matches_position_for_every_assistant_turn() {
    let trace = order_trace();
    for (index, interaction) in trace.iter().enumerate() {
        let position = index + 1;
        if interaction.role != Role::Assistant {
            continue;
        }
        let span = extract(&trace, position).unwrap();
        assert_eq!(span.context.len(), position - 1);
        assert_eq!(span.target, interaction);
    }
}

#[test]
fn test_out_of_range_positions() {
    let trace = order_trace();
    for position in [0, 5, 100] {
        let err = extract(&trace, position).unwrap_err();
        assert!(
            matches!(err, TraceError::OutOfRange { position: p, len: 4 } if p == position),
            "position {} should be out of range",
            position
        );
        assert_eq!(err.kind(), "OutOfRangeError");
    }

    assert!(matches!(
        extract(&[], 1),
        Err(TraceError::OutOfRange { len: 0, .. })
    ));
}

#[test]
fn test_non_assistant_positions() {
    let trace = order_trace();
    for position in [1, 3] {
        let err = extract(&trace, position).unwrap_err();
        assert_eq!(err.kind(), "InvalidRoleError");
    }
}

#[test]
fn test_trace_assistant_positions() {
    let trace = Trace::new("T1", order_trace());
    assert_eq!(trace.assistant_positions(), vec![2, 4]);
    assert_eq!(trace.len(), 4);
    assert!(trace.span(2).is_ok());
}

#[test]
fn test_span_formatting_never_includes_later_turns() {
    let trace = order_trace();
    let span = extract(&trace, 2).unwrap();

    let context = span.formatted_context();
    assert_eq!(context, "[user]\nWhere is order 12345?");
    assert!(!context.contains("shipped"));
    assert!(span.formatted_target().starts_with("[assistant]\nTool call:\nget_status("));
}

#[test]
fn test_format_many_blocks_follow_input_order() {
    let trace = order_trace();
    let mut permuted = trace.clone();
    permuted.reverse();

    let forward: Vec<String> = format_many(&trace)
        .split("\n\n")
        .map(String::from)
        .collect();
    let backward: Vec<String> = format_many(&permuted)
        .split("\n\n")
        .map(String::from)
        .collect();

    let mut reversed = forward.clone();
    reversed.reverse();
    assert_eq!(backward, reversed);
}
