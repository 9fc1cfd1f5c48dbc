use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use serde_json::{json, Value};
use tempfile::TempDir;

use tracecritic_agent::{Generation, GenerationOptions, Generator, GeneratorError, GeneratorType};
use tracecritic_core::{
    CritiqueOutcome, PipelineError, PipelineRunner, PipelineStage, RunContext, SpanPlan,
    NO_SPANS_SUMMARY,
};
use tracecritic_logfire::{LookbackAge, QueryError, TraceBackend};
use tracecritic_logging::Logger;
use tracecritic_trace::{Interaction, SpanRecord, ToolCall, TraceStore};

const TRACE_ID: &str = "0af7651916cd43dd8448eb211c80319c";

/// Answers span critiques with "reviewed: <first line of the target body>",
/// aggregation with "AGGREGATE" and summaries with "SUMMARY".
struct ScriptedGenerator {
    prompts: Mutex<Vec<String>>,
    in_flight: AtomicUsize,
    max_in_flight: AtomicUsize,
}

impl ScriptedGenerator {
    fn new() -> Self {
        Self {
            prompts: Mutex::new(Vec::new()),
            in_flight: AtomicUsize::new(0),
            max_in_flight: AtomicUsize::new(0),
        }
    }

    fn prompts(&self) -> Vec<String> {
        self.prompts.lock().unwrap().clone()
    }

    fn aggregate_prompt(&self) -> Option<String> {
        self.prompts()
            .into_iter()
            .find(|p| p.starts_with("Below are critiques"))
    }
}

fn reply_for(prompt: &str) -> String {
    if prompt.starts_with("Below are critiques") {
        return "AGGREGATE".to_string();
    }
    if prompt.starts_with("Below is the complete") {
        return "SUMMARY".to_string();
    }
    let target = prompt
        .split("## Interaction To Critique\n")
        .nth(1)
        .and_then(|rest| rest.split("\n\n---").next())
        .and_then(|section| section.lines().nth(1))
        .unwrap_or("raw");
    format!("  reviewed: {}\n", target)
}

#[async_trait]
impl Generator for ScriptedGenerator {
    fn name(&self) -> &str {
        "scripted"
    }

    fn generator_type(&self) -> GeneratorType {
        GeneratorType::ClaudeCli
    }

    async fn generate(
        &self,
        prompt: &str,
        _options: &GenerationOptions,
    ) -> Result<Generation, GeneratorError> {
        self.prompts.lock().unwrap().push(prompt.to_string());
        let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.max_in_flight.fetch_max(now, Ordering::SeqCst);
        // Later spans finish first
        let delay = if prompt.contains("answer four") { 5 } else { 30 };
        tokio::time::sleep(Duration::from_millis(delay)).await;
        self.in_flight.fetch_sub(1, Ordering::SeqCst);
        Ok(Generation::new(reply_for(prompt), Duration::from_millis(delay)))
    }

    async fn is_available(&self) -> bool {
        true
    }
}

/// Fails every aggregation call
struct BrokenAggregator;

#[async_trait]
impl Generator for BrokenAggregator {
    fn name(&self) -> &str {
        "broken"
    }

    fn generator_type(&self) -> GeneratorType {
        GeneratorType::Anthropic
    }

    async fn generate(
        &self,
        prompt: &str,
        _options: &GenerationOptions,
    ) -> Result<Generation, GeneratorError> {
        if prompt.starts_with("Below are critiques") {
            return Err(GeneratorError::ExecutionFailed("overloaded".into()));
        }
        Ok(Generation::new("fine".into(), Duration::ZERO))
    }

    async fn is_available(&self) -> bool {
        true
    }
}

struct StaticBackend {
    rows: Vec<Value>,
}

#[async_trait]
impl TraceBackend for StaticBackend {
    fn name(&self) -> &str {
        "static"
    }

    async fn query(&self, _sql: &str, _age: LookbackAge) -> Result<Vec<Value>, QueryError> {
        Ok(self.rows.clone())
    }

    async fn schema(&self) -> Result<String, QueryError> {
        Ok(String::new())
    }
}

struct DownBackend;

#[async_trait]
impl TraceBackend for DownBackend {
    fn name(&self) -> &str {
        "down"
    }

    async fn query(&self, _sql: &str, _age: LookbackAge) -> Result<Vec<Value>, QueryError> {
        Err(QueryError::Api {
            status: 503,
            body: "unavailable".into(),
        })
    }

    async fn schema(&self) -> Result<String, QueryError> {
        Err(QueryError::Response("down".into()))
    }
}

fn conversation() -> Vec<Interaction> {
    vec![
        Interaction::user("Where is order 12345?").with_id("S1"),
        Interaction::assistant("answer two").with_id("S2"),
        Interaction::user("And the invoice?").with_id("S3"),
        Interaction::tool_calls(vec![ToolCall::new("get_invoice", r#"{"id":"12345"}"#)])
            .with_id("S4"),
        Interaction::tool(r#"{"invoice":"INV-1"}"#).with_id("S5"),
        Interaction::assistant("answer six").with_id("S6"),
        Interaction::user("Thanks").with_id("S7"),
        Interaction::assistant("answer four").with_id("S8"),
    ]
}

fn setup(records: &[Interaction]) -> (TempDir, TraceStore) {
    let dir = TempDir::new().unwrap();
    let store = TraceStore::with_dir(dir.path().join("data"));
    store.save(TRACE_ID, records).unwrap();
    (dir, store)
}

#[tokio::test]
async fn test_failed_span_keeps_its_position() {
    let (_dir, store) = setup(&conversation());
    let generator = ScriptedGenerator::new();
    let runner = PipelineRunner::new(&generator, store, Arc::new(Logger::quiet()));

    let context = RunContext::new(TRACE_ID)
        .offline()
        .with_positions(vec![2, 4, 5, 6, 8]);
    let report = runner.run(context).await.unwrap();

    let positions: Vec<usize> = report.entries.iter().map(|e| e.position).collect();
    assert_eq!(positions, vec![2, 4, 5, 6, 8]);
    assert_eq!(
        report.entries[2].outcome,
        CritiqueOutcome::Unavailable {
            kind: "InvalidRoleError".into(),
            reason: "Interaction at position 5 has role 'tool', expected 'assistant'".into(),
        }
    );
    assert_eq!(report.failed_count(), 1);
    assert_eq!(report.entries[0].span_id.as_deref(), Some("S2"));

    let aggregate = generator.aggregate_prompt().unwrap();
    assert!(aggregate.contains("### Critique 3\ncritique unavailable: InvalidRoleError"));
    assert!(aggregate.contains("### Critique 1\nreviewed: answer two"));
    assert!(aggregate.contains("### Critique 5\nreviewed: answer four"));
    assert!(!aggregate.contains("### Critique 6"));
    assert_eq!(report.critique_summary, "AGGREGATE");
}

#[tokio::test]
async fn test_results_ordered_by_position_not_completion() {
    let (_dir, store) = setup(&conversation());
    let generator = ScriptedGenerator::new();
    let runner = PipelineRunner::new(&generator, store, Arc::new(Logger::quiet()));

    let report = runner.run(RunContext::new(TRACE_ID).offline()).await.unwrap();

    let texts: Vec<String> = report
        .entries
        .iter()
        .map(|e| match &e.outcome {
            CritiqueOutcome::Critique { text } => text.clone(),
            other => panic!("unexpected outcome {:?}", other),
        })
        .collect();
    assert_eq!(
        texts,
        vec![
            "reviewed: answer two",
            "reviewed: Tool call:",
            "reviewed: answer six",
            "reviewed: answer four"
        ]
        .into_iter()
        .map(String::from)
        .collect::<Vec<_>>()
    );
    assert_eq!(
        report.entries.iter().map(|e| e.position).collect::<Vec<_>>(),
        vec![2, 4, 6, 8]
    );
}

#[tokio::test]
async fn test_concurrency_is_bounded() {
    let (_dir, store) = setup(&conversation());
    let generator = ScriptedGenerator::new();
    let runner = PipelineRunner::new(&generator, store, Arc::new(Logger::quiet()));

    runner
        .run(RunContext::new(TRACE_ID).offline().with_concurrency(2))
        .await
        .unwrap();

    assert!(generator.max_in_flight.load(Ordering::SeqCst) <= 2);
    // Four spans plus one aggregation
    assert_eq!(generator.prompts().len(), 5);
}

#[tokio::test]
async fn test_fetch_persists_rows_before_critique() {
    let dir = TempDir::new().unwrap();
    let store = TraceStore::with_dir(dir.path().join("data"));
    let backend = StaticBackend {
        rows: vec![
            json!({"role": "user", "content": "hi", "id": "S1"}),
            json!({"role": "assistant", "content": "hello", "id": "S2"}),
        ],
    };
    let generator = ScriptedGenerator::new();
    let runner = PipelineRunner::new(&generator, store.clone(), Arc::new(Logger::quiet()))
        .with_backend(&backend);

    let report = runner
        .run(RunContext::new(TRACE_ID).with_summary(true))
        .await
        .unwrap();

    assert_eq!(store.load(TRACE_ID).unwrap().len(), 2);
    assert_eq!(report.trace_summary.as_deref(), Some("SUMMARY"));
    assert_eq!(report.entries.len(), 1);
    let markdown = report.render_markdown();
    assert!(markdown.contains("## Trace Summary\n\nSUMMARY"));
    assert!(markdown.contains("### Span 2 (S2)\n\nreviewed: hello"));
}

#[tokio::test]
async fn test_fetch_failure_aborts_run() {
    let dir = TempDir::new().unwrap();
    let store = TraceStore::with_dir(dir.path().join("data"));
    let generator = ScriptedGenerator::new();
    let runner = PipelineRunner::new(&generator, store.clone(), Arc::new(Logger::quiet()))
        .with_backend(&DownBackend);

    let err = runner.run(RunContext::new(TRACE_ID)).await.unwrap_err();

    assert!(matches!(err, PipelineError::Fetch { .. }));
    assert_eq!(err.kind(), "BackendError");
    assert_eq!(err.stage(), PipelineStage::Fetch);
    assert!(err.to_string().contains(TRACE_ID));
    assert!(!store.exists(TRACE_ID));
    assert!(generator.prompts().is_empty());
}

#[tokio::test]
async fn test_online_run_without_backend_is_rejected() {
    let (_dir, store) = setup(&conversation());
    let generator = ScriptedGenerator::new();
    let runner = PipelineRunner::new(&generator, store, Arc::new(Logger::quiet()));

    let err = runner.run(RunContext::new(TRACE_ID)).await.unwrap_err();
    assert_eq!(err.kind(), "ConfigError");
}

#[tokio::test]
async fn test_empty_fetch_is_not_found() {
    let dir = TempDir::new().unwrap();
    let backend = StaticBackend { rows: Vec::new() };
    let generator = ScriptedGenerator::new();
    let runner = PipelineRunner::new(
        &generator,
        TraceStore::with_dir(dir.path().to_path_buf()),
        Arc::new(Logger::quiet()),
    )
    .with_backend(&backend);

    let err = runner.run(RunContext::new(TRACE_ID)).await.unwrap_err();
    assert_eq!(err.kind(), "NotFoundError");
}

#[tokio::test]
async fn test_offline_missing_trace_fails_decompose() {
    let dir = TempDir::new().unwrap();
    let generator = ScriptedGenerator::new();
    let runner = PipelineRunner::new(
        &generator,
        TraceStore::with_dir(dir.path().to_path_buf()),
        Arc::new(Logger::quiet()),
    );

    let err = runner
        .run(RunContext::new("T1").offline())
        .await
        .unwrap_err();
    assert_eq!(err.kind(), "NotFoundError");
    assert_eq!(err.stage(), PipelineStage::Decompose);
    assert!(err.to_string().contains("T1"));
}

#[tokio::test]
async fn test_trace_without_assistant_turns_skips_aggregation() {
    let (_dir, store) = setup(&[Interaction::user("anyone there?")]);
    let generator = ScriptedGenerator::new();
    let runner = PipelineRunner::new(&generator, store, Arc::new(Logger::quiet()));

    let report = runner.run(RunContext::new(TRACE_ID).offline()).await.unwrap();

    assert!(report.entries.is_empty());
    assert_eq!(report.critique_summary, NO_SPANS_SUMMARY);
    assert!(generator.prompts().is_empty());
}

#[tokio::test]
async fn test_raw_spans_without_history_are_not_aggregated() {
    let dir = TempDir::new().unwrap();
    let store = TraceStore::with_dir(dir.path().to_path_buf());
    let records = vec![
        json!({"span_id": "R1", "span_name": "db query", "attributes": {"db.statement": "SELECT 1"}}),
        json!({
            "span_id": "R2",
            "span_name": "chat",
            "attributes": {
                "all_messages_events": [
                    {"role": "user", "content": "Is it raining?"},
                    {"role": "assistant", "content": "answer rain"}
                ]
            }
        }),
    ];
    store.save(TRACE_ID, records.as_slice()).unwrap();

    let generator = ScriptedGenerator::new();
    let runner = PipelineRunner::new(&generator, store, Arc::new(Logger::quiet()));
    let report = runner.run(RunContext::new(TRACE_ID).offline()).await.unwrap();

    assert_eq!(report.entries.len(), 2);
    assert_eq!(report.entries[0].outcome, CritiqueOutcome::NoHistory);
    assert_eq!(report.entries[0].span_id.as_deref(), Some("R1"));
    assert_eq!(
        report.entries[1].outcome,
        CritiqueOutcome::Critique {
            text: "reviewed: answer rain".into()
        }
    );

    let aggregate = generator.aggregate_prompt().unwrap();
    assert!(aggregate.contains("### Critique 1\nreviewed: answer rain"));
    assert!(!aggregate.contains("No conversation history found."));
}

#[tokio::test]
async fn test_malformed_interaction_surfaces_as_validation_error() {
    let dir = TempDir::new().unwrap();
    let store = TraceStore::with_dir(dir.path().to_path_buf());
    let records = vec![
        json!({"role": "user", "content": "Where is order 12345?", "span_id": "S1"}),
        json!({"role": "assistant", "tool_calls": ["get_status"], "span_id": "S2"}),
        json!({"role": "Assistant", "content": "answer four", "span_id": "S3"}),
    ];
    store.save(TRACE_ID, records.as_slice()).unwrap();

    let generator = ScriptedGenerator::new();
    let runner = PipelineRunner::new(&generator, store, Arc::new(Logger::quiet()));
    let report = runner.run(RunContext::new(TRACE_ID).offline()).await.unwrap();

    assert_eq!(
        report.entries.iter().map(|e| e.position).collect::<Vec<_>>(),
        vec![2, 3]
    );
    assert!(matches!(
        report.entries[0].outcome,
        CritiqueOutcome::Unavailable { ref kind, .. } if kind == "ValidationError"
    ));
    assert_eq!(report.entries[0].span_id.as_deref(), Some("S2"));
    assert_eq!(
        report.entries[1].outcome,
        CritiqueOutcome::Critique {
            text: "reviewed: answer four".into()
        }
    );

    let aggregate = generator.aggregate_prompt().unwrap();
    assert!(aggregate.contains("### Critique 1\ncritique unavailable: ValidationError"));
    assert!(aggregate.contains("### Critique 2\nreviewed: answer four"));
}

#[tokio::test]
async fn test_aggregate_failure_is_fatal() {
    let (_dir, store) = setup(&conversation());
    let runner = PipelineRunner::new(&BrokenAggregator, store, Arc::new(Logger::quiet()));

    let err = runner
        .run(RunContext::new(TRACE_ID).offline())
        .await
        .unwrap_err();
    assert_eq!(err.kind(), "GenerationError");
    assert_eq!(err.stage(), PipelineStage::Aggregate);
}

#[tokio::test]
async fn test_critique_stored_single_span() {
    let (_dir, store) = setup(&conversation());
    let generator = ScriptedGenerator::new();
    let runner = PipelineRunner::new(&generator, store, Arc::new(Logger::quiet()));

    let entry = runner.critique_stored(TRACE_ID, 6).await.unwrap();
    assert_eq!(
        entry.outcome,
        CritiqueOutcome::Critique {
            text: "reviewed: answer six".into()
        }
    );
    let prompt = &generator.prompts()[0];
    assert!(prompt.contains("Where is order 12345?"));
    assert!(!prompt.contains("Thanks"));

    let entry = runner.critique_stored(TRACE_ID, 42).await.unwrap();
    assert!(matches!(
        entry.outcome,
        CritiqueOutcome::Unavailable { ref kind, .. } if kind == "OutOfRangeError"
    ));
}

#[test]
fn test_plan_from_stored_records() {
    let (_dir, store) = setup(&conversation());
    let records: Vec<SpanRecord> = store.load_records(TRACE_ID).unwrap();
    assert_eq!(SpanPlan::new(TRACE_ID, records).default_positions(), vec![2, 4, 6, 8]);
}
