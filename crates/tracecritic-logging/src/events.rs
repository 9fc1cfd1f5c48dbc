use colored::Colorize;
use serde::{Deserialize, Serialize};
use std::fs::File;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

/// Stage of a pipeline run
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PipelineStage {
    Fetch,
    Decompose,
    Critique,
    Aggregate,
    Deliver,
}

impl std::fmt::Display for PipelineStage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            PipelineStage::Fetch => write!(f, "fetch"),
            PipelineStage::Decompose => write!(f, "decompose"),
            PipelineStage::Critique => write!(f, "critique"),
            PipelineStage::Aggregate => write!(f, "aggregate"),
            PipelineStage::Deliver => write!(f, "deliver"),
        }
    }
}

/// Structured log events for a critique run
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum LogEvent {
    RunStarted {
        run_id: String,
        trace_id: String,
    },
    StageStarted {
        stage: PipelineStage,
    },
    TraceFetched {
        trace_id: String,
        rows: usize,
        path: PathBuf,
    },
    TraceDecomposed {
        records: usize,
        spans: usize,
    },
    SpanCritiqueStarted {
        position: usize,
    },
    SpanCritiqueCompleted {
        position: usize,
        duration_secs: f64,
        chars: usize,
    },
    /// Raw span without conversation history
    SpanCritiqueSkipped {
        position: usize,
    },
    SpanCritiqueFailed {
        position: usize,
        kind: String,
        error: String,
    },
    AggregateStarted {
        entries: usize,
    },
    RunCompleted {
        trace_id: String,
        spans: usize,
        failed: usize,
        duration_secs: f64,
    },
    RunAborted {
        trace_id: String,
        stage: PipelineStage,
        kind: String,
        error: String,
    },
}

impl LogEvent {
    /// Add a timestamp to serialize with the event
    fn with_timestamp(&self) -> serde_json::Value {
        let mut value = serde_json::to_value(self).unwrap_or_default();
        if let Some(obj) = value.as_object_mut() {
            obj.insert(
                "timestamp".to_string(),
                serde_json::Value::String(chrono::Utc::now().to_rfc3339()),
            );
        }
        value
    }
}

/// Log output format
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum LogFormat {
    /// Human-readable format with colors
    #[default]
    Pretty,
    /// JSON lines format for machine consumption
    Json,
    /// Compact single-line format
    Compact,
}

impl std::str::FromStr for LogFormat {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "pretty" => Ok(LogFormat::Pretty),
            "json" => Ok(LogFormat::Json),
            "compact" => Ok(LogFormat::Compact),
            _ => Err(format!("Unknown log format: {}", s)),
        }
    }
}

/// Logger for run events - handles both console output and file logging
pub struct Logger {
    format: LogFormat,
    quiet: bool,
    file_writer: Option<Mutex<File>>,
}

impl Logger {
    pub fn new(format: LogFormat) -> Self {
        Self {
            format,
            quiet: false,
            file_writer: None,
        }
    }

    /// A logger that prints nothing to the console
    pub fn quiet() -> Self {
        Self {
            format: LogFormat::Compact,
            quiet: true,
            file_writer: None,
        }
    }

    /// Create a logger with file output in addition to console
    pub fn with_file(format: LogFormat, log_path: &Path) -> std::io::Result<Self> {
        if let Some(parent) = log_path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let file = std::fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(log_path)?;

        Ok(Self {
            format,
            quiet: false,
            file_writer: Some(Mutex::new(file)),
        })
    }

    pub fn log(&self, event: &LogEvent) {
        // File output is always JSON
        if let Some(ref writer) = self.file_writer {
            if let Ok(mut file) = writer.lock() {
                let json = event.with_timestamp();
                let _ = writeln!(file, "{}", json);
            }
        }

        if self.quiet {
            return;
        }

        match self.format {
            LogFormat::Json => self.log_json(event),
            LogFormat::Pretty => self.log_pretty(event),
            LogFormat::Compact => self.log_compact(event),
        }
    }

    fn log_json(&self, event: &LogEvent) {
        if let Ok(json) = serde_json::to_string(event) {
            let _ = writeln!(std::io::stderr(), "{}", json);
        }
    }

    fn log_pretty(&self, event: &LogEvent) {
        let mut stderr = std::io::stderr();
        match event {
            LogEvent::RunStarted { trace_id, .. } => {
                let _ = writeln!(stderr);
                let _ = writeln!(
                    stderr,
                    "{}  {} {}",
                    "▶".bright_blue(),
                    "tracecritic".bold().bright_white(),
                    trace_id.dimmed()
                );
            }
            LogEvent::StageStarted { stage } => {
                let _ = writeln!(
                    stderr,
                    "  {} {}",
                    "─".bright_blue(),
                    stage.to_string().to_uppercase().bright_blue().bold()
                );
            }
            LogEvent::TraceFetched { rows, path, .. } => {
                let _ = writeln!(
                    stderr,
                    "    {} {} {} saved to {}",
                    "✓".bright_green(),
                    rows,
                    if *rows == 1 { "record" } else { "records" },
                    path.display().to_string().dimmed()
                );
            }
            LogEvent::TraceDecomposed { records, spans } => {
                let _ = writeln!(
                    stderr,
                    "    {} {} records, {} {} to critique",
                    "✓".bright_green(),
                    records,
                    spans,
                    if *spans == 1 { "span" } else { "spans" }
                );
            }
            LogEvent::SpanCritiqueStarted { .. } => {
                // Too noisy with concurrent critiques
            }
            LogEvent::SpanCritiqueCompleted {
                position,
                duration_secs,
                ..
            } => {
                let _ = writeln!(
                    stderr,
                    "    {} span {} ({:.1}s)",
                    "✓".bright_green(),
                    position,
                    duration_secs
                );
            }
            LogEvent::SpanCritiqueSkipped { position } => {
                let _ = writeln!(
                    stderr,
                    "    {} span {} {}",
                    "○".dimmed(),
                    position,
                    "no conversation history".dimmed()
                );
            }
            LogEvent::SpanCritiqueFailed {
                position, kind, error, ..
            } => {
                let _ = writeln!(
                    stderr,
                    "    {} span {} {}: {}",
                    "✗".bright_red(),
                    position,
                    kind.bright_red(),
                    error.dimmed()
                );
            }
            LogEvent::AggregateStarted { entries } => {
                let _ = writeln!(
                    stderr,
                    "    {} folding {} critiques",
                    "→".bright_yellow(),
                    entries
                );
            }
            LogEvent::RunCompleted {
                spans,
                failed,
                duration_secs,
                ..
            } => {
                let status = if *failed == 0 {
                    format!("✓ {} spans critiqued", spans).bright_green().to_string()
                } else {
                    format!("→ {} spans critiqued, {} unavailable", spans, failed)
                        .bright_yellow()
                        .to_string()
                };
                let _ = writeln!(stderr, "  {} ({:.1}s)", status, duration_secs);
                let _ = writeln!(stderr);
            }
            LogEvent::RunAborted {
                trace_id,
                stage,
                kind,
                error,
            } => {
                let _ = writeln!(stderr);
                let _ = writeln!(
                    stderr,
                    "{} {} failed for trace {}: {} ({})",
                    "✗".bright_red(),
                    stage,
                    trace_id,
                    error.bright_red(),
                    kind
                );
            }
        }
    }

    fn log_compact(&self, event: &LogEvent) {
        let mut stderr = std::io::stderr();
        let timestamp = chrono::Utc::now().format("%H:%M:%S");
        let msg = match event {
            LogEvent::RunStarted { trace_id, .. } => {
                format!("[{}] run:start {}", timestamp, trace_id)
            }
            LogEvent::StageStarted { stage } => format!("[{}] stage:{}", timestamp, stage),
            LogEvent::TraceFetched { rows, .. } => {
                format!("[{}] fetch:done rows={}", timestamp, rows)
            }
            LogEvent::TraceDecomposed { records, spans } => format!(
                "[{}] decompose:done records={} spans={}",
                timestamp, records, spans
            ),
            LogEvent::SpanCritiqueStarted { position } => {
                format!("[{}] span:start:{}", timestamp, position)
            }
            LogEvent::SpanCritiqueCompleted {
                position,
                duration_secs,
                chars,
            } => format!(
                "[{}] span:done:{} {:.1}s chars={}",
                timestamp, position, duration_secs, chars
            ),
            LogEvent::SpanCritiqueSkipped { position } => {
                format!("[{}] span:skip:{}", timestamp, position)
            }
            LogEvent::SpanCritiqueFailed {
                position, kind, ..
            } => format!("[{}] span:fail:{} {}", timestamp, position, kind),
            LogEvent::AggregateStarted { entries } => {
                format!("[{}] aggregate:start entries={}", timestamp, entries)
            }
            LogEvent::RunCompleted {
                spans,
                failed,
                duration_secs,
                ..
            } => format!(
                "[{}] run:done spans={} failed={} {:.1}s",
                timestamp, spans, failed, duration_secs
            ),
            LogEvent::RunAborted {
                stage, kind, ..
            } => format!("[{}] run:abort:{} {}", timestamp, stage, kind),
        };
        let _ = writeln!(stderr, "{}", msg);
    }
}
