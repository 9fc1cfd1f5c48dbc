use std::time::{Duration, Instant};

use tracecritic_logfire::LookbackAge;

/// Upper bound on concurrently running span critiques
pub const DEFAULT_CONCURRENCY: usize = 10;

/// Inputs and bookkeeping for one pipeline run
#[derive(Debug, Clone)]
pub struct RunContext {
    /// Trace to critique
    pub trace_id: String,
    /// Lookback window used when fetching
    pub age: LookbackAge,
    /// Skip Fetch and use the stored trace
    pub offline: bool,
    /// Also produce a whole-trace summary
    pub summarize: bool,
    /// Record positions to critique instead of every eligible one
    pub positions: Option<Vec<usize>>,
    pub concurrency: usize,
    run_id: String,
    started_at: Instant,
}

impl RunContext {
    pub fn new(trace_id: impl Into<String>) -> Self {
        Self {
            trace_id: trace_id.into(),
            age: LookbackAge::max(),
            offline: false,
            summarize: false,
            positions: None,
            concurrency: DEFAULT_CONCURRENCY,
            run_id: uuid::Uuid::new_v4().to_string(),
            started_at: Instant::now(),
        }
    }

    pub fn with_age(mut self, age: LookbackAge) -> Self {
        self.age = age;
        self
    }

    pub fn offline(mut self) -> Self {
        self.offline = true;
        self
    }

    pub fn with_summary(mut self, summarize: bool) -> Self {
        self.summarize = summarize;
        self
    }

    pub fn with_positions(mut self, positions: Vec<usize>) -> Self {
        self.positions = Some(positions);
        self
    }

    /// Zero is treated as one
    pub fn with_concurrency(mut self, concurrency: usize) -> Self {
        self.concurrency = concurrency.max(1);
        self
    }

    pub fn run_id(&self) -> &str {
        &self.run_id
    }

    pub fn elapsed(&self) -> Duration {
        self.started_at.elapsed()
    }
}
