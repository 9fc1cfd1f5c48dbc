use std::sync::Arc;
use std::time::Instant;

use futures::stream::{self, StreamExt};
use tracing::{debug, info, warn};

use tracecritic_agent::{GenerationOptions, Generator};
use tracecritic_critic::{Aggregator, CritiqueEngine, RawCritique};
use tracecritic_logfire::TraceBackend;
use tracecritic_logging::{LogEvent, Logger, PipelineStage};
use tracecritic_trace::TraceStore;

use crate::plan::{SpanPlan, SpanTarget};
use crate::report::{CritiqueOutcome, SpanCritique, TraceReport, NO_SPANS_SUMMARY};
use crate::{PipelineError, RunContext};

/// Drives a trace through Fetch, Decompose, Critique, Aggregate and Deliver
pub struct PipelineRunner<'a> {
    generator: &'a dyn Generator,
    backend: Option<&'a dyn TraceBackend>,
    store: TraceStore,
    logger: Arc<Logger>,
    critique_options: GenerationOptions,
    aggregate_options: GenerationOptions,
}

impl<'a> PipelineRunner<'a> {
    pub fn new(generator: &'a dyn Generator, store: TraceStore, logger: Arc<Logger>) -> Self {
        Self {
            generator,
            backend: None,
            store,
            logger,
            critique_options: GenerationOptions::default(),
            aggregate_options: GenerationOptions::default(),
        }
    }

    pub fn with_backend(mut self, backend: &'a dyn TraceBackend) -> Self {
        self.backend = Some(backend);
        self
    }

    pub fn with_critique_options(mut self, options: GenerationOptions) -> Self {
        self.critique_options = options;
        self
    }

    pub fn with_aggregate_options(mut self, options: GenerationOptions) -> Self {
        self.aggregate_options = options;
        self
    }

    pub fn store(&self) -> &TraceStore {
        &self.store
    }

    /// Run the whole pipeline for `context.trace_id`
    pub async fn run(&self, context: RunContext) -> Result<TraceReport, PipelineError> {
        self.logger.log(&LogEvent::RunStarted {
            run_id: context.run_id().to_string(),
            trace_id: context.trace_id.clone(),
        });

        match self.run_stages(&context).await {
            Ok(report) => {
                self.logger.log(&LogEvent::RunCompleted {
                    trace_id: context.trace_id.clone(),
                    spans: report.entries.len(),
                    failed: report.failed_count(),
                    duration_secs: context.elapsed().as_secs_f64(),
                });
                Ok(report)
            }
            Err(e) => {
                warn!(trace_id = %context.trace_id, error = %e, "Run aborted");
                self.logger.log(&LogEvent::RunAborted {
                    trace_id: context.trace_id.clone(),
                    stage: e.stage(),
                    kind: e.kind().to_string(),
                    error: e.to_string(),
                });
                Err(e)
            }
        }
    }

    async fn run_stages(&self, context: &RunContext) -> Result<TraceReport, PipelineError> {
        let trace_id = context.trace_id.as_str();

        if context.offline {
            debug!(trace_id, "Offline run, using stored trace");
        } else {
            self.fetch(context).await?;
        }

        let plan = self.decompose(trace_id)?;
        let positions = context
            .positions
            .clone()
            .unwrap_or_else(|| plan.default_positions());
        self.logger.log(&LogEvent::TraceDecomposed {
            records: plan.len(),
            spans: positions.len(),
        });

        self.logger.log(&LogEvent::StageStarted {
            stage: PipelineStage::Critique,
        });
        let entries = self
            .critique_positions(&plan, &positions, context.concurrency)
            .await;

        self.logger.log(&LogEvent::StageStarted {
            stage: PipelineStage::Aggregate,
        });
        let aggregator = Aggregator::new(self.generator).with_options(self.aggregate_options.clone());

        let trace_summary = if context.summarize {
            let summary = aggregator
                .summarize_trace(plan.records())
                .await
                .map_err(|source| PipelineError::Aggregate {
                    trace_id: trace_id.to_string(),
                    source,
                })?;
            Some(summary)
        } else {
            None
        };

        let inputs = TraceReport::aggregate_inputs(&entries);
        let critique_summary = if inputs.is_empty() {
            info!(trace_id, "Nothing to aggregate");
            NO_SPANS_SUMMARY.to_string()
        } else {
            self.logger.log(&LogEvent::AggregateStarted {
                entries: inputs.len(),
            });
            aggregator
                .aggregate_critiques(&inputs)
                .await
                .map_err(|source| PipelineError::Aggregate {
                    trace_id: trace_id.to_string(),
                    source,
                })?
        };

        self.logger.log(&LogEvent::StageStarted {
            stage: PipelineStage::Deliver,
        });
        Ok(TraceReport {
            trace_id: trace_id.to_string(),
            trace_summary,
            critique_summary,
            entries,
        })
    }

    /// Query the backend for the trace and persist the rows as fetched
    async fn fetch(&self, context: &RunContext) -> Result<(), PipelineError> {
        let trace_id = context.trace_id.as_str();
        self.logger.log(&LogEvent::StageStarted {
            stage: PipelineStage::Fetch,
        });

        let backend = self.backend.ok_or_else(|| PipelineError::NoBackend {
            trace_id: trace_id.to_string(),
        })?;

        debug!(trace_id, backend = backend.name(), age = %context.age, "Fetching trace");
        let rows = backend
            .fetch_trace(trace_id, context.age)
            .await
            .map_err(|source| PipelineError::Fetch {
                trace_id: trace_id.to_string(),
                source,
            })?;

        if rows.is_empty() {
            return Err(PipelineError::EmptyTrace {
                trace_id: trace_id.to_string(),
            });
        }

        let path = self
            .store
            .save(trace_id, rows.as_slice())
            .map_err(|source| PipelineError::Store {
                trace_id: trace_id.to_string(),
                source,
            })?;

        self.logger.log(&LogEvent::TraceFetched {
            trace_id: trace_id.to_string(),
            rows: rows.len(),
            path,
        });
        Ok(())
    }

    fn decompose(&self, trace_id: &str) -> Result<SpanPlan, PipelineError> {
        self.logger.log(&LogEvent::StageStarted {
            stage: PipelineStage::Decompose,
        });

        let records = self
            .store
            .load_records(trace_id)
            .map_err(|source| PipelineError::Decompose {
                trace_id: trace_id.to_string(),
                source,
            })?;
        Ok(SpanPlan::new(trace_id, records))
    }

    /// Critique one position of a stored trace
    pub async fn critique_stored(
        &self,
        trace_id: &str,
        position: usize,
    ) -> Result<SpanCritique, PipelineError> {
        let plan = self.decompose(trace_id)?;
        let engine = CritiqueEngine::new(self.generator).with_options(self.critique_options.clone());
        Ok(self.critique_one(&engine, &plan, position).await)
    }

    /// Critique `positions` with at most `concurrency` calls in flight.
    ///
    /// Entries come back in the order of `positions`, whatever order the
    /// calls finish in. A failing span yields an `Unavailable` entry.
    pub async fn critique_positions(
        &self,
        plan: &SpanPlan,
        positions: &[usize],
        concurrency: usize,
    ) -> Vec<SpanCritique> {
        let engine = CritiqueEngine::new(self.generator).with_options(self.critique_options.clone());
        let engine = &engine;

        let mut slots: Vec<Option<SpanCritique>> = vec![None; positions.len()];
        let mut completed = stream::iter(positions.iter().copied().enumerate())
            .map(|(slot, position)| async move {
                (slot, self.critique_one(engine, plan, position).await)
            })
            .buffer_unordered(concurrency.max(1));

        while let Some((slot, entry)) = completed.next().await {
            slots[slot] = Some(entry);
        }

        slots.into_iter().flatten().collect()
    }

    async fn critique_one(
        &self,
        engine: &CritiqueEngine<'_>,
        plan: &SpanPlan,
        position: usize,
    ) -> SpanCritique {
        self.logger.log(&LogEvent::SpanCritiqueStarted { position });
        let started = Instant::now();

        let outcome = match plan.target(position) {
            Ok(SpanTarget::Interaction(span)) => match engine.critique_span(&span).await {
                Ok(text) => CritiqueOutcome::Critique { text },
                Err(e) => unavailable(e.kind(), &e),
            },
            Ok(SpanTarget::Raw(payload)) => match engine.critique_payload(payload).await {
                Ok(RawCritique::Critique(text)) => CritiqueOutcome::Critique { text },
                Ok(RawCritique::NoHistory) => CritiqueOutcome::NoHistory,
                Err(e) => unavailable(e.kind(), &e),
            },
            Err(e) => unavailable(e.kind(), &e),
        };

        match &outcome {
            CritiqueOutcome::Critique { text } => {
                self.logger.log(&LogEvent::SpanCritiqueCompleted {
                    position,
                    duration_secs: started.elapsed().as_secs_f64(),
                    chars: text.chars().count(),
                });
            }
            CritiqueOutcome::NoHistory => {
                self.logger.log(&LogEvent::SpanCritiqueSkipped { position });
            }
            CritiqueOutcome::Unavailable { kind, reason } => {
                warn!(position, kind = %kind, error = %reason, "Span critique failed");
                self.logger.log(&LogEvent::SpanCritiqueFailed {
                    position,
                    kind: kind.clone(),
                    error: reason.clone(),
                });
            }
        }

        SpanCritique {
            position,
            span_id: plan.span_id(position),
            outcome,
        }
    }
}

fn unavailable(kind: &str, error: &dyn std::fmt::Display) -> CritiqueOutcome {
    CritiqueOutcome::Unavailable {
        kind: kind.to_string(),
        reason: error.to_string(),
    }
}
