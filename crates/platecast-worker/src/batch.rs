//! Batch sequencer.
//!
//! Walks a recipe's steps strictly in index order, one provider job at a time.
//! A failed step never stops the batch. Progress is reported through a
//! callback with the full running result set after every state change.

use async_trait::async_trait;
use platecast_models::{ArtifactKind, BatchSummary, CreditExhausted, Step, StepMediaResult};
use tracing::{info, Instrument};

use crate::logging::GenerationLogger;

/// What happened to one step.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StepOutcome {
    /// Permanent URL of the stored artifact
    Completed(String),
    Failed(String),
    /// The ledger refused the unit; nothing was generated
    Denied(CreditExhausted),
}

/// Produces the artifact for one step.
#[async_trait]
pub trait StepGenerator: Send + Sync {
    async fn generate_step(&self, step_index: u32, step: &Step) -> StepOutcome;
}

/// Results of a batch together with its aggregate.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BatchReport {
    pub results: Vec<StepMediaResult>,
    pub summary: BatchSummary,
    /// Set when the ledger stopped the batch
    pub denied: Option<CreditExhausted>,
}

pub struct BatchSequencer {
    kind: ArtifactKind,
    logger: GenerationLogger,
}

impl BatchSequencer {
    pub fn new(kind: ArtifactKind, logger: GenerationLogger) -> Self {
        Self { kind, logger }
    }

    /// Generate every step that has no completed result in `existing`.
    ///
    /// Completed entries in `existing` are reused without provider work.
    pub async fn generate_batch<G, P>(
        &self,
        generator: &G,
        steps: &[Step],
        existing: &[StepMediaResult],
        mut on_progress: P,
    ) -> BatchReport
    where
        G: StepGenerator + ?Sized,
        P: FnMut(&[StepMediaResult]) + Send,
    {
        let span = self.logger.create_span();
        async move {
            let mut results: Vec<StepMediaResult> = Vec::with_capacity(steps.len());
            let mut denied: Option<CreditExhausted> = None;

            if !steps.is_empty() {
                self.logger.log_start(&format!("{} steps", steps.len()));
            }

            for (position, step) in steps.iter().enumerate() {
                let step_index = position as u32;

                if let Some(done) = existing
                    .iter()
                    .find(|r| r.step_index == step_index && r.is_completed())
                {
                    results.push(done.clone());
                    on_progress(&results);
                    continue;
                }

                if let Some(exhausted) = &denied {
                    results.push(StepMediaResult::failed(step_index, exhausted.message.clone()));
                    on_progress(&results);
                    continue;
                }

                results.push(StepMediaResult::generating(step_index));
                on_progress(&results);

                let finished = match generator.generate_step(step_index, step).await {
                    StepOutcome::Completed(url) => {
                        self.logger.log_progress(step_index, "completed");
                        StepMediaResult::completed(step_index, url)
                    }
                    StepOutcome::Failed(reason) => {
                        self.logger
                            .log_warning(Some(step_index), &format!("failed: {}", reason));
                        StepMediaResult::failed(step_index, reason)
                    }
                    StepOutcome::Denied(exhausted) => {
                        let failed = StepMediaResult::failed(step_index, exhausted.message.clone());
                        denied = Some(exhausted);
                        failed
                    }
                };

                if let Some(last) = results.last_mut() {
                    *last = finished;
                }
                on_progress(&results);
            }

            let summary = BatchSummary::from_results(self.kind, &results);
            info!(
                kind = %self.kind,
                total = summary.total,
                completed = summary.completed,
                failed = summary.failed,
                "{}", summary.message()
            );

            BatchReport {
                results,
                summary,
                denied,
            }
        }
        .instrument(span)
        .await
    }
}
