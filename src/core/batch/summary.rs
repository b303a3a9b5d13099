//! Distribution summary and reporting
//!
//! Tallies the terminal outcomes of a batch of pipeline runs.

use crate::core::pipeline::{PipelineFailure, PipelineOutcome};
use crate::domain::RunId;
use std::time::Duration;
use uuid::Uuid;

/// Summary of a batch of distribution runs
#[derive(Debug, Clone)]
pub struct DistributionSummary {
    /// Identifier of this batch, used to correlate logs
    pub batch_id: Uuid,

    pub total_records: usize,

    pub completed: usize,

    pub short_circuited: usize,

    /// Runs that failed, cancelled runs included
    pub failed: usize,

    /// Runs stopped at a stage boundary by a shutdown request
    pub cancelled: usize,

    pub duration: Duration,

    /// One entry per failed run
    pub errors: Vec<RecordError>,

    /// Whether a shutdown request interrupted the batch
    pub interrupted: bool,
}

impl DistributionSummary {
    pub fn new() -> Self {
        Self {
            batch_id: Uuid::new_v4(),
            total_records: 0,
            completed: 0,
            short_circuited: 0,
            failed: 0,
            cancelled: 0,
            duration: Duration::from_secs(0),
            errors: Vec::new(),
            interrupted: false,
        }
    }

    /// Set the duration
    pub fn with_duration(mut self, duration: Duration) -> Self {
        self.duration = duration;
        self
    }

    /// Count one run's outcome
    pub fn record(&mut self, run_id: &RunId, outcome: &PipelineOutcome) {
        self.total_records += 1;
        match outcome {
            PipelineOutcome::Completed(_) => self.completed += 1,
            PipelineOutcome::ShortCircuited(_) => self.short_circuited += 1,
            PipelineOutcome::Failed(failure) => {
                self.failed += 1;
                if failure.is_cancelled() {
                    self.cancelled += 1;
                    self.interrupted = true;
                }
                self.errors.push(RecordError::new(run_id.clone(), failure.clone()));
            }
        }
    }

    /// Whether every run completed or short-circuited
    pub fn is_successful(&self) -> bool {
        self.failed == 0
    }

    /// Share of runs that reached a non-failed terminal outcome, as a percentage
    pub fn success_rate(&self) -> f64 {
        if self.total_records == 0 {
            return 100.0;
        }
        ((self.completed + self.short_circuited) as f64 / self.total_records as f64) * 100.0
    }

    /// Log the summary
    pub fn log_summary(&self) {
        tracing::info!(
            batch_id = %self.batch_id,
            total = self.total_records,
            completed = self.completed,
            short_circuited = self.short_circuited,
            failed = self.failed,
            cancelled = self.cancelled,
            duration_secs = self.duration.as_secs(),
            success_rate = format!("{:.2}%", self.success_rate()),
            "Distribution batch finished"
        );

        for error in &self.errors {
            tracing::warn!(
                run_id = %error.run_id,
                stage = ?error.failure.stage,
                kind = %error.failure.kind,
                message = %error.failure.message,
                "Distribution run failed"
            );
        }
    }
}

impl Default for DistributionSummary {
    fn default() -> Self {
        Self::new()
    }
}

/// A failed run
#[derive(Debug, Clone)]
pub struct RecordError {
    pub run_id: RunId,
    pub failure: PipelineFailure,
}

impl RecordError {
    pub fn new(run_id: RunId, failure: PipelineFailure) -> Self {
        Self { run_id, failure }
    }
}
