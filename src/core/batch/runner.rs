//! Batch runner
//!
//! Runs many submissions through one orchestrator with bounded concurrency.
//! Each run id gets its own task, and a task that dies fails only its own
//! records.

use crate::core::batch::summary::DistributionSummary;
use crate::core::pipeline::{Orchestrator, PipelineFailure, PipelineOutcome};
use crate::domain::{DistributorError, ParticipantRecord, RunId};
use futures::stream::{self, StreamExt};
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Instant;

/// One record to distribute and the file it arrived in
#[derive(Debug, Clone)]
pub struct Submission {
    pub record: ParticipantRecord,
    pub file_origin: String,
}

impl Submission {
    pub fn new(record: ParticipantRecord, file_origin: impl Into<String>) -> Self {
        Self {
            record,
            file_origin: file_origin.into(),
        }
    }

    pub fn run_id(&self) -> RunId {
        RunId::for_submission(
            &self.file_origin,
            &self.record.nhs_number,
            &self.record.screening_id,
        )
    }
}

/// Bounded-concurrency runner over an [`Orchestrator`]
pub struct BatchRunner {
    orchestrator: Arc<Orchestrator>,
    max_concurrent: usize,
}

impl BatchRunner {
    pub fn new(orchestrator: Arc<Orchestrator>, max_concurrent: usize) -> Self {
        Self {
            orchestrator,
            max_concurrent: max_concurrent.max(1),
        }
    }

    /// Run every submission and summarise the outcomes
    ///
    /// Submissions sharing a run id share a checkpoint, so they run one after
    /// another in submission order; distinct run ids run concurrently.
    pub async fn run(&self, submissions: Vec<Submission>) -> DistributionSummary {
        let started = Instant::now();
        let mut summary = DistributionSummary::new();

        tracing::info!(
            batch_id = %summary.batch_id,
            records = submissions.len(),
            max_concurrent = self.max_concurrent,
            "Starting distribution batch"
        );

        let groups = group_by_run_id(submissions);

        let outcomes: Vec<(RunId, PipelineOutcome)> = stream::iter(groups)
            .map(|(run_id, group)| {
                let orchestrator = self.orchestrator.clone();
                let count = group.len();
                async move {
                    let handle = tokio::spawn(async move {
                        let mut outcomes = Vec::with_capacity(group.len());
                        for submission in group {
                            let outcome = orchestrator
                                .run(submission.record, &submission.file_origin)
                                .await;
                            outcomes.push(outcome);
                        }
                        outcomes
                    });

                    let outcomes = match handle.await {
                        Ok(outcomes) => outcomes,
                        Err(e) => {
                            tracing::error!(run_id = %run_id, error = %e, "Distribution task aborted");
                            let failure = PipelineFailure::new(
                                None,
                                &DistributorError::Other(format!("run task aborted: {e}")),
                            );
                            vec![PipelineOutcome::Failed(failure); count]
                        }
                    };
                    outcomes
                        .into_iter()
                        .map(|outcome| (run_id.clone(), outcome))
                        .collect::<Vec<_>>()
                }
            })
            .buffer_unordered(self.max_concurrent)
            .flat_map(stream::iter)
            .collect()
            .await;

        for (run_id, outcome) in &outcomes {
            summary.record(run_id, outcome);
        }

        let summary = summary.with_duration(started.elapsed());
        summary.log_summary();
        summary
    }
}

/// Group submissions by run id, keeping first-seen order across groups and
/// submission order within each group
fn group_by_run_id(submissions: Vec<Submission>) -> Vec<(RunId, Vec<Submission>)> {
    let mut index: HashMap<RunId, usize> = HashMap::new();
    let mut groups: Vec<(RunId, Vec<Submission>)> = Vec::new();

    for submission in submissions {
        let run_id = submission.run_id();
        match index.get(&run_id) {
            Some(&i) => groups[i].1.push(submission),
            None => {
                index.insert(run_id.clone(), groups.len());
                groups.push((run_id, vec![submission]));
            }
        }
    }

    let duplicates: usize = groups.iter().map(|(_, g)| g.len() - 1).sum();
    if duplicates > 0 {
        tracing::warn!(duplicates = duplicates, "Batch contains repeated submissions, running them in sequence");
    }
    groups
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{NhsNumber, RecordType, ScreeningId};

    fn submission(nhs: &str, postcode: &str) -> Submission {
        let record = ParticipantRecord::new(
            NhsNumber::new(nhs).unwrap(),
            ScreeningId::new("1").unwrap(),
            RecordType::New,
        )
        .with_postcode(postcode);
        Submission::new(record, "BSS_20240718.parquet")
    }

    #[test]
    fn test_group_by_run_id_keeps_order() {
        let groups = group_by_run_id(vec![
            submission("9990001112", "LS1 4AP"),
            submission("9990003334", "LS1 4AP"),
            submission("9990001112", "LS1 9ZZ"),
        ]);

        assert_eq!(groups.len(), 2);
        assert_eq!(groups[0].0.as_str(), "BSS_20240718.parquet_9990001112_1");
        assert_eq!(groups[0].1.len(), 2);
        assert_eq!(groups[0].1[1].record.postcode.as_deref(), Some("LS1 9ZZ"));
        assert_eq!(groups[1].1.len(), 1);
    }
}
