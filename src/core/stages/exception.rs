//! FlagException stage
//!
//! The one stage allowed two external calls: the exception sink write, then
//! (for fatal validation outcomes) raising the participant's exception flag in
//! the participant management store. Each sub-call reports separately and
//! neither failure is propagated, so logging an exception can never change
//! the outcome of a run.

use crate::adapters::traits::{ExceptionSink, ParticipantStore};
use crate::core::stages::{Stage, StageContext, StageKind};
use crate::domain::{ExceptionFlag, ParticipantRecord, Result, SystemFailure, ValidationOutcome};
use async_trait::async_trait;
use std::sync::Arc;

/// What to flag
#[derive(Debug, Clone)]
pub enum FlagRequest {
    /// Rule violations raised by validation
    Validation {
        outcome: ValidationOutcome,
        record: ParticipantRecord,
    },
    /// An unexpected failure of the run
    System {
        failure: SystemFailure,
        record: ParticipantRecord,
    },
}

/// Result of each sub-call
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct FlagReport {
    /// Whether the exception sink accepted the entry
    pub sink_accepted: bool,
    /// Whether the participant flag update was accepted; `None` when not attempted
    pub flag_updated: Option<bool>,
}

pub struct FlagExceptionStage {
    sink: Arc<dyn ExceptionSink>,
    participants: Arc<dyn ParticipantStore>,
    dry_run: bool,
}

impl FlagExceptionStage {
    pub fn new(
        sink: Arc<dyn ExceptionSink>,
        participants: Arc<dyn ParticipantStore>,
        dry_run: bool,
    ) -> Self {
        Self {
            sink,
            participants,
            dry_run,
        }
    }

    async fn raise_flag(&self, ctx: &StageContext, record: &ParticipantRecord) -> Option<bool> {
        if self.dry_run {
            tracing::info!(run_id = %ctx.run_id, "Dry run: skipping exception flag update");
            return None;
        }

        let flagged = record.clone().with_exception_flag(ExceptionFlag::Active);
        match self.participants.update_participant(&flagged).await {
            Ok(accepted) => {
                if !accepted {
                    tracing::warn!(run_id = %ctx.run_id, "Participant store rejected exception flag update");
                }
                Some(accepted)
            }
            Err(e) => {
                tracing::warn!(run_id = %ctx.run_id, error = %e, "Failed to update exception flag");
                Some(false)
            }
        }
    }
}

#[async_trait]
impl Stage for FlagExceptionStage {
    type Input = FlagRequest;
    type Output = FlagReport;

    const KIND: StageKind = StageKind::FlagException;

    async fn execute(&self, ctx: &StageContext, request: FlagRequest) -> Result<FlagReport> {
        match request {
            FlagRequest::Validation { outcome, record } => {
                let sink_accepted = match self
                    .sink
                    .log_validation_exception(outcome.violations(), &record, &ctx.file_origin)
                    .await
                {
                    Ok(accepted) => accepted,
                    Err(e) => {
                        tracing::warn!(run_id = %ctx.run_id, error = %e, "Failed to log validation exception");
                        false
                    }
                };

                let flag_updated = if outcome.is_fatal() {
                    self.raise_flag(ctx, &record).await
                } else {
                    None
                };

                tracing::info!(
                    run_id = %ctx.run_id,
                    violations = outcome.violations().len(),
                    fatal = outcome.is_fatal(),
                    sink_accepted = sink_accepted,
                    flag_updated = ?flag_updated,
                    "Validation exception flagged"
                );

                Ok(FlagReport {
                    sink_accepted,
                    flag_updated,
                })
            }
            FlagRequest::System { failure, record } => {
                let sink_accepted = match self
                    .sink
                    .log_system_exception(&failure, &record, &ctx.file_origin)
                    .await
                {
                    Ok(accepted) => accepted,
                    Err(e) => {
                        tracing::warn!(run_id = %ctx.run_id, error = %e, "Failed to log system exception");
                        false
                    }
                };

                Ok(FlagReport {
                    sink_accepted,
                    flag_updated: None,
                })
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::stages::fakes::{ctx, participant, FakeParticipants, FakeSink};
    use crate::domain::{DistributorError, Violation};

    fn stage(sink: Arc<FakeSink>, participants: Arc<FakeParticipants>, dry_run: bool) -> FlagExceptionStage {
        FlagExceptionStage::new(sink, participants, dry_run)
    }

    #[tokio::test]
    async fn test_non_fatal_logs_without_flag_update() {
        let sink = Arc::new(FakeSink {
            accept: true,
            ..Default::default()
        });
        let participants = Arc::new(FakeParticipants::default());

        let report = stage(sink.clone(), participants.clone(), false)
            .execute(
                &ctx(),
                FlagRequest::Validation {
                    outcome: ValidationOutcome::new(vec![Violation::non_fatal(3, "missing GP")]),
                    record: participant(),
                },
            )
            .await
            .unwrap();

        assert_eq!(report, FlagReport { sink_accepted: true, flag_updated: None });
        assert_eq!(sink.validation_calls.lock().unwrap().len(), 1);
        assert!(participants.updates.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_fatal_raises_flag() {
        let sink = Arc::new(FakeSink {
            accept: true,
            ..Default::default()
        });
        let participants = Arc::new(FakeParticipants {
            accept_update: true,
            ..Default::default()
        });

        let report = stage(sink, participants.clone(), false)
            .execute(
                &ctx(),
                FlagRequest::Validation {
                    outcome: ValidationOutcome::new(vec![Violation::fatal(35, "invalid provider")]),
                    record: participant(),
                },
            )
            .await
            .unwrap();

        assert_eq!(report.flag_updated, Some(true));
        let updates = participants.updates.lock().unwrap();
        assert_eq!(updates[0].exception_flag, ExceptionFlag::Active);
    }

    #[tokio::test]
    async fn test_sub_call_failures_reported_separately() {
        let sink = Arc::new(FakeSink {
            fail: true,
            ..Default::default()
        });
        let participants = Arc::new(FakeParticipants {
            accept_update: true,
            ..Default::default()
        });

        let report = stage(sink, participants, false)
            .execute(
                &ctx(),
                FlagRequest::Validation {
                    outcome: ValidationOutcome::new(vec![Violation::fatal(35, "invalid provider")]),
                    record: participant(),
                },
            )
            .await
            .unwrap();

        assert_eq!(report, FlagReport { sink_accepted: false, flag_updated: Some(true) });
    }

    #[tokio::test]
    async fn test_dry_run_skips_flag_update() {
        let participants = Arc::new(FakeParticipants::default());
        let report = stage(Arc::new(FakeSink::default()), participants.clone(), true)
            .execute(
                &ctx(),
                FlagRequest::Validation {
                    outcome: ValidationOutcome::new(vec![Violation::fatal(35, "invalid provider")]),
                    record: participant(),
                },
            )
            .await
            .unwrap();

        assert_eq!(report.flag_updated, None);
        assert!(participants.updates.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_system_exception_goes_to_sink_only() {
        let sink = Arc::new(FakeSink {
            accept: true,
            ..Default::default()
        });
        let participants = Arc::new(FakeParticipants::default());
        let failure = SystemFailure::new("transform", &DistributorError::EmptyTransform("9990001112".into()));

        let report = stage(sink.clone(), participants.clone(), false)
            .execute(&ctx(), FlagRequest::System { failure, record: participant() })
            .await
            .unwrap();

        assert!(report.sink_accepted);
        assert_eq!(sink.system_calls.lock().unwrap().len(), 1);
        assert!(participants.updates.lock().unwrap().is_empty());
    }
}
