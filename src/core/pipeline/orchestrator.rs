//! Pipeline orchestrator
//!
//! Drives one participant record through
//! `Start → Reconciling → Allocating → Validating → Deciding → Transforming →
//! Persisting` and reports exactly one of `Completed`, `ShortCircuited` or
//! `Failed`. Fetch and reconciliation run concurrently, as do static and
//! lookup validation. Lookup validation runs under the retry policy.
//!
//! Every error raised by a stage is caught here, logged, written to the
//! exception sink as a system exception and turned into `Failed`; a panicking
//! stage is treated the same way. Cancellation is checked between stages only;
//! an in-flight call always completes.

use crate::adapters::factory::{create_http_collaborators, Collaborators};
use crate::config::{DistributorConfig, PipelineConfig};
use crate::core::allocation::ProviderAllocator;
use crate::core::parallel::{gather2, BranchFailure};
use crate::core::pipeline::context::PipelineContext;
use crate::core::pipeline::outcome::{
    PipelineFailure, PipelineOutcome, PipelineState, ShortCircuitReason,
};
use crate::core::retry::RetryPolicy;
use crate::core::stages::{
    AllocateProviderStage, FetchRecordStage, FlagExceptionStage, FlagRequest, LookupValidateStage,
    PersistRequest, PersistStage, ReconcileStage, Stage, StageContext, StageKind,
    StaticValidateStage, TransformStage,
};
use crate::core::state::{
    Checkpoint, CheckpointBuilder, CheckpointManager, CheckpointStatus, FileCheckpointStorage,
};
use crate::domain::{
    DistributorError, ParticipantRecord, Result, RulesType, SystemFailure, TransformRequest,
    ValidationRequest,
};
use crate::{log_error_with_context, log_stage_complete, log_stage_start};
use futures::FutureExt;
use std::future::Future;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use std::time::Instant;
use tokio::sync::watch;

/// Immutable run settings handed to the orchestrator at construction
#[derive(Debug, Clone)]
pub struct PipelineSettings {
    /// Continue past unresolved exceptions and fatal violations
    pub ignore_exceptions: bool,
    pub dry_run: bool,
    /// Value written to the persisted record's extracted flag
    pub extracted_to_bs_select: bool,
    pub screening_name: String,
    pub screening_acronym: String,
    pub lookup_rules_types: Vec<RulesType>,
    pub retry: RetryPolicy,
}

impl PipelineSettings {
    pub fn from_config(config: &DistributorConfig) -> Self {
        Self {
            ignore_exceptions: config.pipeline.ignore_exceptions,
            dry_run: config.application.dry_run,
            extracted_to_bs_select: config.pipeline.is_extracted_to_bs_select,
            screening_name: config.pipeline.screening_name.clone(),
            screening_acronym: config.pipeline.screening_acronym.clone(),
            lookup_rules_types: config.pipeline.lookup_rules_types.clone(),
            retry: RetryPolicy::from(&config.retry),
        }
    }
}

impl Default for PipelineSettings {
    fn default() -> Self {
        let pipeline = PipelineConfig::default();
        Self {
            ignore_exceptions: pipeline.ignore_exceptions,
            dry_run: false,
            extracted_to_bs_select: pipeline.is_extracted_to_bs_select,
            screening_name: pipeline.screening_name,
            screening_acronym: pipeline.screening_acronym,
            lookup_rules_types: pipeline.lookup_rules_types,
            retry: RetryPolicy::default(),
        }
    }
}

/// A stage error together with the stage that raised it
struct Failure {
    stage: Option<StageKind>,
    error: DistributorError,
}

impl Failure {
    fn at(stage: StageKind) -> impl FnOnce(DistributorError) -> Failure {
        move |error| Failure {
            stage: Some(stage),
            error,
        }
    }
}

impl From<BranchFailure<StageKind>> for Failure {
    fn from(failure: BranchFailure<StageKind>) -> Self {
        Failure {
            stage: Some(failure.branch),
            error: failure.error,
        }
    }
}

type Step<T> = std::result::Result<T, Failure>;

/// Turn a panic inside a stage into an ordinary error
async fn contain_panic<T>(stage: StageKind, fut: impl Future<Output = Result<T>>) -> Result<T> {
    match AssertUnwindSafe(fut).catch_unwind().await {
        Ok(result) => result,
        Err(payload) => {
            let detail = payload
                .downcast_ref::<&str>()
                .map(|s| s.to_string())
                .or_else(|| payload.downcast_ref::<String>().cloned())
                .unwrap_or_else(|| "non-string panic payload".to_string());
            Err(DistributorError::Other(format!("{stage} panicked: {detail}")))
        }
    }
}

fn require<T>(value: Option<T>, field: &str) -> Result<T> {
    value.ok_or_else(|| DistributorError::State(format!("pipeline context is missing {field}")))
}

/// One run in flight
struct Run {
    context: PipelineContext,
    checkpoint: Option<Checkpoint>,
}

enum Start {
    Cached(PipelineOutcome),
    Fresh(Run),
}

/// Stage-sequenced orchestration engine
pub struct Orchestrator {
    settings: PipelineSettings,
    fetch: FetchRecordStage,
    reconcile: ReconcileStage,
    allocate: AllocateProviderStage,
    static_validate: StaticValidateStage,
    lookup_validate: LookupValidateStage,
    transform: TransformStage,
    persist: PersistStage,
    flag: FlagExceptionStage,
    checkpoints: Option<CheckpointManager>,
    shutdown: Option<watch::Receiver<bool>>,
}

impl Orchestrator {
    pub fn new(
        collaborators: Collaborators,
        allocator: Arc<ProviderAllocator>,
        settings: PipelineSettings,
    ) -> Self {
        let Collaborators {
            participants,
            distributions,
            static_rules,
            lookup_rules,
            transformer,
            exceptions,
        } = collaborators;

        Self {
            fetch: FetchRecordStage::new(
                participants.clone(),
                &settings.screening_name,
                &settings.screening_acronym,
            ),
            reconcile: ReconcileStage::new(distributions.clone()),
            allocate: AllocateProviderStage::new(allocator),
            static_validate: StaticValidateStage::new(static_rules),
            lookup_validate: LookupValidateStage::new(
                lookup_rules,
                settings.lookup_rules_types.clone(),
            ),
            transform: TransformStage::new(transformer),
            persist: PersistStage::new(
                distributions,
                settings.extracted_to_bs_select,
                settings.dry_run,
            ),
            flag: FlagExceptionStage::new(exceptions, participants, settings.dry_run),
            settings,
            checkpoints: None,
            shutdown: None,
        }
    }

    /// Build an orchestrator with HTTP collaborators from configuration
    ///
    /// # Errors
    ///
    /// Returns an error if the allocation rules cannot be loaded or an HTTP
    /// client cannot be built.
    pub fn from_config(config: &DistributorConfig) -> Result<Self> {
        let collaborators = create_http_collaborators(&config.services)?;
        let allocator = Arc::new(ProviderAllocator::from_file(
            &config.pipeline.allocation_config_path,
        )?);

        let orchestrator = Self::new(collaborators, allocator, PipelineSettings::from_config(config));

        Ok(if config.state.enable_checkpointing {
            let storage = FileCheckpointStorage::new(&config.state.checkpoint_dir);
            orchestrator.with_checkpoints(CheckpointManager::new(Arc::new(storage)))
        } else {
            orchestrator
        })
    }

    /// Persist a checkpoint after every state transition
    pub fn with_checkpoints(mut self, manager: CheckpointManager) -> Self {
        self.checkpoints = Some(manager);
        self
    }

    /// Stop at the next stage boundary once the receiver reads `true`
    pub fn with_shutdown(mut self, shutdown: watch::Receiver<bool>) -> Self {
        self.shutdown = Some(shutdown);
        self
    }

    pub fn settings(&self) -> &PipelineSettings {
        &self.settings
    }

    /// Run one participant record through the pipeline
    pub async fn run(&self, record: ParticipantRecord, file_origin: &str) -> PipelineOutcome {
        let ctx = StageContext::new(
            record.nhs_number.clone(),
            record.screening_id.clone(),
            file_origin,
        );
        let started = Instant::now();

        tracing::info!(
            run_id = %ctx.run_id,
            record_type = %record.record_type,
            "Starting distribution run"
        );

        let mut run = match self.start(&ctx, record).await {
            Start::Cached(outcome) => return outcome,
            Start::Fresh(run) => run,
        };

        let outcome = match self.drive(&ctx, &mut run).await {
            Ok(outcome) => outcome,
            Err(failure) => self.fail(&ctx, &run, failure).await,
        };

        self.checkpoint(&mut run, outcome.state(), Some(outcome.clone()))
            .await;

        tracing::info!(
            run_id = %ctx.run_id,
            outcome = %outcome.state(),
            duration_ms = started.elapsed().as_millis() as u64,
            "Distribution run finished"
        );
        outcome
    }

    /// Look for a checkpoint to resume from
    async fn start(&self, ctx: &StageContext, record: ParticipantRecord) -> Start {
        let Some(manager) = self.checkpoint_manager() else {
            return Start::Fresh(Run {
                context: PipelineContext::new(record, &ctx.file_origin),
                checkpoint: None,
            });
        };

        let stored = match manager.load(&ctx.run_id).await {
            Ok(stored) => stored,
            Err(e) => {
                tracing::warn!(run_id = %ctx.run_id, error = %e, "Failed to load checkpoint, starting fresh");
                None
            }
        };

        if let Some(checkpoint) = stored {
            match checkpoint.status {
                CheckpointStatus::Completed => {
                    if let Some(outcome @ PipelineOutcome::Completed(_)) = &checkpoint.outcome {
                        tracing::info!(run_id = %ctx.run_id, "Run already completed, returning stored outcome");
                        return Start::Cached(outcome.clone());
                    }
                    tracing::warn!(run_id = %ctx.run_id, "Completed checkpoint has no outcome, starting fresh");
                }
                CheckpointStatus::InProgress | CheckpointStatus::Failed => {
                    if checkpoint.context.record() == &record {
                        tracing::info!(
                            run_id = %ctx.run_id,
                            state = %checkpoint.state,
                            status = %checkpoint.status,
                            "Resuming run from checkpoint"
                        );
                        let mut context = checkpoint.context.clone();
                        if checkpoint.status == CheckpointStatus::Failed {
                            // Reads are side-effect free; pick up corrected upstream data
                            context.discard_unvalidated_reads();
                        }
                        return Start::Fresh(Run {
                            context,
                            checkpoint: Some(checkpoint),
                        });
                    }
                    tracing::info!(run_id = %ctx.run_id, "Submitted record changed since checkpoint, starting fresh");
                }
                CheckpointStatus::ShortCircuited => {
                    tracing::debug!(run_id = %ctx.run_id, "Discarding short-circuited checkpoint");
                }
            }
        }

        let context = PipelineContext::new(record, &ctx.file_origin);
        let checkpoint = match CheckpointBuilder::new(ctx.run_id.clone(), context.clone()).build() {
            Ok(checkpoint) => Some(checkpoint),
            Err(e) => {
                tracing::warn!(run_id = %ctx.run_id, error = %e, "Failed to create checkpoint");
                None
            }
        };

        let mut run = Run {
            context,
            checkpoint,
        };
        self.checkpoint(&mut run, PipelineState::Start, None).await;
        Start::Fresh(run)
    }

    /// The state machine proper
    async fn drive(&self, ctx: &StageContext, run: &mut Run) -> Step<PipelineOutcome> {
        // Reconciling
        self.checkpoint(run, PipelineState::Reconciling, None).await;
        self.fetch_and_reconcile(ctx, run).await?;

        // Allocating
        self.checkpoint(run, PipelineState::Allocating, None).await;
        if run.context.allocated_provider().is_none() {
            self.ensure_running(StageKind::AllocateProvider)?;
            let participant = run.context.participant().clone();
            let provider = self.step(&self.allocate, ctx, participant).await?;
            run.context
                .set_allocated_provider(provider)
                .map_err(Failure::at(StageKind::AllocateProvider))?;
        }

        if run.context.has_unresolved_exception() && !self.settings.ignore_exceptions {
            tracing::info!(run_id = %ctx.run_id, "Participant has an unresolved exception, skipping validation");
            return Ok(PipelineOutcome::ShortCircuited(
                ShortCircuitReason::UnresolvedException,
            ));
        }

        // Validating, then Deciding
        if run.context.aggregated_validation().is_none() {
            self.checkpoint(run, PipelineState::Validating, None).await;
            self.validate(ctx, run).await?;
        }
        self.checkpoint(run, PipelineState::Deciding, None).await;

        let fatal = run
            .context
            .aggregated_validation()
            .is_some_and(|outcome| outcome.is_fatal());
        if fatal {
            if !self.settings.ignore_exceptions {
                tracing::info!(run_id = %ctx.run_id, "Fatal validation outcome, short-circuiting");
                return Ok(PipelineOutcome::ShortCircuited(
                    ShortCircuitReason::FatalValidation,
                ));
            }
            tracing::warn!(run_id = %ctx.run_id, "Fatal validation outcome ignored by configuration");
        }

        // Transforming
        self.checkpoint(run, PipelineState::Transforming, None).await;
        if run.context.transformed_record().is_none() {
            self.ensure_running(StageKind::Transform)?;
            let request = Self::transform_request(&run.context).map_err(Failure::at(StageKind::Transform))?;
            let transformed = self.step(&self.transform, ctx, request).await?;
            run.context
                .set_transformed_record(transformed)
                .map_err(Failure::at(StageKind::Transform))?;
        }

        // Persisting
        self.checkpoint(run, PipelineState::Persisting, None).await;
        self.ensure_running(StageKind::Persist)?;
        let request = Self::persist_request(&run.context).map_err(Failure::at(StageKind::Persist))?;
        let persisted = self.step(&self.persist, ctx, request).await?;

        Ok(PipelineOutcome::Completed(persisted))
    }

    async fn fetch_and_reconcile(&self, ctx: &StageContext, run: &mut Run) -> Step<()> {
        let need_fetch = run.context.fetched_record().is_none();
        let need_previous = run.context.previous_distribution().is_none();

        match (need_fetch, need_previous) {
            (false, false) => return Ok(()),
            (true, true) => {
                self.ensure_running(StageKind::FetchRecord)?;
                let (fetched, previous) = gather2(
                    (StageKind::FetchRecord, self.invoke(&self.fetch, ctx, ())),
                    (StageKind::Reconcile, self.invoke(&self.reconcile, ctx, ())),
                )
                .await?;
                run.context
                    .set_fetched_record(fetched)
                    .map_err(Failure::at(StageKind::FetchRecord))?;
                run.context
                    .set_previous_distribution(previous)
                    .map_err(Failure::at(StageKind::Reconcile))?;
            }
            (true, false) => {
                self.ensure_running(StageKind::FetchRecord)?;
                let fetched = self.step(&self.fetch, ctx, ()).await?;
                run.context
                    .set_fetched_record(fetched)
                    .map_err(Failure::at(StageKind::FetchRecord))?;
            }
            (false, true) => {
                self.ensure_running(StageKind::Reconcile)?;
                let previous = self.step(&self.reconcile, ctx, ()).await?;
                run.context
                    .set_previous_distribution(previous)
                    .map_err(Failure::at(StageKind::Reconcile))?;
            }
        }
        Ok(())
    }

    /// Static and lookup validation, merge, then flag any violations
    async fn validate(&self, ctx: &StageContext, run: &mut Run) -> Step<()> {
        self.ensure_running(StageKind::StaticValidate)?;
        let request = Self::validation_request(&run.context).map_err(Failure::at(StageKind::StaticValidate))?;

        let lookup = || self.invoke(&self.lookup_validate, ctx, request.clone());
        let (static_outcome, lookup_outcome) = gather2(
            (
                StageKind::StaticValidate,
                self.invoke(&self.static_validate, ctx, request.clone()),
            ),
            (
                StageKind::LookupValidate,
                self.settings
                    .retry
                    .execute(StageKind::LookupValidate.as_str(), lookup),
            ),
        )
        .await?;

        let merged = static_outcome.merge(lookup_outcome);
        tracing::info!(
            run_id = %ctx.run_id,
            violations = merged.violations().len(),
            fatal = merged.is_fatal(),
            "Validation merged"
        );

        if !merged.is_empty() {
            self.ensure_running(StageKind::FlagException)?;
            let flag = FlagRequest::Validation {
                outcome: merged.clone(),
                record: run.context.participant().clone(),
            };
            self.step(&self.flag, ctx, flag).await?;
        }

        run.context
            .set_aggregated_validation(merged)
            .map_err(Failure::at(StageKind::LookupValidate))
    }

    /// Turn a failure into the terminal outcome, logging a system exception
    /// unless the run was cancelled
    async fn fail(&self, ctx: &StageContext, run: &Run, failure: Failure) -> PipelineOutcome {
        let Failure { stage, error } = failure;
        let outcome = PipelineOutcome::Failed(PipelineFailure::new(stage, &error));

        if error.is_cancelled() {
            tracing::warn!(run_id = %ctx.run_id, error = %error, "Run cancelled at stage boundary");
            return outcome;
        }

        log_error_with_context!(&error, format!("Run {} failed", ctx.run_id));

        let stage_name = stage.map(|s| s.as_str()).unwrap_or("orchestrator");
        let request = FlagRequest::System {
            failure: SystemFailure::new(stage_name, &error),
            record: run.context.participant().clone(),
        };
        match contain_panic(StageKind::FlagException, self.flag.execute(ctx, request)).await {
            Ok(report) if report.sink_accepted => {}
            Ok(_) => tracing::warn!(run_id = %ctx.run_id, "System exception was not accepted by the sink"),
            Err(e) => tracing::warn!(run_id = %ctx.run_id, error = %e, "Failed to log system exception"),
        }

        outcome
    }

    /// Execute a stage with start/complete logging
    async fn invoke<S: Stage>(&self, stage: &S, ctx: &StageContext, input: S::Input) -> Result<S::Output> {
        log_stage_start!(ctx.run_id, S::KIND);
        let started = Instant::now();
        let output = contain_panic(S::KIND, stage.execute(ctx, input)).await?;
        log_stage_complete!(ctx.run_id, S::KIND, started.elapsed());
        Ok(output)
    }

    async fn step<S: Stage>(&self, stage: &S, ctx: &StageContext, input: S::Input) -> Step<S::Output> {
        self.invoke(stage, ctx, input)
            .await
            .map_err(Failure::at(S::KIND))
    }

    fn ensure_running(&self, next: StageKind) -> Step<()> {
        let cancelled = self.shutdown.as_ref().is_some_and(|rx| *rx.borrow());
        if cancelled {
            return Err(Failure {
                stage: None,
                error: DistributorError::Cancelled(format!("shutdown requested before {next}")),
            });
        }
        Ok(())
    }

    /// Dry runs write nothing, checkpoints included
    fn checkpoint_manager(&self) -> Option<&CheckpointManager> {
        if self.settings.dry_run {
            return None;
        }
        self.checkpoints.as_ref()
    }

    /// Record a state transition; checkpoint failures never fail the run
    async fn checkpoint(&self, run: &mut Run, state: PipelineState, outcome: Option<PipelineOutcome>) {
        let (Some(manager), Some(checkpoint)) = (self.checkpoint_manager(), run.checkpoint.as_mut()) else {
            return;
        };

        let result = match checkpoint.advance(state, run.context.clone(), outcome) {
            Ok(()) => manager.save(checkpoint).await,
            Err(e) => Err(e),
        };
        if let Err(e) = result {
            tracing::warn!(run_id = %checkpoint.run_id, state = %state, error = %e, "Failed to write checkpoint");
        }
    }

    fn validation_request(context: &PipelineContext) -> Result<ValidationRequest> {
        Ok(ValidationRequest {
            participant: context.participant().clone(),
            previous_participant: require(context.previous_distribution(), "previous distribution")?.clone(),
            file_name: context.file_origin().to_string(),
            service_provider: require(context.allocated_provider(), "allocated provider")?.to_string(),
            rules_type: None,
        })
    }

    fn transform_request(context: &PipelineContext) -> Result<TransformRequest> {
        Ok(TransformRequest {
            participant: context.participant().clone(),
            service_provider: require(context.allocated_provider(), "allocated provider")?.to_string(),
            existing_participant: require(context.previous_distribution(), "previous distribution")?.clone(),
        })
    }

    fn persist_request(context: &PipelineContext) -> Result<PersistRequest> {
        let transformed = require(context.transformed_record(), "transformed record")?;
        let previous = require(context.previous_distribution(), "previous distribution")?;
        Ok(PersistRequest::new(transformed.clone(), previous))
    }
}
