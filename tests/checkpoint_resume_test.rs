//! Crash-resume through durable checkpoints

mod common;

use cohort_distributor::core::pipeline::{PipelineOutcome, PipelineSettings, PipelineState};
use cohort_distributor::core::state::{
    CheckpointManager, CheckpointStatus, CheckpointStorage, FileCheckpointStorage,
    MemoryCheckpointStorage,
};
use cohort_distributor::core::stages::StageKind;
use cohort_distributor::domain::{ParticipantRecord, RecordType, RunId, Violation};
use common::{inbound, nhs, screening, settings, Harness, FILE_ORIGIN};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;

fn run_id() -> RunId {
    RunId::for_submission(FILE_ORIGIN, &nhs(), &screening())
}

fn manager(storage: &Arc<MemoryCheckpointStorage>) -> CheckpointManager {
    CheckpointManager::new(storage.clone())
}

#[tokio::test]
async fn test_completed_run_returns_stored_outcome() {
    let harness = Harness::new();
    let storage = Arc::new(MemoryCheckpointStorage::new());
    let orchestrator = harness.orchestrator().with_checkpoints(manager(&storage));

    let first = orchestrator.run(inbound(), FILE_ORIGIN).await;
    let second = orchestrator.run(inbound(), FILE_ORIGIN).await;

    assert!(first.is_completed());
    assert_eq!(first, second);
    assert_eq!(harness.participants.fetch_calls(), 1);
    assert_eq!(harness.distributions.added().len(), 1);

    let stored = storage.load(&run_id()).await.unwrap().unwrap();
    assert_eq!(stored.status, CheckpointStatus::Completed);
    assert_eq!(stored.state, PipelineState::Completed);
}

#[tokio::test]
async fn test_failed_run_resumes_after_last_completed_stage() {
    let harness = Harness::new();
    harness.transformer.set_empty(true);
    let storage = Arc::new(MemoryCheckpointStorage::new());
    let orchestrator = harness.orchestrator().with_checkpoints(manager(&storage));

    let first = orchestrator.run(inbound(), FILE_ORIGIN).await;
    assert!(first.is_failed());
    let stored = storage.load(&run_id()).await.unwrap().unwrap();
    assert_eq!(stored.status, CheckpointStatus::Failed);
    assert!(stored.context.aggregated_validation().is_some());

    harness.transformer.set_empty(false);
    let second = orchestrator.run(inbound(), FILE_ORIGIN).await;

    assert!(second.is_completed());
    // Reconciliation and validation were not repeated
    assert_eq!(harness.participants.fetch_calls(), 1);
    assert_eq!(harness.distributions.latest_calls(), 1);
    assert_eq!(harness.static_rules.calls(), 1);
    assert_eq!(harness.lookup_rules.calls(), 1);
    assert_eq!(harness.transformer.calls(), 2);
    assert_eq!(harness.distributions.added().len(), 1);
}

#[tokio::test]
async fn test_failure_before_validation_rereads_participant_on_resume() {
    let harness = Harness::new();
    // Stored participant has no postcode
    *harness.participants.record.lock().unwrap() =
        Some(ParticipantRecord::new(nhs(), screening(), RecordType::New));
    let storage = Arc::new(MemoryCheckpointStorage::new());
    let orchestrator = harness.orchestrator().with_checkpoints(manager(&storage));

    let first = orchestrator.run(inbound(), FILE_ORIGIN).await;
    assert_eq!(
        first.failure().and_then(|f| f.stage),
        Some(StageKind::AllocateProvider)
    );

    // The store is corrected; the same submission now allocates
    *harness.participants.record.lock().unwrap() = Some(inbound());
    let second = orchestrator.run(inbound(), FILE_ORIGIN).await;

    assert!(second.is_completed(), "{second:?}");
    assert_eq!(harness.participants.fetch_calls(), 2);
    assert_eq!(harness.distributions.latest_calls(), 2);
}

#[tokio::test]
async fn test_resume_does_not_reflag_violations() {
    let harness = Harness::new();
    harness
        .lookup_rules
        .answer(vec![Violation::non_fatal(54, "GP practice unknown")]);
    harness.transformer.set_empty(true);
    let storage = Arc::new(MemoryCheckpointStorage::new());
    let orchestrator = harness.orchestrator().with_checkpoints(manager(&storage));

    orchestrator.run(inbound(), FILE_ORIGIN).await;
    harness.transformer.set_empty(false);
    let outcome = orchestrator.run(inbound(), FILE_ORIGIN).await;

    assert!(outcome.is_completed());
    assert_eq!(harness.sink.validation_calls().len(), 1);
}

#[tokio::test]
async fn test_short_circuited_run_starts_fresh() {
    let harness = Harness::new();
    harness
        .static_rules
        .answer(vec![Violation::fatal(30, "Postcode not recognised")]);
    let storage = Arc::new(MemoryCheckpointStorage::new());
    let orchestrator = harness.orchestrator().with_checkpoints(manager(&storage));

    let first = orchestrator.run(inbound(), FILE_ORIGIN).await;
    assert!(first.is_short_circuited());

    harness.static_rules.answer(Vec::new());
    let second = orchestrator.run(inbound(), FILE_ORIGIN).await;

    assert!(second.is_completed());
    assert_eq!(harness.participants.fetch_calls(), 2);
    assert_eq!(harness.static_rules.calls(), 2);
}

#[tokio::test]
async fn test_changed_record_starts_fresh() {
    let harness = Harness::new();
    harness.transformer.set_empty(true);
    let storage = Arc::new(MemoryCheckpointStorage::new());
    let orchestrator = harness.orchestrator().with_checkpoints(manager(&storage));

    orchestrator.run(inbound(), FILE_ORIGIN).await;
    harness.transformer.set_empty(false);
    let amended = inbound().with_postcode("LS1 9ZZ");
    let outcome = orchestrator.run(amended, FILE_ORIGIN).await;

    assert!(outcome.is_completed());
    assert_eq!(harness.participants.fetch_calls(), 2);
}

#[tokio::test]
async fn test_tampered_checkpoint_is_ignored() {
    let harness = Harness::new();
    let storage = Arc::new(MemoryCheckpointStorage::new());
    let orchestrator = harness.orchestrator().with_checkpoints(manager(&storage));

    orchestrator.run(inbound(), FILE_ORIGIN).await;

    let mut stored = storage.load(&run_id()).await.unwrap().unwrap();
    stored.checksum = "0".repeat(64);
    storage.insert_raw(stored).await;

    let outcome = orchestrator.run(inbound(), FILE_ORIGIN).await;

    assert!(outcome.is_completed());
    assert_eq!(harness.participants.fetch_calls(), 2);
    assert_eq!(harness.distributions.added().len(), 2);
}

#[tokio::test]
async fn test_cancelled_run_stays_in_progress() {
    let harness = Harness::new();
    harness.lookup_rules.set_delay(Duration::from_millis(80));
    let storage = Arc::new(MemoryCheckpointStorage::new());
    let (tx, rx) = watch::channel(false);
    let orchestrator = harness
        .orchestrator()
        .with_checkpoints(manager(&storage))
        .with_shutdown(rx);

    let signal = tokio::spawn(async move {
        tokio::time::sleep(Duration::from_millis(20)).await;
        tx.send(true).unwrap();
        tx
    });
    let outcome = orchestrator.run(inbound(), FILE_ORIGIN).await;
    let _tx = signal.await.unwrap();

    assert!(outcome.failure().is_some_and(|f| f.is_cancelled()));
    let stored = storage.load(&run_id()).await.unwrap().unwrap();
    assert_eq!(stored.status, CheckpointStatus::InProgress);

    // A later run picks up after validation
    let resumed = harness
        .orchestrator()
        .with_checkpoints(manager(&storage))
        .run(inbound(), FILE_ORIGIN)
        .await;
    assert!(resumed.is_completed());
    assert_eq!(harness.lookup_rules.calls(), 1);
}

#[tokio::test]
async fn test_dry_run_writes_no_checkpoints() {
    let harness = Harness::new();
    let storage = Arc::new(MemoryCheckpointStorage::new());
    let orchestrator = harness
        .orchestrator_with(PipelineSettings {
            dry_run: true,
            ..settings()
        })
        .with_checkpoints(manager(&storage));

    let outcome = orchestrator.run(inbound(), FILE_ORIGIN).await;

    assert!(matches!(outcome, PipelineOutcome::Completed(_)));
    assert!(storage.list().await.unwrap().is_empty());
}

#[tokio::test]
async fn test_file_checkpoints_survive_a_new_orchestrator() {
    let dir = tempfile::tempdir().unwrap();
    let harness = Harness::new();
    harness.transformer.set_empty(true);

    let file_manager = || CheckpointManager::new(Arc::new(FileCheckpointStorage::new(dir.path())));

    let first = harness
        .orchestrator()
        .with_checkpoints(file_manager())
        .run(inbound(), FILE_ORIGIN)
        .await;
    assert!(first.is_failed());

    harness.transformer.set_empty(false);
    let second = harness
        .orchestrator()
        .with_checkpoints(file_manager())
        .run(inbound(), FILE_ORIGIN)
        .await;

    assert!(second.is_completed());
    assert_eq!(harness.static_rules.calls(), 1);

    let completed = file_manager()
        .list(Some(CheckpointStatus::Completed))
        .await
        .unwrap();
    assert_eq!(completed.len(), 1);
    assert_eq!(completed[0].run_id, run_id());
}
