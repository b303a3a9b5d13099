//! Recording collaborators shared by the integration tests

#![allow(dead_code)]

use async_trait::async_trait;
use cohort_distributor::adapters::{
    Collaborators, DistributionStore, ExceptionSink, ParticipantStore, RuleService,
    TransformService,
};
use cohort_distributor::core::allocation::{AllocationRule, ProviderAllocator};
use cohort_distributor::core::pipeline::{Orchestrator, PipelineSettings};
use cohort_distributor::core::retry::RetryPolicy;
use cohort_distributor::domain::{
    DistributionRecord, DistributorError, NhsNumber, ParticipantRecord, RecordType, Result,
    ScreeningId, ServiceError, SystemFailure, TransformRequest, ValidationOutcome,
    ValidationRequest, Violation,
};
use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

pub const FILE_ORIGIN: &str = "BSS_20240718.parquet";
pub const LEEDS_PROVIDER: &str = "Leeds Central BSU";

pub fn nhs() -> NhsNumber {
    NhsNumber::new("9990001112").unwrap()
}

pub fn screening() -> ScreeningId {
    ScreeningId::new("1").unwrap()
}

/// Inbound record as it arrives from the file
pub fn inbound() -> ParticipantRecord {
    ParticipantRecord::new(nhs(), screening(), RecordType::New).with_postcode("LS1 4AP")
}

pub fn allocator() -> Arc<ProviderAllocator> {
    Arc::new(ProviderAllocator::new(vec![AllocationRule {
        postcode: "LS1".to_string(),
        screening_service: "BSS".to_string(),
        service_provider: LEEDS_PROVIDER.to_string(),
    }]))
}

/// Settings with a short retry schedule
pub fn settings() -> PipelineSettings {
    PipelineSettings {
        retry: RetryPolicy::new(3, Duration::from_millis(20), 2.0),
        ..PipelineSettings::default()
    }
}

fn unavailable(service: &str, attempt: u32) -> DistributorError {
    ServiceError::ServerError {
        service: service.to_string(),
        status: 503,
        message: format!("service unavailable on attempt {attempt}"),
    }
    .into()
}

fn sink_down() -> DistributorError {
    ServiceError::ConnectionFailed {
        service: "exception-sink".to_string(),
        message: "connection refused".to_string(),
    }
    .into()
}

pub struct RecordingParticipants {
    pub record: Mutex<Option<ParticipantRecord>>,
    pub fetch_calls: AtomicU32,
    pub updates: Mutex<Vec<ParticipantRecord>>,
}

impl RecordingParticipants {
    pub fn fetch_calls(&self) -> u32 {
        self.fetch_calls.load(Ordering::SeqCst)
    }

    pub fn updates(&self) -> Vec<ParticipantRecord> {
        self.updates.lock().unwrap().clone()
    }
}

#[async_trait]
impl ParticipantStore for RecordingParticipants {
    async fn fetch_participant(
        &self,
        _nhs_number: &NhsNumber,
        _screening_id: &ScreeningId,
    ) -> Result<Option<ParticipantRecord>> {
        self.fetch_calls.fetch_add(1, Ordering::SeqCst);
        Ok(self.record.lock().unwrap().clone())
    }

    async fn update_participant(&self, record: &ParticipantRecord) -> Result<bool> {
        self.updates.lock().unwrap().push(record.clone());
        Ok(true)
    }
}

#[derive(Default)]
pub struct RecordingDistributions {
    pub latest: Mutex<Option<DistributionRecord>>,
    pub latest_calls: AtomicU32,
    pub added: Mutex<Vec<DistributionRecord>>,
    /// Answer `false` to every add
    pub reject: AtomicBool,
}

impl RecordingDistributions {
    pub fn latest_calls(&self) -> u32 {
        self.latest_calls.load(Ordering::SeqCst)
    }

    pub fn added(&self) -> Vec<DistributionRecord> {
        self.added.lock().unwrap().clone()
    }

    pub fn set_reject(&self, reject: bool) {
        self.reject.store(reject, Ordering::SeqCst);
    }
}

#[async_trait]
impl DistributionStore for RecordingDistributions {
    async fn latest_distribution(&self, _nhs_number: &NhsNumber) -> Result<Option<DistributionRecord>> {
        self.latest_calls.fetch_add(1, Ordering::SeqCst);
        Ok(self.latest.lock().unwrap().clone())
    }

    async fn add_distribution(&self, record: &DistributionRecord) -> Result<bool> {
        if self.reject.load(Ordering::SeqCst) {
            return Ok(false);
        }
        self.added.lock().unwrap().push(record.clone());
        Ok(true)
    }
}

/// A rule service with a scripted answer, latency and transient failures
#[derive(Default)]
pub struct ScriptedRules {
    pub name: &'static str,
    pub violations: Mutex<Vec<Violation>>,
    pub delay: Mutex<Duration>,
    /// Remaining calls that fail with a 503 before answers start
    pub transient_failures: AtomicU32,
    pub calls: AtomicU32,
    pub requests: Mutex<Vec<ValidationRequest>>,
}

impl ScriptedRules {
    pub fn named(name: &'static str) -> Self {
        Self {
            name,
            ..Self::default()
        }
    }

    pub fn answer(&self, violations: Vec<Violation>) {
        *self.violations.lock().unwrap() = violations;
    }

    pub fn set_delay(&self, delay: Duration) {
        *self.delay.lock().unwrap() = delay;
    }

    pub fn fail_next(&self, count: u32) {
        self.transient_failures.store(count, Ordering::SeqCst);
    }

    pub fn calls(&self) -> u32 {
        self.calls.load(Ordering::SeqCst)
    }

    pub fn requests(&self) -> Vec<ValidationRequest> {
        self.requests.lock().unwrap().clone()
    }
}

#[async_trait]
impl RuleService for ScriptedRules {
    async fn validate(&self, request: &ValidationRequest) -> Result<ValidationOutcome> {
        let attempt = self.calls.fetch_add(1, Ordering::SeqCst) + 1;
        self.requests.lock().unwrap().push(request.clone());

        let delay = *self.delay.lock().unwrap();
        if !delay.is_zero() {
            tokio::time::sleep(delay).await;
        }

        let failing = self
            .transient_failures
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .is_ok();
        if failing {
            return Err(unavailable(self.name, attempt));
        }

        Ok(ValidationOutcome::new(self.violations.lock().unwrap().clone()))
    }
}

/// Builds a record from the request unless told to return nothing
#[derive(Default)]
pub struct RecordingTransformer {
    pub empty: Mutex<bool>,
    pub calls: AtomicU32,
}

impl RecordingTransformer {
    pub fn set_empty(&self, empty: bool) {
        *self.empty.lock().unwrap() = empty;
    }

    pub fn calls(&self) -> u32 {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl TransformService for RecordingTransformer {
    async fn transform(&self, request: &TransformRequest) -> Result<Option<DistributionRecord>> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if *self.empty.lock().unwrap() {
            return Ok(None);
        }

        let mut record = DistributionRecord::for_subject(request.participant.nhs_number.clone());
        record.screening_id = Some(request.participant.screening_id.clone());
        record.postcode = request.participant.postcode.clone();
        record.record_type = Some(request.participant.record_type);
        record.service_provider = Some(request.service_provider.clone());
        Ok(Some(record))
    }
}

#[derive(Default)]
pub struct RecordingSink {
    pub validation_calls: Mutex<Vec<Vec<Violation>>>,
    pub system_calls: Mutex<Vec<SystemFailure>>,
    /// Record every call, then fail it with a connection error
    pub fail: AtomicBool,
}

impl RecordingSink {
    pub fn set_fail(&self, fail: bool) {
        self.fail.store(fail, Ordering::SeqCst);
    }

    pub fn validation_calls(&self) -> Vec<Vec<Violation>> {
        self.validation_calls.lock().unwrap().clone()
    }

    pub fn system_calls(&self) -> Vec<SystemFailure> {
        self.system_calls.lock().unwrap().clone()
    }
}

#[async_trait]
impl ExceptionSink for RecordingSink {
    async fn log_validation_exception(
        &self,
        violations: &[Violation],
        _record: &ParticipantRecord,
        _file_origin: &str,
    ) -> Result<bool> {
        self.validation_calls.lock().unwrap().push(violations.to_vec());
        if self.fail.load(Ordering::SeqCst) {
            return Err(sink_down());
        }
        Ok(true)
    }

    async fn log_system_exception(
        &self,
        failure: &SystemFailure,
        _record: &ParticipantRecord,
        _file_origin: &str,
    ) -> Result<bool> {
        self.system_calls.lock().unwrap().push(failure.clone());
        if self.fail.load(Ordering::SeqCst) {
            return Err(sink_down());
        }
        Ok(true)
    }
}

/// A transform service that panics on every call
pub struct PanickingTransformer;

#[async_trait]
impl TransformService for PanickingTransformer {
    async fn transform(&self, request: &TransformRequest) -> Result<Option<DistributionRecord>> {
        panic!(
            "transform lookup table missing for {}",
            request.participant.nhs_number
        );
    }
}

/// One set of recording collaborators
pub struct Harness {
    pub participants: Arc<RecordingParticipants>,
    pub distributions: Arc<RecordingDistributions>,
    pub static_rules: Arc<ScriptedRules>,
    pub lookup_rules: Arc<ScriptedRules>,
    pub transformer: Arc<RecordingTransformer>,
    pub sink: Arc<RecordingSink>,
}

impl Harness {
    /// Participant present in the store, no prior distribution, clean rules
    pub fn new() -> Self {
        Self {
            participants: Arc::new(RecordingParticipants {
                record: Mutex::new(Some(inbound())),
                fetch_calls: AtomicU32::new(0),
                updates: Mutex::new(Vec::new()),
            }),
            distributions: Arc::new(RecordingDistributions::default()),
            static_rules: Arc::new(ScriptedRules::named("static-validation")),
            lookup_rules: Arc::new(ScriptedRules::named("lookup-validation")),
            transformer: Arc::new(RecordingTransformer::default()),
            sink: Arc::new(RecordingSink::default()),
        }
    }

    pub fn collaborators(&self) -> Collaborators {
        Collaborators {
            participants: self.participants.clone(),
            distributions: self.distributions.clone(),
            static_rules: self.static_rules.clone(),
            lookup_rules: self.lookup_rules.clone(),
            transformer: self.transformer.clone(),
            exceptions: self.sink.clone(),
        }
    }

    pub fn orchestrator(&self) -> Orchestrator {
        self.orchestrator_with(settings())
    }

    pub fn orchestrator_with(&self, settings: PipelineSettings) -> Orchestrator {
        Orchestrator::new(self.collaborators(), allocator(), settings)
    }
}

impl Default for Harness {
    fn default() -> Self {
        Self::new()
    }
}

pub fn rule_ids(violations: &[Violation]) -> Vec<u32> {
    violations.iter().map(|v| v.rule_id).collect()
}
