//! Validation stages
//!
//! Static and lookup validation share the rule service contract and the
//! [`ValidationOutcome`] shape. Only lookup validation is retried, and the
//! orchestrator applies that policy around the whole stage.

use crate::adapters::traits::RuleService;
use crate::core::parallel::{gather, Branch};
use crate::core::stages::{Stage, StageContext, StageKind};
use crate::domain::context::ResultExt;
use crate::domain::{Result, RulesType, ValidationOutcome, ValidationRequest};
use async_trait::async_trait;
use futures::FutureExt;
use std::sync::Arc;

pub struct StaticValidateStage {
    service: Arc<dyn RuleService>,
}

impl StaticValidateStage {
    pub fn new(service: Arc<dyn RuleService>) -> Self {
        Self { service }
    }
}

#[async_trait]
impl Stage for StaticValidateStage {
    type Input = ValidationRequest;
    type Output = ValidationOutcome;

    const KIND: StageKind = StageKind::StaticValidate;

    async fn execute(&self, ctx: &StageContext, request: ValidationRequest) -> Result<ValidationOutcome> {
        let outcome = self.service.validate(&request).await?;
        tracing::debug!(
            run_id = %ctx.run_id,
            violations = outcome.violations().len(),
            fatal = outcome.is_fatal(),
            "Static validation finished"
        );
        Ok(outcome)
    }
}

/// Lookup validation, optionally fanned out per rules type
///
/// With several rules types configured, one call per type runs concurrently
/// and the outcomes are merged in configured order.
pub struct LookupValidateStage {
    service: Arc<dyn RuleService>,
    rules_types: Vec<RulesType>,
}

impl LookupValidateStage {
    pub fn new(service: Arc<dyn RuleService>, rules_types: Vec<RulesType>) -> Self {
        Self {
            service,
            rules_types,
        }
    }

    pub fn rules_types(&self) -> &[RulesType] {
        &self.rules_types
    }
}

#[async_trait]
impl Stage for LookupValidateStage {
    type Input = ValidationRequest;
    type Output = ValidationOutcome;

    const KIND: StageKind = StageKind::LookupValidate;

    async fn execute(&self, ctx: &StageContext, request: ValidationRequest) -> Result<ValidationOutcome> {
        let outcome = match self.rules_types.as_slice() {
            [] => self.service.validate(&request).await?,
            [only] => self.service.validate(&request.for_rules_type(*only)).await?,
            many => {
                let branches: Vec<Branch<'static, RulesType, ValidationOutcome>> = many
                    .iter()
                    .map(|rules_type| {
                        let service = self.service.clone();
                        let scoped = request.for_rules_type(*rules_type);
                        let fut = async move { service.validate(&scoped).await }.boxed();
                        (*rules_type, fut)
                    })
                    .collect();

                match gather(branches).await {
                    Ok(outcomes) => ValidationOutcome::merge_all(outcomes),
                    Err(failure) => {
                        let branch = failure.branch;
                        return Err(failure.error)
                            .with_context(|| format!("lookup validation for {branch} rules failed"));
                    }
                }
            }
        };

        tracing::debug!(
            run_id = %ctx.run_id,
            violations = outcome.violations().len(),
            fatal = outcome.is_fatal(),
            "Lookup validation finished"
        );
        Ok(outcome)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::stages::fakes::{ctx, participant, FakeRules};
    use crate::domain::{DistributionRecord, DistributorError, ServiceError, Violation};

    fn request() -> ValidationRequest {
        ValidationRequest {
            participant: participant(),
            previous_participant: DistributionRecord::sentinel(),
            file_name: "BSS_20240718.parquet".to_string(),
            service_provider: "BS SELECT".to_string(),
            rules_type: None,
        }
    }

    #[tokio::test]
    async fn test_static_passes_outcome_through() {
        let rules = Arc::new(FakeRules {
            violations: vec![Violation::non_fatal(3, "missing GP")],
            ..Default::default()
        });
        let stage = StaticValidateStage::new(rules.clone());

        let outcome = stage.execute(&ctx(), request()).await.unwrap();
        assert_eq!(outcome.violations().len(), 1);
        assert!(!outcome.is_fatal());
        assert_eq!(rules.requests.lock().unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_lookup_single_rules_type_scopes_request() {
        let rules = Arc::new(FakeRules::default());
        let stage = LookupValidateStage::new(rules.clone(), vec![RulesType::CohortDistribution]);

        let outcome = stage.execute(&ctx(), request()).await.unwrap();
        assert!(outcome.is_empty());

        let requests = rules.requests.lock().unwrap();
        assert_eq!(requests.len(), 1);
        assert_eq!(requests[0].rules_type, Some(RulesType::CohortDistribution));
    }

    #[tokio::test]
    async fn test_lookup_fans_out_and_merges() {
        let rules = Arc::new(FakeRules {
            violations: vec![Violation::fatal(35, "invalid provider")],
            ..Default::default()
        });
        let stage = LookupValidateStage::new(
            rules.clone(),
            vec![RulesType::ParticipantManagement, RulesType::CohortDistribution],
        );

        let outcome = stage.execute(&ctx(), request()).await.unwrap();
        assert_eq!(outcome.violations().len(), 2);
        assert!(outcome.is_fatal());
        assert_eq!(rules.requests.lock().unwrap().len(), 2);
    }

    struct FailingRules;

    #[async_trait]
    impl RuleService for FailingRules {
        async fn validate(&self, _request: &ValidationRequest) -> Result<ValidationOutcome> {
            Err(ServiceError::ServerError {
                service: "lookup-validation".to_string(),
                status: 503,
                message: "unavailable".to_string(),
            }
            .into())
        }
    }

    #[tokio::test]
    async fn test_fan_out_failure_stays_transient() {
        let stage = LookupValidateStage::new(
            Arc::new(FailingRules),
            vec![RulesType::ParticipantManagement, RulesType::CohortDistribution],
        );

        let err = stage.execute(&ctx(), request()).await.unwrap_err();
        assert!(err.is_transient());
        assert!(matches!(err, DistributorError::Context { .. }));
        assert!(err.to_string().contains("ParticipantManagement"));
    }
}
