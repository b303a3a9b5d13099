//! Collaborator factory
//!
//! Builds the HTTP collaborator set from configuration.

use crate::adapters::http::{
    HttpDistributionStore, HttpExceptionSink, HttpParticipantStore, HttpRuleService,
    HttpTransformService,
};
use crate::adapters::traits::{
    DistributionStore, ExceptionSink, ParticipantStore, RuleService, TransformService,
};
use crate::config::ServicesConfig;
use crate::domain::Result;
use std::sync::Arc;

/// Every external collaborator the pipeline talks to
#[derive(Clone)]
pub struct Collaborators {
    pub participants: Arc<dyn ParticipantStore>,
    pub distributions: Arc<dyn DistributionStore>,
    pub static_rules: Arc<dyn RuleService>,
    pub lookup_rules: Arc<dyn RuleService>,
    pub transformer: Arc<dyn TransformService>,
    pub exceptions: Arc<dyn ExceptionSink>,
}

/// Create the HTTP collaborators described by `config`
///
/// # Errors
///
/// Returns an error if any HTTP client cannot be built
pub fn create_http_collaborators(config: &ServicesConfig) -> Result<Collaborators> {
    tracing::info!(
        participant_management = %config.participant_management_url,
        cohort_distribution = %config.cohort_distribution_url,
        "Creating HTTP collaborators"
    );

    Ok(Collaborators {
        participants: Arc::new(HttpParticipantStore::new(config)?),
        distributions: Arc::new(HttpDistributionStore::new(config)?),
        static_rules: Arc::new(HttpRuleService::static_rules(config)?),
        lookup_rules: Arc::new(HttpRuleService::lookup_rules(config)?),
        transformer: Arc::new(HttpTransformService::new(config)?),
        exceptions: Arc::new(HttpExceptionSink::new(config)?),
    })
}
