//! reqwest implementations of the collaborator traits

pub mod client;
pub mod data_service;
pub mod exception;
pub mod rules;
pub mod transform;

pub use client::ServiceClient;
pub use data_service::{HttpDistributionStore, HttpParticipantStore};
pub use exception::HttpExceptionSink;
pub use rules::HttpRuleService;
pub use transform::HttpTransformService;
