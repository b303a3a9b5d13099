//! The orchestration pipeline
//!
//! - [`context`] - per-run context built up stage by stage
//! - [`outcome`] - state machine states and terminal outcomes
//! - [`orchestrator`] - the state machine itself

pub mod context;
pub mod orchestrator;
pub mod outcome;

pub use context::PipelineContext;
pub use orchestrator::{Orchestrator, PipelineSettings};
pub use outcome::{PipelineFailure, PipelineOutcome, PipelineState, ShortCircuitReason};
