//! Core orchestration logic.
//!
//! # Modules
//!
//! - [`stages`] - the stage functions, one per external collaborator call
//! - [`retry`] - bounded exponential-backoff retry policy
//! - [`parallel`] - run independent branches concurrently and merge in order
//! - [`allocation`] - postcode-prefix service provider allocation
//! - [`pipeline`] - the orchestrator state machine and its context/outcomes
//! - [`state`] - durable checkpoints for crash-resume
//! - [`batch`] - bounded-concurrency batch runner and summary
//!
//! # Distribution Workflow
//!
//! 1. **Reconcile**: fetch the participant and its latest distribution concurrently
//! 2. **Allocate**: pick a service provider from the postcode
//! 3. **Validate**: static and lookup validation concurrently, lookup retried
//! 4. **Decide**: flag violations, short-circuit on fatal outcomes
//! 5. **Transform**: build the distribution record
//! 6. **Persist**: write it to the cohort distribution store
//!
//! # Example
//!
//! ```rust,no_run
//! use cohort_distributor::config::load_config;
//! use cohort_distributor::core::batch::{BatchRunner, Submission};
//! use cohort_distributor::core::pipeline::Orchestrator;
//! use std::sync::Arc;
//!
//! # async fn example(submissions: Vec<Submission>) -> Result<(), Box<dyn std::error::Error>> {
//! let config = load_config("distributor.toml")?;
//! let (_shutdown_tx, shutdown_rx) = tokio::sync::watch::channel(false);
//!
//! let orchestrator = Orchestrator::from_config(&config)?.with_shutdown(shutdown_rx);
//! let runner = BatchRunner::new(Arc::new(orchestrator), config.batch.max_concurrent_records);
//!
//! let summary = runner.run(submissions).await;
//! println!("Completed: {}", summary.completed);
//! # Ok(())
//! # }
//! ```

pub mod allocation;
pub mod batch;
pub mod parallel;
pub mod pipeline;
pub mod retry;
pub mod stages;
pub mod state;
