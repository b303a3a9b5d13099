// Cohort Distributor - Screening Participant Distribution Pipeline
// Copyright (c) 2025 Cohort Distributor Contributors
// Licensed under the MIT License

//! # Cohort Distributor
//!
//! Cohort Distributor runs screening participant records through the cohort
//! distribution pipeline: it reconciles each record with the participant store
//! and its previous distribution, allocates a service provider, validates it
//! against static and lookup rule services, transforms it and persists the
//! result to the cohort distribution store.
//!
//! ## Overview
//!
//! This library provides:
//! - **Orchestrating** the per-record pipeline with concurrent fan-out of independent stages
//! - **Retrying** transient lookup validation failures with exponential backoff
//! - **Flagging** validation and system exceptions to the exception service
//! - **Checkpointing** every run so interrupted batches resume where they stopped
//!
//! ## Architecture
//!
//! - [`cli`] - Command-line interface and argument parsing
//! - [`core`] - Pipeline, stages, retry, allocation, checkpoints and batching
//! - [`adapters`] - Collaborator contracts and their HTTP implementations
//! - [`domain`] - Core domain types and errors
//! - [`config`] - Configuration management
//! - [`logging`] - Structured logging and observability
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use cohort_distributor::config::load_config;
//! use cohort_distributor::core::pipeline::Orchestrator;
//! use cohort_distributor::domain::ParticipantRecord;
//!
//! # async fn example(record: ParticipantRecord) -> Result<(), Box<dyn std::error::Error>> {
//! let config = load_config("distributor.toml")?;
//! let orchestrator = Orchestrator::from_config(&config)?;
//!
//! let outcome = orchestrator.run(record, "BSS_20240718.parquet").await;
//! println!("Run finished in state {}", outcome.state());
//! # Ok(())
//! # }
//! ```
//!
//! ## Error Handling
//!
//! Every fallible operation returns [`domain::Result`], backed by
//! [`domain::DistributorError`]. Errors that a retry could fix report
//! `is_transient() == true`; the pipeline itself never returns an error and
//! instead reports a [`core::pipeline::PipelineOutcome`].
//!
//! ## Logging
//!
//! Structured logging uses the `tracing` crate; stage timings and retry
//! attempts are emitted with consistent field names via the macros in
//! [`logging`].

pub mod adapters;
pub mod cli;
pub mod config;
pub mod core;
pub mod domain;
pub mod logging;
