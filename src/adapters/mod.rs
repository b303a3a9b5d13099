//! External system integrations.
//!
//! - [`traits`] - the collaborator contracts the pipeline consumes
//! - [`http`] - reqwest implementations of those contracts
//! - [`factory`] - builds the collaborator set from configuration
//!
//! # Design Pattern
//!
//! Adapters follow the **Adapter Pattern** to isolate external dependencies and
//! enable testing with fake implementations: the pipeline only ever holds
//! `Arc<dyn Trait>` handles.
//!
//! ```rust,no_run
//! use cohort_distributor::adapters::factory::create_http_collaborators;
//! use cohort_distributor::config::load_config;
//!
//! # fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let config = load_config("distributor.toml")?;
//! let collaborators = create_http_collaborators(&config.services)?;
//! # Ok(())
//! # }
//! ```

pub mod factory;
pub mod http;
pub mod traits;

pub use factory::{create_http_collaborators, Collaborators};
pub use traits::{DistributionStore, ExceptionSink, ParticipantStore, RuleService, TransformService};
