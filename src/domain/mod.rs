//! Domain models and types for the distributor.
//!
//! # Overview
//!
//! The domain layer provides:
//! - **Strongly-typed identifiers** ([`NhsNumber`], [`ScreeningId`], [`RunId`])
//! - **Domain models** ([`ParticipantRecord`], [`DistributionRecord`], [`ValidationOutcome`])
//! - **Error types** ([`DistributorError`], [`ServiceError`])
//! - **Result type alias** ([`Result`])
//!
//! # Type Safety
//!
//! Identifiers use the newtype pattern so an NHS number can't be passed where
//! a screening id is expected:
//!
//! ```rust
//! use cohort_distributor::domain::{NhsNumber, ScreeningId};
//!
//! # fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let nhs_number = NhsNumber::new("9990001112")?;
//! let screening_id = ScreeningId::new("1")?;
//!
//! // This won't compile
//! // let wrong: NhsNumber = screening_id;
//! # Ok(())
//! # }
//! ```
//!
//! # Validation outcomes
//!
//! Rule violations are values, not errors:
//!
//! ```rust
//! use cohort_distributor::domain::{ValidationOutcome, Violation};
//!
//! let static_outcome = ValidationOutcome::new(vec![Violation::non_fatal(3, "Missing title")]);
//! let lookup_outcome = ValidationOutcome::new(vec![Violation::fatal(22, "Unknown GP practice")]);
//!
//! let merged = static_outcome.merge(lookup_outcome);
//! assert!(merged.is_fatal());
//! assert_eq!(merged.violations().len(), 2);
//! ```

pub mod context;
pub mod distribution;
pub mod errors;
pub mod exception;
pub mod ids;
pub mod participant;
pub mod result;
pub mod validation;

// Re-export commonly used types for convenience
pub use distribution::{DistributionRecord, TransformRequest};
pub use errors::{DistributorError, ServiceError};
pub use exception::{SystemFailure, SYSTEM_EXCEPTION_CATEGORY};
pub use ids::{NhsNumber, RunId, ScreeningId};
pub use participant::{ExceptionFlag, ParticipantRecord, RecordType};
pub use result::Result;
pub use validation::{RulesType, Severity, ValidationOutcome, ValidationRequest, Violation};
