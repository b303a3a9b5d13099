//! Result type alias for the distributor
//!
//! This module provides a convenient Result type alias that uses
//! DistributorError as the error type.

use super::errors::DistributorError;

/// Result type alias for distributor operations
///
/// # Examples
///
/// ```
/// use cohort_distributor::domain::result::Result;
/// use cohort_distributor::domain::errors::DistributorError;
///
/// fn example_function() -> Result<String> {
///     Ok("success".to_string())
/// }
///
/// fn failing_function() -> Result<()> {
///     Err(DistributorError::MalformedInput("missing postcode".to_string()))
/// }
/// ```
pub type Result<T> = std::result::Result<T, DistributorError>;
