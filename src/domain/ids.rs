//! Domain identifier types with validation
//!
//! Newtype wrappers for the identifiers that key a participant through the
//! pipeline. Each type ensures type safety and validates its format.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Identity value carried by the "no prior distribution" sentinel record
pub const SENTINEL_NHS_NUMBER: &str = "0";

/// NHS number newtype wrapper
///
/// The subject identifier of a screening participant. Only ASCII digits are
/// accepted; the sentinel value `"0"` is a valid (if meaningless) NHS number.
///
/// # Examples
///
/// ```
/// use cohort_distributor::domain::ids::NhsNumber;
/// use std::str::FromStr;
///
/// let nhs_number = NhsNumber::from_str("9990001112").unwrap();
/// assert_eq!(nhs_number.as_str(), "9990001112");
/// assert!(NhsNumber::from_str("99-00").is_err());
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct NhsNumber(String);

impl NhsNumber {
    /// Creates a new NhsNumber from a string
    ///
    /// # Returns
    ///
    /// Returns `Ok(NhsNumber)` if the value is non-empty and numeric, `Err` otherwise
    pub fn new(id: impl Into<String>) -> Result<Self, String> {
        let id = id.into();
        let trimmed = id.trim();
        if trimmed.is_empty() {
            return Err("NHS number cannot be empty".to_string());
        }
        if !trimmed.chars().all(|c| c.is_ascii_digit()) {
            return Err(format!("NHS number must be numeric, got '{trimmed}'"));
        }
        Ok(Self(trimmed.to_string()))
    }

    /// The sentinel identity used when no prior record exists
    pub fn sentinel() -> Self {
        Self(SENTINEL_NHS_NUMBER.to_string())
    }

    /// Whether this is the sentinel identity
    pub fn is_sentinel(&self) -> bool {
        self.0 == SENTINEL_NHS_NUMBER
    }

    /// Returns the NHS number as a string slice
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Consumes self and returns the inner String
    pub fn into_inner(self) -> String {
        self.0
    }
}

impl fmt::Display for NhsNumber {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for NhsNumber {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::new(s)
    }
}

impl TryFrom<String> for NhsNumber {
    type Error = String;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl From<NhsNumber> for String {
    fn from(value: NhsNumber) -> Self {
        value.0
    }
}

impl AsRef<str> for NhsNumber {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

/// Screening programme identifier newtype wrapper
///
/// # Examples
///
/// ```
/// use cohort_distributor::domain::ids::ScreeningId;
///
/// let screening_id = ScreeningId::new("1").unwrap();
/// assert_eq!(screening_id.to_string(), "1");
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct ScreeningId(String);

impl ScreeningId {
    /// Creates a new ScreeningId, rejecting blank values
    pub fn new(id: impl Into<String>) -> Result<Self, String> {
        let id = id.into();
        if id.trim().is_empty() {
            return Err("Screening ID cannot be empty".to_string());
        }
        Ok(Self(id.trim().to_string()))
    }

    /// Returns the screening ID as a string slice
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ScreeningId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for ScreeningId {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::new(s)
    }
}

impl TryFrom<String> for ScreeningId {
    type Error = String;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl From<ScreeningId> for String {
    fn from(value: ScreeningId) -> Self {
        value.0
    }
}

/// Orchestration run identifier
///
/// Deterministic per submission so that re-invoking the pipeline for the same
/// record finds the same checkpoint: `{file_origin}_{nhs_number}_{screening_id}`.
/// Characters outside `[A-Za-z0-9._-]` in the file origin and screening id are
/// replaced with `_`, and a run of dots with `_`, so the id is safe to use as a
/// file name.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct RunId(String);

impl RunId {
    /// Build the run id for a submission
    pub fn for_submission(
        file_origin: &str,
        nhs_number: &NhsNumber,
        screening_id: &ScreeningId,
    ) -> Self {
        Self(format!(
            "{}_{nhs_number}_{}",
            path_safe(file_origin),
            path_safe(screening_id.as_str())
        ))
    }

    /// Wrap an existing run id (e.g. read back from storage)
    pub fn from_raw(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Returns the run ID as a string slice
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

fn path_safe(raw: &str) -> String {
    let mapped: String = raw
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || matches!(c, '.' | '-' | '_') {
                c
            } else {
                '_'
            }
        })
        .collect();
    mapped.replace("..", "__")
}

impl fmt::Display for RunId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}
