//! Participant record model
//!
//! A `ParticipantRecord` is the inbound unit of work: one screening
//! participant as received from an upstream file, together with the
//! authoritative copy held in the participant management store.

use crate::domain::ids::{NhsNumber, ScreeningId};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::fmt;

/// Exception flag on a participant
///
/// Stored numerically by the participant management store: `0` none,
/// `1` active, `2` ignored (an exception that has been acknowledged and
/// explicitly overridden).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(try_from = "u8", into = "u8")]
pub enum ExceptionFlag {
    #[default]
    None,
    Active,
    Ignored,
}

impl ExceptionFlag {
    /// Whether the flag blocks distribution
    pub fn is_active(self) -> bool {
        self == ExceptionFlag::Active
    }
}

impl TryFrom<u8> for ExceptionFlag {
    type Error = String;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        match value {
            0 => Ok(ExceptionFlag::None),
            1 => Ok(ExceptionFlag::Active),
            2 => Ok(ExceptionFlag::Ignored),
            other => Err(format!("Unknown exception flag value: {other}")),
        }
    }
}

impl From<ExceptionFlag> for u8 {
    fn from(value: ExceptionFlag) -> Self {
        match value {
            ExceptionFlag::None => 0,
            ExceptionFlag::Active => 1,
            ExceptionFlag::Ignored => 2,
        }
    }
}

/// Kind of change an inbound record represents
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum RecordType {
    #[serde(rename = "ADD")]
    New,
    #[serde(rename = "AMENDED")]
    Amended,
    #[serde(rename = "DEL")]
    Removed,
}

impl fmt::Display for RecordType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            RecordType::New => "ADD",
            RecordType::Amended => "AMENDED",
            RecordType::Removed => "DEL",
        };
        write!(f, "{label}")
    }
}

/// A screening participant
///
/// Only the fields the pipeline reads are modelled explicitly. Remaining
/// demographic fields are carried through untouched in `demographics`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct ParticipantRecord {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub participant_id: Option<String>,

    pub nhs_number: NhsNumber,

    pub screening_id: ScreeningId,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub screening_name: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub screening_acronym: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub postcode: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub primary_care_provider: Option<String>,

    pub record_type: RecordType,

    #[serde(default)]
    pub exception_flag: ExceptionFlag,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub record_insert_date_time: Option<String>,

    /// Pass-through demographic and clinical fields
    #[serde(flatten)]
    pub demographics: Map<String, Value>,
}

impl ParticipantRecord {
    /// Create a minimal record
    pub fn new(nhs_number: NhsNumber, screening_id: ScreeningId, record_type: RecordType) -> Self {
        Self {
            participant_id: None,
            nhs_number,
            screening_id,
            screening_name: None,
            screening_acronym: None,
            postcode: None,
            primary_care_provider: None,
            record_type,
            exception_flag: ExceptionFlag::None,
            record_insert_date_time: None,
            demographics: Map::new(),
        }
    }

    /// Set the postcode
    pub fn with_postcode(mut self, postcode: impl Into<String>) -> Self {
        self.postcode = Some(postcode.into());
        self
    }

    /// Set the exception flag
    pub fn with_exception_flag(mut self, flag: ExceptionFlag) -> Self {
        self.exception_flag = flag;
        self
    }

    /// Stamp the screening programme name and acronym
    pub fn with_screening(mut self, name: impl Into<String>, acronym: impl Into<String>) -> Self {
        self.screening_name = Some(name.into());
        self.screening_acronym = Some(acronym.into());
        self
    }
}
