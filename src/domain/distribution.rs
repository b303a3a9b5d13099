//! Cohort distribution record model
//!
//! A `DistributionRecord` is the authoritative per-subject output the
//! pipeline persists. The most recent one for a subject is loaded during
//! reconciliation; when none exists the sentinel record stands in for it.

use crate::domain::ids::{NhsNumber, ScreeningId};
use crate::domain::participant::{ParticipantRecord, RecordType};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// A persisted (or about to be persisted) cohort distribution entry
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct DistributionRecord {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cohort_distribution_id: Option<i64>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub participant_id: Option<String>,

    pub nhs_number: NhsNumber,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub screening_id: Option<ScreeningId>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub service_provider: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub postcode: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub record_type: Option<RecordType>,

    #[serde(default, rename = "IsExtracted")]
    pub extracted: bool,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub record_insert_date_time: Option<DateTime<Utc>>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub record_update_date_time: Option<DateTime<Utc>>,

    /// Pass-through fields produced by the transform service
    #[serde(flatten)]
    pub fields: Map<String, Value>,
}

impl DistributionRecord {
    /// The placeholder used when a subject has never been distributed
    pub fn sentinel() -> Self {
        Self::for_subject(NhsNumber::sentinel())
    }

    /// An empty record for the given subject
    pub fn for_subject(nhs_number: NhsNumber) -> Self {
        Self {
            cohort_distribution_id: None,
            participant_id: None,
            nhs_number,
            screening_id: None,
            service_provider: None,
            postcode: None,
            record_type: None,
            extracted: false,
            record_insert_date_time: None,
            record_update_date_time: None,
            fields: Map::new(),
        }
    }

    /// Whether this is the "no prior record" placeholder
    pub fn is_sentinel(&self) -> bool {
        self.nhs_number.is_sentinel()
    }

    /// Pick the most recent record (highest distribution id) from a result set
    pub fn latest(records: impl IntoIterator<Item = DistributionRecord>) -> Option<Self> {
        records
            .into_iter()
            .max_by_key(|r| r.cohort_distribution_id.unwrap_or(i64::MIN))
    }
}

/// Input to the transform service
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct TransformRequest {
    pub participant: ParticipantRecord,
    pub service_provider: String,
    pub existing_participant: DistributionRecord,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn with_id(id: i64) -> DistributionRecord {
        let mut r = DistributionRecord::for_subject(NhsNumber::new("9990001112").unwrap());
        r.cohort_distribution_id = Some(id);
        r
    }

    #[test]
    fn test_sentinel_identity() {
        let sentinel = DistributionRecord::sentinel();
        assert!(sentinel.is_sentinel());
        assert_eq!(sentinel.nhs_number.as_str(), "0");
        assert!(!with_id(1).is_sentinel());
    }

    #[test]
    fn test_latest_picks_highest_id() {
        let latest = DistributionRecord::latest(vec![with_id(3), with_id(11), with_id(7)]).unwrap();
        assert_eq!(latest.cohort_distribution_id, Some(11));
        assert!(DistributionRecord::latest(Vec::new()).is_none());
    }

    #[test]
    fn test_wire_names() {
        let mut r = with_id(5);
        r.extracted = true;
        r.service_provider = Some("BS SELECT".to_string());

        let value = serde_json::to_value(&r).unwrap();
        assert_eq!(value["CohortDistributionId"], json!(5));
        assert_eq!(value["IsExtracted"], json!(true));
        assert_eq!(value["ServiceProvider"], json!("BS SELECT"));
    }
}
