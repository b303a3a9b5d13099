//! Service provider allocation
//!
//! Providers are allocated from a static rule table keyed by postcode prefix
//! and screening service. The longest matching prefix wins; a participant
//! with no matching rule goes to [`DEFAULT_SERVICE_PROVIDER`].

use crate::domain::context::ResultExt;
use crate::domain::{DistributorError, Result};
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Provider used when no allocation rule matches
pub const DEFAULT_SERVICE_PROVIDER: &str = "BS SELECT";

/// One allocation rule
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct AllocationRule {
    pub postcode: String,
    pub screening_service: String,
    pub service_provider: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct AllocationFile {
    config_data_list: Vec<AllocationRule>,
}

/// Postcode-prefix allocation table
#[derive(Debug, Clone, Default)]
pub struct ProviderAllocator {
    rules: Vec<AllocationRule>,
}

impl ProviderAllocator {
    pub fn new(rules: Vec<AllocationRule>) -> Self {
        Self { rules }
    }

    /// Parse `{ "ConfigDataList": [ ... ] }`
    pub fn from_json(json: &str) -> Result<Self> {
        let file: AllocationFile = serde_json::from_str(json)?;
        Ok(Self::new(file.config_data_list))
    }

    /// Load the allocation table from disk
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let json = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read allocation rules {}", path.display()))?;
        let allocator = Self::from_json(&json)
            .with_context(|| format!("Failed to parse allocation rules {}", path.display()))?;

        tracing::info!(
            path = %path.display(),
            rules = allocator.rules.len(),
            "Loaded service provider allocation rules"
        );
        Ok(allocator)
    }

    pub fn rules(&self) -> &[AllocationRule] {
        &self.rules
    }

    /// Allocate a provider for a postcode within a screening service
    ///
    /// # Errors
    ///
    /// Returns an allocation error when either input is missing or blank.
    pub fn allocate(&self, screening_service: Option<&str>, postcode: Option<&str>) -> Result<String> {
        let postcode = postcode
            .map(str::trim)
            .filter(|p| !p.is_empty())
            .ok_or_else(|| DistributorError::Allocation("participant has no postcode".to_string()))?;
        let service = screening_service
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .ok_or_else(|| {
                DistributorError::Allocation("participant has no screening service".to_string())
            })?;

        let postcode_upper = postcode.to_uppercase();

        let provider = self
            .rules
            .iter()
            .filter(|rule| rule.screening_service.eq_ignore_ascii_case(service))
            .filter(|rule| {
                let prefix = rule.postcode.trim().to_uppercase();
                !prefix.is_empty() && postcode_upper.starts_with(&prefix)
            })
            .max_by_key(|rule| rule.postcode.trim().len())
            .map(|rule| rule.service_provider.clone());

        Ok(provider.unwrap_or_else(|| DEFAULT_SERVICE_PROVIDER.to_string()))
    }
}
