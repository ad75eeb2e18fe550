//! Core types for PII detection and masking

use std::collections::{BTreeMap, BTreeSet};

use serde::{Deserialize, Serialize};

/// The fixed set of PII categories carried on the wire.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
pub enum PiiType {
    #[serde(rename = "EMAIL")]
    Email,
    #[serde(rename = "PHONE")]
    Phone,
    #[serde(rename = "SSN")]
    Ssn,
    #[serde(rename = "CREDIT_CARD")]
    CreditCard,
    #[serde(rename = "ADDRESS")]
    Address,
    #[serde(rename = "NAME")]
    Name,
}

impl PiiType {
    pub fn as_str(&self) -> &'static str {
        match self {
            PiiType::Email => "EMAIL",
            PiiType::Phone => "PHONE",
            PiiType::Ssn => "SSN",
            PiiType::CreditCard => "CREDIT_CARD",
            PiiType::Address => "ADDRESS",
            PiiType::Name => "NAME",
        }
    }
}

/// One PII match in one field of one row.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PiiFinding {
    pub field_name: String,
    pub pii_type: PiiType,
    /// Detection confidence in [0, 1].
    pub confidence: f64,
    /// The redacted field value, present when masking was applied.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub masked_value: Option<String>,
}

/// Which PII categories get masked. Every flag defaults to enabled, both for
/// an absent policy and for keys omitted from a partial one.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct MaskPolicy {
    pub email: bool,
    pub phone: bool,
    pub ssn: bool,
    pub credit_card: bool,
    pub address: bool,
    pub name: bool,
}

impl Default for MaskPolicy {
    fn default() -> Self {
        Self { email: true, phone: true, ssn: true, credit_card: true, address: true, name: true }
    }
}

impl MaskPolicy {
    pub fn enabled(&self, pii_type: PiiType) -> bool {
        match pii_type {
            PiiType::Email => self.email,
            PiiType::Phone => self.phone,
            PiiType::Ssn => self.ssn,
            PiiType::CreditCard => self.credit_card,
            PiiType::Address => self.address,
            PiiType::Name => self.name,
        }
    }

    /// Masking is all-or-nothing per field: a field is masked when any of its
    /// detected types is enabled here, even if other detected types for the
    /// same field are disabled.
    pub fn should_mask(&self, detected: &[PiiType]) -> bool {
        detected.iter().any(|&t| self.enabled(t))
    }
}

/// Per-chunk security rollup carried on the `chunk` event.
#[derive(Debug, Clone, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SecurityMetrics {
    pub pii_items_found: u64,
    #[serde(rename = "fieldsWithPII")]
    pub fields_with_pii: BTreeSet<String>,
    pub masking_applied: bool,
}

/// Session-wide PII rollup. Lives for exactly one streaming session.
#[derive(Debug, Clone, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PiiSummary {
    #[serde(rename = "totalPIIItems")]
    pub total_pii_items: u64,
    pub by_type: BTreeMap<PiiType, u64>,
    pub affected_fields: BTreeSet<String>,
}

impl PiiSummary {
    pub fn merge(&mut self, findings: &[PiiFinding]) {
        for finding in findings {
            self.total_pii_items += 1;
            *self.by_type.entry(finding.pii_type).or_insert(0) += 1;
            self.affected_fields.insert(finding.field_name.clone());
        }
    }
}
