//! Grant records and the grant document state.
//!
//! Raw records come straight from the dataset and are untyped. Normalized
//! records have passed every check in [`crate::normalize`] and are the only
//! form the importer accepts.

use serde::{Deserialize, Serialize};

/// Document type tag of imported grant documents.
pub const GRANT_DOCUMENT_TYPE: &str = "ArbitrumLtipGrantee";

/// One untyped entry of the input JSON array.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct GrantRecordRaw(pub serde_json::Value);

impl From<serde_json::Value> for GrantRecordRaw {
    fn from(value: serde_json::Value) -> Self {
        Self(value)
    }
}

/// A validated grant record.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GrantRecordNormalized {
    pub grantee_name: String,

    /// RFC 3339, UTC, millisecond precision
    pub start_date: String,

    pub grant_size: f64,

    pub matching_grant_size: f64,

    /// Deduplicated, first-seen order
    pub authorized_signer_addresses: Vec<String>,

    pub disbursement_contract_address: String,

    pub funding_address: String,

    pub metrics_dashboard_link: String,

    pub grant_summary: String,

    pub funding_type: Vec<String>,
}

/// State of a grant document, built by folding its mutation records.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GrantState {
    pub grantee_name: Option<String>,
    pub start_date: Option<String>,
    pub grant_size: Option<f64>,
    pub matching_grant_size: Option<f64>,
    pub grant_summary: Option<String>,
    pub metrics_dashboard_link: Option<String>,
    pub disbursement_contract_address: Option<String>,
    pub funding_address: Option<String>,
    #[serde(default)]
    pub funding_type: Vec<String>,
    #[serde(default)]
    pub editor_addresses: Vec<String>,
}

impl GrantState {
    /// True once `INIT_GRANTEE` has been applied.
    #[must_use]
    pub fn is_initialized(&self) -> bool {
        self.grantee_name.is_some()
    }
}
