//! Record normalization for noisy grant datasets.
//!
//! Raw records are loosely typed: sizes arrive as numbers or prose, address
//! fields as scalars, arrays, or comma-separated strings with junk around the
//! actual address. Every field goes through a small extractor here, and a
//! record that fails any required extractor is dropped from the import set.
//! Nothing in this module returns an error to the importer.

use std::collections::HashSet;
use std::path::Path;
use std::sync::LazyLock;

use chrono::{DateTime, NaiveDate, SecondsFormat, Utc};
use regex::Regex;
use serde::Serialize;
use serde_json::{Map, Value};
use tracing::debug;

use crate::error::{Error, Result};
use crate::model::{GrantRecordNormalized, GrantRecordRaw};

// ── Field names (dataset compatibility) ──────────────────────

pub const FIELD_GRANTEE_NAME: &str = "granteeName";
pub const FIELD_START_DATE: &str = "startDate";
pub const FIELD_GRANT_SIZE: &str = "grantSize";
pub const FIELD_MATCHING_GRANT_SIZE: &str = "matchingGrantSize";
pub const FIELD_SIGNERS: &str = "authorizedSignerAddress";
pub const FIELD_DISBURSEMENT: &str = "disbursementContractAddress";
pub const FIELD_FUNDING: &str = "fundingAddress";
pub const FIELD_DASHBOARD: &str = "metricsDashboardLink";
pub const FIELD_SUMMARY: &str = "grantSummary";
pub const FIELD_FUNDING_TYPE: &str = "fundingType";

static ADDRESS_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"0x[0-9a-fA-F]{40}").expect("valid address regex"));

static DIGITS_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"[0-9]+").expect("valid digit-run regex"));

type FieldResult<T> = std::result::Result<T, NormalizeError>;

/// Why a single record was excluded.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum NormalizeError {
    #[error("record is not a JSON object")]
    NotAnObject,

    #[error("missing field `{0}`")]
    MissingField(&'static str),

    #[error("field `{0}` has an unexpected type")]
    WrongType(&'static str),

    #[error("no valid address in `{0}`")]
    InvalidAddress(&'static str),

    #[error("invalid size in `{field}`: {value}")]
    InvalidSize { field: &'static str, value: String },

    #[error("invalid start date: {0}")]
    InvalidDate(String),
}

/// How a zero size is treated.
///
/// The dataset uses 0 for "unknown". The grant size is always lifted to 1,
/// whatever its encoding. The matching grant size is lifted to 1 only when it
/// arrives as a number; a string-typed "0" stays 0.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SizeRule {
    Grant,
    Matching,
}

impl SizeRule {
    const fn field(self) -> &'static str {
        match self {
            Self::Grant => FIELD_GRANT_SIZE,
            Self::Matching => FIELD_MATCHING_GRANT_SIZE,
        }
    }
}

/// A record that did not survive normalization.
#[derive(Debug, Clone, Serialize)]
pub struct Rejection {
    /// Position in the input array
    pub index: usize,
    /// Grantee name, when one could be read
    pub name: Option<String>,
    pub reason: String,
}

/// Outcome of normalizing a whole dataset.
#[derive(Debug, Clone, Default, Serialize)]
pub struct NormalizeReport {
    pub records: Vec<GrantRecordNormalized>,
    pub rejected: Vec<Rejection>,
}

// ── Dataset entry points ─────────────────────────────────────

/// Read the raw dataset: a JSON array of grant objects.
///
/// # Errors
///
/// Returns an error if the file cannot be read, is not JSON, or its top level
/// is not an array.
pub fn load_raw_records(path: &Path) -> Result<Vec<GrantRecordRaw>> {
    let content = std::fs::read_to_string(path)?;
    let value: Value = serde_json::from_str(&content)?;

    match value {
        Value::Array(items) => Ok(items.into_iter().map(GrantRecordRaw).collect()),
        _ => Err(Error::InvalidArgument(format!(
            "{} must contain a JSON array of grant records",
            path.display()
        ))),
    }
}

/// Normalize every raw record, keeping the valid ones.
///
/// Never fails: a record that cannot be normalized is reported in
/// `rejected` and left out of `records`.
#[must_use]
pub fn normalize_records(raw: &[GrantRecordRaw]) -> NormalizeReport {
    let mut report = NormalizeReport::default();

    for (index, record) in raw.iter().enumerate() {
        match normalize_record(record) {
            Ok(normalized) => report.records.push(normalized),
            Err(e) => {
                let name = record
                    .0
                    .get(FIELD_GRANTEE_NAME)
                    .and_then(Value::as_str)
                    .map(str::to_string);
                debug!(index, name = ?name, reason = %e, "Excluding grant record");
                report.rejected.push(Rejection {
                    index,
                    name,
                    reason: e.to_string(),
                });
            }
        }
    }

    report
}

/// Normalize a single raw record.
///
/// # Errors
///
/// Returns the first check the record fails.
pub fn normalize_record(raw: &GrantRecordRaw) -> FieldResult<GrantRecordNormalized> {
    let obj = raw.0.as_object().ok_or(NormalizeError::NotAnObject)?;

    let grantee_name = required_name(obj)?;
    let funding_address = required_address(obj, FIELD_FUNDING)?;
    let disbursement_contract_address = required_address(obj, FIELD_DISBURSEMENT)?;

    let grant_size = match present(obj, FIELD_GRANT_SIZE) {
        Some(v) => normalize_size(v, SizeRule::Grant)?,
        None => return Err(NormalizeError::MissingField(FIELD_GRANT_SIZE)),
    };
    let matching_grant_size = match present(obj, FIELD_MATCHING_GRANT_SIZE) {
        Some(v) => normalize_size(v, SizeRule::Matching)?,
        None => 0.0,
    };

    let start_date = match present(obj, FIELD_START_DATE) {
        Some(v) => normalize_date(v)?,
        None => return Err(NormalizeError::MissingField(FIELD_START_DATE)),
    };

    let authorized_signer_addresses = match present(obj, FIELD_SIGNERS) {
        Some(v) => signer_addresses(v, FIELD_SIGNERS)?,
        None => Vec::new(),
    };

    Ok(GrantRecordNormalized {
        grantee_name,
        start_date,
        grant_size,
        matching_grant_size,
        authorized_signer_addresses,
        disbursement_contract_address,
        funding_address,
        metrics_dashboard_link: optional_string(obj, FIELD_DASHBOARD),
        grant_summary: optional_string(obj, FIELD_SUMMARY),
        funding_type: funding_types(obj),
    })
}

// ── Addresses ────────────────────────────────────────────────

/// First `0x` + 40 hex digit substring of `input`, in its original case.
#[must_use]
pub fn extract_address(input: &str) -> Option<&str> {
    ADDRESS_RE.find(input).map(|m| m.as_str())
}

/// Split an address field into per-piece matches.
///
/// Pieces that do not contain an address come back as empty strings so the
/// caller sees one entry per piece.
fn address_pieces(value: &Value, field: &'static str) -> FieldResult<Vec<String>> {
    fn split(s: &str, out: &mut Vec<String>) {
        for piece in s.split(',') {
            out.push(extract_address(piece.trim()).unwrap_or_default().to_string());
        }
    }

    let mut pieces = Vec::new();
    match value {
        Value::Null => {}
        Value::String(s) => split(s, &mut pieces),
        Value::Array(items) => {
            for item in items {
                match item {
                    Value::String(s) => split(s, &mut pieces),
                    Value::Null => {}
                    _ => return Err(NormalizeError::WrongType(field)),
                }
            }
        }
        _ => return Err(NormalizeError::WrongType(field)),
    }
    Ok(pieces)
}

fn required_address(obj: &Map<String, Value>, field: &'static str) -> FieldResult<String> {
    let value = present(obj, field).ok_or(NormalizeError::MissingField(field))?;
    address_pieces(value, field)?
        .into_iter()
        .find(|a| !a.is_empty())
        .ok_or(NormalizeError::InvalidAddress(field))
}

/// Collect signer addresses: non-empty matches, deduplicated
/// case-insensitively, first spelling wins.
fn signer_addresses(value: &Value, field: &'static str) -> FieldResult<Vec<String>> {
    let mut seen = HashSet::new();
    Ok(address_pieces(value, field)?
        .into_iter()
        .filter(|a| !a.is_empty())
        .filter(|a| seen.insert(a.to_ascii_lowercase()))
        .collect())
}

// ── Sizes ────────────────────────────────────────────────────

/// Normalize a size field according to `rule`.
///
/// # Errors
///
/// Returns `InvalidSize` for negative or non-finite numbers, strings without
/// any digit, and values of any other JSON type.
pub fn normalize_size(value: &Value, rule: SizeRule) -> FieldResult<f64> {
    let field = rule.field();
    let invalid = || NormalizeError::InvalidSize {
        field,
        value: value.to_string(),
    };

    match value {
        Value::Number(n) => {
            let n = n.as_f64().ok_or_else(invalid)?;
            if !n.is_finite() || n < 0.0 {
                return Err(invalid());
            }
            // Numeric zero means "unknown" under both rules.
            if n == 0.0 { Ok(1.0) } else { Ok(n) }
        }
        Value::String(s) => {
            let digits = DIGITS_RE.find(s).ok_or_else(invalid)?.as_str();
            let n: f64 = digits.parse().map_err(|_| invalid())?;
            if n == 0.0 && rule == SizeRule::Grant {
                Ok(1.0)
            } else {
                Ok(n)
            }
        }
        _ => Err(invalid()),
    }
}

// ── Dates ────────────────────────────────────────────────────

/// Normalize a start date to RFC 3339 UTC with millisecond precision.
///
/// Accepts RFC 3339 strings, `YYYY-MM-DD` dates and epoch milliseconds.
///
/// # Errors
///
/// Returns `InvalidDate` for anything else.
pub fn normalize_date(value: &Value) -> FieldResult<String> {
    let invalid = || NormalizeError::InvalidDate(value.to_string());

    let parsed: DateTime<Utc> = match value {
        Value::String(s) => {
            let s = s.trim();
            if let Ok(dt) = DateTime::parse_from_rfc3339(s) {
                dt.with_timezone(&Utc)
            } else {
                NaiveDate::parse_from_str(s, "%Y-%m-%d")
                    .map_err(|_| invalid())?
                    .and_hms_opt(0, 0, 0)
                    .ok_or_else(invalid)?
                    .and_utc()
            }
        }
        Value::Number(n) => {
            let millis = n.as_i64().ok_or_else(invalid)?;
            DateTime::from_timestamp_millis(millis).ok_or_else(invalid)?
        }
        _ => return Err(invalid()),
    };

    Ok(parsed.to_rfc3339_opts(SecondsFormat::Millis, true))
}

// ── Plain fields ─────────────────────────────────────────────

/// A field that is present and not null.
fn present<'a>(obj: &'a Map<String, Value>, field: &str) -> Option<&'a Value> {
    obj.get(field).filter(|v| !v.is_null())
}

fn required_name(obj: &Map<String, Value>) -> FieldResult<String> {
    match present(obj, FIELD_GRANTEE_NAME) {
        Some(Value::String(s)) if !s.trim().is_empty() => Ok(s.trim().to_string()),
        Some(Value::String(_)) | None => Err(NormalizeError::MissingField(FIELD_GRANTEE_NAME)),
        Some(_) => Err(NormalizeError::WrongType(FIELD_GRANTEE_NAME)),
    }
}

fn optional_string(obj: &Map<String, Value>, field: &str) -> String {
    match present(obj, field) {
        Some(Value::String(s)) => s.trim().to_string(),
        Some(other) => other.to_string(),
        None => String::new(),
    }
}

fn funding_types(obj: &Map<String, Value>) -> Vec<String> {
    match present(obj, FIELD_FUNDING_TYPE) {
        Some(Value::String(s)) => s
            .split(',')
            .map(str::trim)
            .filter(|t| !t.is_empty())
            .map(str::to_string)
            .collect(),
        Some(Value::Array(items)) => items
            .iter()
            .filter_map(Value::as_str)
            .map(str::trim)
            .filter(|t| !t.is_empty())
            .map(str::to_string)
            .collect(),
        _ => Vec::new(),
    }
}
