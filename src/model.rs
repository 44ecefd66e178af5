//! Wire-level domain types shared by the job service client and the session.
//! Field names follow the job service JSON exactly.

use std::collections::{BTreeMap, BTreeSet};
use std::fmt::{Display, Formatter};
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::ser::SerializeStruct;
use serde::{Deserialize, Serialize, Serializer};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum JobStatus {
    Uploaded,
    Validating,
    Ready,
    Error,
}

impl Display for JobStatus {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            JobStatus::Uploaded => "uploaded",
            JobStatus::Validating => "validating",
            JobStatus::Ready => "ready",
            JobStatus::Error => "error",
        };
        f.write_str(s)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct JobLimits {
    pub max_rows: u64,
    pub max_bytes: u64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DatasetMeta {
    pub total_rows: u64,
    pub total_columns: u64,
    /// Grid column order.
    pub canonical_columns: Vec<String>,
    #[serde(default)]
    pub unknown_columns: BTreeSet<String>,
    pub row_id_column: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ValidationSummary {
    pub error_count: u64,
    pub warning_count: u64,
    pub last_validated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Severity {
    Error,
    Warning,
}

/// A validation finding. `row_id`/`column` are both absent for dataset-level findings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Issue {
    pub severity: Severity,
    #[serde(rename = "type")]
    pub kind: String,
    #[serde(default)]
    pub row_id: Option<String>,
    #[serde(default)]
    pub column: Option<String>,
    pub message: String,
    #[serde(default)]
    pub suggestion: Option<String>,
}

impl Issue {
    pub fn is_cell_level(&self) -> bool {
        self.row_id.is_some() && self.column.is_some()
    }
}

/// Job snapshot as returned by create/get.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Job {
    pub job_id: String,
    pub status: JobStatus,
    pub created_at: DateTime<Utc>,
    pub schema_version: String,
    pub limits: JobLimits,
    #[serde(default)]
    pub dataset: Option<DatasetMeta>,
    #[serde(default)]
    pub validation: Option<ValidationSummary>,
    #[serde(default)]
    pub issues: Vec<Issue>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Row {
    pub row_id: String,
    #[serde(flatten)]
    pub cells: BTreeMap<String, Option<String>>,
}

impl Row {
    /// Cell value as displayed in an editor: null reads as the empty string.
    pub fn cell_text(&self, column: &str) -> &str {
        self.cells.get(column).and_then(|v| v.as_deref()).unwrap_or("")
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RowPage {
    pub offset: u64,
    pub limit: u64,
    pub total_rows: u64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub total_filtered: Option<u64>,
    pub rows: Vec<Row>,
}

impl RowPage {
    pub fn row(&self, row_id: &str) -> Option<&Row> {
        self.rows.iter().find(|r| r.row_id == row_id)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FilterOp {
    Eq,
    Neq,
    Contains,
    IsNull,
}

impl FilterOp {
    pub fn as_str(&self) -> &'static str {
        match self {
            FilterOp::Eq => "eq",
            FilterOp::Neq => "neq",
            FilterOp::Contains => "contains",
            FilterOp::IsNull => "is_null",
        }
    }
}

impl FromStr for FilterOp {
    type Err = String;
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "eq" | "=" => Ok(FilterOp::Eq),
            "neq" | "!=" => Ok(FilterOp::Neq),
            "contains" => Ok(FilterOp::Contains),
            "is_null" | "empty" => Ok(FilterOp::IsNull),
            other => Err(format!("unknown filter op '{}'", other)),
        }
    }
}

/// One row predicate. Serialization never emits `value` for `is_null`.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct Filter {
    pub column: String,
    pub op: FilterOp,
    #[serde(default)]
    pub value: Option<String>,
}

impl Filter {
    pub fn new(column: impl Into<String>, op: FilterOp, value: impl Into<String>) -> Self {
        let value = if op == FilterOp::IsNull { None } else { Some(value.into()) };
        Self { column: column.into(), op, value }
    }

    pub fn is_null(column: impl Into<String>) -> Self {
        Self { column: column.into(), op: FilterOp::IsNull, value: None }
    }
}

impl Serialize for Filter {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        if self.op == FilterOp::IsNull {
            let mut st = serializer.serialize_struct("Filter", 2)?;
            st.serialize_field("column", &self.column)?;
            st.serialize_field("op", &self.op)?;
            st.end()
        } else {
            let mut st = serializer.serialize_struct("Filter", 3)?;
            st.serialize_field("column", &self.column)?;
            st.serialize_field("op", &self.op)?;
            st.serialize_field("value", self.value.as_deref().unwrap_or(""))?;
            st.end()
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ApplyScope {
    #[default]
    All,
    Missing,
    Errors,
}

impl FromStr for ApplyScope {
    type Err = String;
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "all" => Ok(ApplyScope::All),
            "missing" => Ok(ApplyScope::Missing),
            "errors" => Ok(ApplyScope::Errors),
            other => Err(format!("unknown scope '{}' (expected all|missing|errors)", other)),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EditRecord {
    pub row_id: String,
    pub column: String,
    pub value: String,
}

/// Column-wide mutation. The variant is the wire `action_type`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BulkEditRequest {
    Map {
        column: String,
        apply_to: ApplyScope,
        mapping: BTreeMap<String, Option<String>>,
        default: String,
    },
    Replace {
        column: String,
        apply_to: ApplyScope,
        from: String,
        to: String,
    },
}

impl BulkEditRequest {
    pub fn column(&self) -> &str {
        match self {
            BulkEditRequest::Map { column, .. } | BulkEditRequest::Replace { column, .. } => column,
        }
    }

    pub fn action_type(&self) -> &'static str {
        match self {
            BulkEditRequest::Map { .. } => "map",
            BulkEditRequest::Replace { .. } => "replace",
        }
    }
}

#[derive(Serialize)]
struct BulkWire<'a, P: Serialize> {
    action_type: &'static str,
    column: &'a str,
    apply_to: ApplyScope,
    params: P,
}

#[derive(Serialize)]
struct MapParams<'a> {
    mapping: &'a BTreeMap<String, Option<String>>,
    default: &'a str,
}

#[derive(Serialize)]
struct ReplaceParams<'a> {
    from: &'a str,
    to: &'a str,
}

impl Serialize for BulkEditRequest {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            BulkEditRequest::Map { column, apply_to, mapping, default } => BulkWire {
                action_type: self.action_type(),
                column,
                apply_to: *apply_to,
                params: MapParams { mapping, default },
            }
            .serialize(serializer),
            BulkEditRequest::Replace { column, apply_to, from, to } => BulkWire {
                action_type: self.action_type(),
                column,
                apply_to: *apply_to,
                params: ReplaceParams { from, to },
            }
            .serialize(serializer),
        }
    }
}

/// Response of the edit and bulk endpoints.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EditOutcome {
    #[serde(default)]
    pub validation: Option<ValidationSummary>,
    #[serde(default)]
    pub issues: Vec<Issue>,
}
