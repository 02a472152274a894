//! Rollbar API data model.
//!
//! These types mirror the remote API contract and are consumed as-is: the
//! exporter never defines its own variants of them. Response shapes are
//! decoded leniently (missing optional fields default) so that server-side
//! additions do not break older exporters.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use strum_macros::{AsRefStr, Display, EnumString};

use super::ApiError;

/// Enabled/disabled status of a project or access token.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, EnumString, Display, AsRefStr,
)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase", ascii_case_insensitive)]
pub enum Status {
    Enabled,
    Disabled,
}

/// Capability scope of a project access token.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, EnumString, Display, AsRefStr,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case", ascii_case_insensitive)]
pub enum Scope {
    Read,
    Write,
    PostServerItem,
    PostClientItem,
}

/// A top-level grouping of monitored application errors.
#[derive(Debug, Clone, Deserialize)]
pub struct Project {
    pub id: i64,
    #[serde(default)]
    pub name: String,
    pub account_id: i64,
    #[serde(default)]
    pub date_created: i64,
    #[serde(default)]
    pub date_modified: i64,
    pub status: Status,
}

/// Per-project credential with capability scopes.
#[derive(Debug, Clone, Deserialize)]
pub struct AccessToken {
    #[serde(default)]
    pub name: String,
    pub project_id: i64,
    pub access_token: String,
    #[serde(default)]
    pub scopes: Vec<Scope>,
    pub status: Status,
    #[serde(default)]
    pub rate_limit_window_size: i64,
    #[serde(default)]
    pub rate_limit_window_count: i64,
    #[serde(default)]
    pub date_created: i64,
    #[serde(default)]
    pub date_modified: i64,
}

impl AccessToken {
    /// Whether this token is usable for metrics queries: enabled with a
    /// `read` scope.
    pub fn is_read_enabled(&self) -> bool {
        self.status == Status::Enabled && self.scopes.contains(&Scope::Read)
    }
}

/// Parameters for creating a project access token.
#[derive(Debug, Clone, Serialize)]
pub struct CreateAccessTokenParams {
    pub name: String,
    pub scopes: Vec<Scope>,
    pub status: Status,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub rate_limit_window_size: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub rate_limit_window_count: Option<i64>,
}

impl CreateAccessTokenParams {
    /// The token the exporter provisions when a project has no usable
    /// read-scoped token: `{name: "read", scopes: [read], status: enabled}`.
    pub fn read_token() -> Self {
        Self {
            name: "read".to_string(),
            scopes: vec![Scope::Read],
            status: Status::Enabled,
            rate_limit_window_size: None,
            rate_limit_window_count: None,
        }
    }
}

/// A deployment environment within a project.
#[derive(Debug, Clone, Deserialize)]
pub struct Environment {
    pub id: i64,
    pub project_id: i64,
    pub environment: String,
    #[serde(default)]
    pub visible: i64,
}

/// A deduplicated error/issue grouping within a project.
#[derive(Debug, Clone, Deserialize)]
pub struct Item {
    pub id: i64,
    pub project_id: i64,
    #[serde(rename = "counter", default)]
    pub counter_id: i64,
    #[serde(default)]
    pub environment: String,
    #[serde(default)]
    pub platform: String,
    #[serde(default)]
    pub framework: String,
    #[serde(default)]
    pub hash: String,
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub status: String,
    #[serde(default)]
    pub level: String,
    #[serde(default)]
    pub first_occurrence_id: i64,
    #[serde(default)]
    pub first_occurrence_timestamp: i64,
    #[serde(default)]
    pub last_occurrence_id: i64,
    #[serde(default)]
    pub last_occurrence_timestamp: i64,
    /// Cumulative lifetime occurrence count; monotonic non-decreasing
    /// upstream.
    #[serde(default)]
    pub total_occurrences: i64,
}

/// Field identifiers accepted by the occurrence metrics API.
///
/// The catalogue is open-ended on the server side; identifiers this version
/// does not know about decode as [`Field::Other`] and are skipped during row
/// translation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Display, AsRefStr)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum Field {
    ProjectId,
    ItemId,
    Environment,
    BrowserFamily,
    BrowserVersion,
    OsFamily,
    OsVersion,
    DeviceBrand,
    DeviceModel,
    IpAddress,
    ItemStatus,
    ItemLevel,
    ItemGroupItemId,
    ItemTitle,
    ItemCounter,
    PersonUsername,
    PersonEmail,
    PersonId,
    CodeVersion,
    Count,
    OccurrenceId,
    Uuid,
    Context,
    Platform,
    Framework,
    PlatformCanonical,
    FrameworkCanonical,
    Language,
    LanguageName,
    NotifierName,
    NotifierVersion,
    OccurrenceCount,
    MessageBody,
    Timestamp,
    Fingerprint,
    ServerHost,
    ServerRoot,
    ServerPid,
    ServerCpu,
    ScmBranch,
    RequestUrl,
    RequestMethod,
    RequestQueryString,
    RequestBody,
    /// Unrecognized field identifier (forward compatibility).
    #[serde(other)]
    Other,
}

/// Aggregation functions accepted by the occurrence metrics API.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AggregateFunction {
    CountAll,
    CountDistinct,
    Max,
    Min,
}

/// An aggregate clause of an occurrence metrics query.
#[derive(Debug, Clone, Serialize)]
pub struct Aggregate {
    pub field: Field,
    pub function: AggregateFunction,
    pub alias: String,
}

/// Filter operators accepted by the occurrence metrics API.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FilterOperator {
    Eq,
    Ne,
    Gt,
    Gte,
    Lt,
    Lte,
    NotLike,
    Between,
    NotBetween,
}

/// A filter clause of an occurrence metrics query.
#[derive(Debug, Clone, Serialize)]
pub struct Filter {
    pub field: Field,
    pub values: Vec<String>,
    pub operator: FilterOperator,
}

/// Time bucketing granularity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Granularity {
    Second,
    Minute,
    Hour,
    Day,
    Week,
    Month,
    Year,
}

/// Sort direction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Order {
    Asc,
    Desc,
}

/// A sort clause of an occurrence metrics query.
#[derive(Debug, Clone, Serialize)]
pub struct Sort {
    pub order: Order,
    pub field: Field,
}

/// A single cell value in a metrics row.
///
/// The same response shape serves arbitrary group-by combinations, so values
/// are a self-describing union. Integers are decoded as `i64` directly and
/// never round-trip through a float.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(untagged)]
pub enum FieldValue {
    Integer(i64),
    Float(f64),
    Text(String),
}

impl FieldValue {
    /// Integer value, if this cell holds one.
    pub fn as_integer(&self) -> Option<i64> {
        match self {
            Self::Integer(v) => Some(*v),
            _ => None,
        }
    }

    /// String value, if this cell holds one.
    pub fn as_text(&self) -> Option<&str> {
        match self {
            Self::Text(v) => Some(v),
            _ => None,
        }
    }
}

/// One (field, value) cell of a metrics row.
#[derive(Debug, Clone, Deserialize)]
pub struct FieldCell {
    pub field: Field,
    pub value: FieldValue,
}

/// One time bucket of an occurrence metrics response.
#[derive(Debug, Clone, Deserialize)]
pub struct TimePoint {
    pub timestamp: i64,
    #[serde(default)]
    pub metrics_rows: Vec<Vec<FieldCell>>,
}

/// Result payload of an occurrence metrics query.
#[derive(Debug, Clone, Deserialize)]
pub struct OccurrenceMetricsResult {
    #[serde(default)]
    pub last_occurrence_timestamp: i64,
    #[serde(default)]
    pub query_execution: f64,
    #[serde(default)]
    pub timepoints: Vec<TimePoint>,
}

/// One item's aggregate occurrence data inside a scrape window, flattened
/// from a bucket row.
#[derive(Debug, Clone, PartialEq)]
pub struct ItemOccurrence {
    pub time: DateTime<Utc>,
    pub item_id: i64,
    pub environment: String,
    pub title: String,
    pub status: String,
    pub level: String,
    pub occurrence_count: i64,
}

impl ItemOccurrence {
    pub(crate) fn at(timestamp: i64) -> Result<Self, ApiError> {
        let time = DateTime::<Utc>::from_timestamp(timestamp, 0)
            .ok_or_else(|| ApiError::Decode(format!("invalid bucket timestamp {timestamp}")))?;
        Ok(Self {
            time,
            item_id: 0,
            environment: String::new(),
            title: String::new(),
            status: String::new(),
            level: String::new(),
            occurrence_count: 0,
        })
    }
}
