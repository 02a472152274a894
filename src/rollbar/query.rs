//! Occurrence query construction and row translation.
//!
//! The occurrence metrics endpoint answers an aggregation query with a
//! sequence of time buckets, each holding rows of (field, value) cells. The
//! shape is generic because group-by sets vary per query; this module builds
//! the one query the exporter uses and flattens the bucketed response into
//! typed [`ItemOccurrence`] records.

use chrono::Utc;
use serde::Serialize;

use super::types::{
    Field, FieldValue, Filter, Granularity, ItemOccurrence, OccurrenceMetricsResult, Sort,
};
use super::ApiError;

/// Group-by set for the exporter's per-project query.
const ITEM_GROUP_BY: [Field; 5] = [
    Field::ItemId,
    Field::Environment,
    Field::ItemTitle,
    Field::ItemStatus,
    Field::ItemLevel,
];

/// A time-windowed aggregation query over occurrences.
///
/// Constructed fresh per project per cycle; never persisted.
#[derive(Debug, Clone, Serialize)]
pub struct OccurrenceQuery {
    pub start_time: i64,
    pub end_time: i64,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub filters: Vec<Filter>,
    pub group_by: Vec<Field>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sort: Option<Sort>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub granularity: Option<Granularity>,
    /// Row cap; 0 is omitted so the server-side default/maximum applies.
    #[serde(skip_serializing_if = "is_zero")]
    pub limit: i64,
}

fn is_zero(v: &i64) -> bool {
    *v == 0
}

impl OccurrenceQuery {
    /// Query for per-item occurrence counts over the trailing window
    /// `[now - ago, now]`, grouped by item id, environment, title, status
    /// and level.
    pub fn item_window(ago: std::time::Duration, limit: i64) -> Self {
        let end = Utc::now().timestamp();
        let start = end - ago.as_secs() as i64;
        Self {
            start_time: start,
            end_time: end,
            filters: Vec::new(),
            group_by: ITEM_GROUP_BY.to_vec(),
            sort: None,
            granularity: None,
            limit,
        }
    }
}

/// Flatten all buckets and rows of a metrics result into one sequence of
/// typed records.
///
/// Recognized fields are resolved by identity; unrecognized fields are
/// skipped so server-side field additions do not break translation. A
/// recognized field carrying the wrong value kind is a decode error.
pub fn flatten_occurrences(
    result: &OccurrenceMetricsResult,
) -> Result<Vec<ItemOccurrence>, ApiError> {
    let mut records = Vec::new();
    for point in &result.timepoints {
        for row in &point.metrics_rows {
            let mut single = ItemOccurrence::at(point.timestamp)?;
            for cell in row {
                match cell.field {
                    Field::ItemId => single.item_id = integer(&cell.value, Field::ItemId)?,
                    Field::OccurrenceCount => {
                        single.occurrence_count = integer(&cell.value, Field::OccurrenceCount)?;
                    }
                    Field::Environment => {
                        single.environment = text(&cell.value, Field::Environment)?;
                    }
                    Field::ItemTitle => single.title = text(&cell.value, Field::ItemTitle)?,
                    Field::ItemStatus => single.status = text(&cell.value, Field::ItemStatus)?,
                    Field::ItemLevel => single.level = text(&cell.value, Field::ItemLevel)?,
                    _ => {}
                }
            }
            records.push(single);
        }
    }
    Ok(records)
}

fn integer(value: &FieldValue, field: Field) -> Result<i64, ApiError> {
    value
        .as_integer()
        .ok_or_else(|| ApiError::field_kind(field.as_ref(), "integer"))
}

fn text(value: &FieldValue, field: Field) -> Result<String, ApiError> {
    value
        .as_text()
        .map(str::to_owned)
        .ok_or_else(|| ApiError::field_kind(field.as_ref(), "string"))
}
