//! Row parser for `GET_QUERY_OPERATOR_STATS` output
//!
//! Rows come either from a JSON export (native JSON values) or from the SQL
//! API, where every cell is text and VARIANT columns hold serialized JSON.
//! Both shapes decode into the same typed record.

use crate::services::plan_graph::error::{GraphResult, PlanGraphError};
use crate::services::plan_graph::models::{
    ExecutionTimeBreakdown, IoStatistics, OperatorAttributes, OperatorStatsRecord,
};
use serde::de::DeserializeOwned;
use serde_json::Value;

/// A raw row keyed by column name
pub type RawRow = serde_json::Map<String, Value>;

// Lowercased column aliases: Snowflake column name first, then the
// camelCase and snake_case record field names.
const NODE_ID_KEYS: &[&str] = &["operator_id", "nodeid", "node_id"];
const PARENT_KEYS: &[&str] = &["parent_operators", "parentid", "parent_id"];
const STEP_LABEL_KEYS: &[&str] = &["operator_type", "steplabel", "step_label"];
const IO_STATS_KEYS: &[&str] = &["operator_statistics", "iostats", "io_stats"];
const EXECUTION_TIME_KEYS: &[&str] =
    &["execution_time_breakdown", "executiontime", "execution_time"];
const ATTRIBUTES_KEYS: &[&str] = &["operator_attributes", "attributes"];

/// Parser turning raw rows into [`OperatorStatsRecord`]s
pub struct RowParser;

impl RowParser {
    /// Parse every row, failing on the first bad one
    pub fn parse_rows(rows: &[RawRow]) -> GraphResult<Vec<OperatorStatsRecord>> {
        rows.iter()
            .enumerate()
            .map(|(index, row)| Self::parse_row(index, row))
            .collect()
    }

    /// Parse a single row; `index` is only used for error reporting
    pub fn parse_row(index: usize, row: &RawRow) -> GraphResult<OperatorStatsRecord> {
        let node_id = match Self::lookup(row, NODE_ID_KEYS) {
            Some(value) => Self::as_integer(value).ok_or_else(|| {
                PlanGraphError::invalid(index, "nodeId", format!("{} is not an integer", value))
            })?,
            None => return Err(PlanGraphError::missing(index, "nodeId")),
        };

        let step_label = match Self::lookup(row, STEP_LABEL_KEYS) {
            Some(value) => Self::as_label(value).ok_or_else(|| {
                let reason = format!("expected text, found {}", Self::type_name(value));
                PlanGraphError::invalid(index, "stepLabel", reason)
            })?,
            None => return Err(PlanGraphError::missing(index, "stepLabel")),
        };

        let parent_id = match Self::lookup(row, PARENT_KEYS) {
            Some(value) => Self::parse_parent(node_id, value)?,
            None => None,
        };

        let io_stats: Option<IoStatistics> =
            Self::parse_section(node_id, "ioStats", Self::lookup(row, IO_STATS_KEYS))?;
        let execution_time: Option<ExecutionTimeBreakdown> = Self::parse_section(
            node_id,
            "executionTime",
            Self::lookup(row, EXECUTION_TIME_KEYS),
        )?;
        let attributes: Option<OperatorAttributes> =
            Self::parse_section(node_id, "attributes", Self::lookup(row, ATTRIBUTES_KEYS))?;

        Ok(OperatorStatsRecord {
            node_id,
            parent_id,
            step_label,
            io_stats,
            execution_time,
            attributes,
        })
    }

    /// Case-insensitive column lookup; JSON null counts as absent
    fn lookup<'a>(row: &'a RawRow, candidates: &[&str]) -> Option<&'a Value> {
        row.iter()
            .find(|(key, _)| candidates.contains(&key.to_ascii_lowercase().as_str()))
            .map(|(_, value)| value)
            .filter(|value| !value.is_null())
    }

    /// Integer from a JSON number or a numeric string
    fn as_integer(value: &Value) -> Option<i64> {
        match value {
            Value::Number(n) => n.as_i64(),
            Value::String(s) => s.trim().parse().ok(),
            _ => None,
        }
    }

    fn as_label(value: &Value) -> Option<String> {
        match value {
            Value::String(s) => Some(s.clone()),
            Value::Number(n) => Some(n.to_string()),
            _ => None,
        }
    }

    /// `PARENT_OPERATORS` is an ARRAY column; older exports carry a scalar
    fn parse_parent(node_id: i64, value: &Value) -> GraphResult<Option<i64>> {
        match value {
            Value::Null => Ok(None),
            Value::Number(_) => Self::as_integer(value)
                .map(Some)
                .ok_or_else(|| Self::not_an_integer(node_id, value)),
            Value::String(s) => {
                let trimmed = s.trim();
                if trimmed.is_empty() {
                    return Ok(None);
                }
                if trimmed.starts_with('[') {
                    let decoded: Value = serde_json::from_str(trimmed).map_err(|e| {
                        let reason = format!("invalid JSON: {}", e);
                        PlanGraphError::malformed(node_id, "parentId", reason)
                    })?;
                    return Self::parse_parent(node_id, &decoded);
                }
                trimmed.parse().map(Some).map_err(|_| {
                    PlanGraphError::malformed(
                        node_id,
                        "parentId",
                        format!("'{}' is not an integer", trimmed),
                    )
                })
            },
            Value::Array(items) => {
                let Some(first) = items.first() else {
                    return Ok(None);
                };
                if items.len() > 1 {
                    tracing::warn!(
                        "Operator {} reports {} parents, only the first is drawn",
                        node_id,
                        items.len()
                    );
                }
                Self::as_integer(first)
                    .map(Some)
                    .ok_or_else(|| Self::not_an_integer(node_id, first))
            },
            other => Err(PlanGraphError::malformed(
                node_id,
                "parentId",
                format!("unexpected {}", Self::type_name(other)),
            )),
        }
    }

    fn not_an_integer(node_id: i64, value: &Value) -> PlanGraphError {
        PlanGraphError::malformed(node_id, "parentId", format!("{} is not an integer", value))
    }

    /// Decode a nested mapping column into its typed section
    fn parse_section<T: DeserializeOwned>(
        node_id: i64,
        section: &'static str,
        value: Option<&Value>,
    ) -> GraphResult<Option<T>> {
        let Some(value) = value else {
            return Ok(None);
        };

        let decoded;
        let mapping = match value {
            Value::String(text) if text.trim().is_empty() => return Ok(None),
            Value::String(text) => {
                decoded = serde_json::from_str::<Value>(text).map_err(|e| {
                    PlanGraphError::malformed(node_id, section, format!("invalid JSON: {}", e))
                })?;
                &decoded
            },
            other => other,
        };

        match mapping {
            Value::Null => Ok(None),
            Value::Object(_) => serde_json::from_value(mapping.clone())
                .map(Some)
                .map_err(|e| PlanGraphError::malformed(node_id, section, e.to_string())),
            other => Err(PlanGraphError::malformed(
                node_id,
                section,
                format!("expected a mapping, found {}", Self::type_name(other)),
            )),
        }
    }

    fn type_name(value: &Value) -> &'static str {
        match value {
            Value::Null => "null",
            Value::Bool(_) => "boolean",
            Value::Number(_) => "number",
            Value::String(_) => "string",
            Value::Array(_) => "array",
            Value::Object(_) => "mapping",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn row(value: Value) -> RawRow {
        match value {
            Value::Object(map) => map,
            _ => panic!("test rows must be objects"),
        }
    }

    #[test]
    fn test_parse_snowflake_columns() {
        let raw = row(json!({
            "QUERY_ID": "01b2c3d4-0000-1111-0000-000000000001",
            "STEP_ID": 1,
            "OPERATOR_ID": 2,
            "PARENT_OPERATORS": "[\n  1\n]",
            "OPERATOR_TYPE": "TableScan",
            "OPERATOR_STATISTICS": "{\"input_rows\": 100, \"io\": {\"bytes_scanned\": 2048}}",
            "EXECUTION_TIME_BREAKDOWN": "{\"overall_percentage\": 0.25}",
            "OPERATOR_ATTRIBUTES": "{\"table_name\": \"DB.PUBLIC.ORDERS\"}"
        }));

        let record = RowParser::parse_row(0, &raw).unwrap();
        assert_eq!(record.node_id, 2);
        assert_eq!(record.parent_id, Some(1));
        assert_eq!(record.step_label, "TableScan");
        assert_eq!(record.input_rows(), Some(100));
        let io = record.io_stats.as_ref().and_then(|s| s.io.as_ref()).unwrap();
        assert_eq!(io.bytes_scanned, Some(2048));
        assert_eq!(io.percentage_scanned_from_cache, None);
        assert_eq!(record.execution_time.unwrap().overall_percentage, Some(0.25));
        assert_eq!(record.attributes.unwrap().table_name.as_deref(), Some("DB.PUBLIC.ORDERS"));
    }

    #[test]
    fn test_parse_camel_case_fields() {
        let raw = row(json!({
            "nodeId": 7,
            "parentId": 3,
            "stepLabel": "Join",
            "attributes": {"join_type": "INNER", "join_id": 9}
        }));

        let record = RowParser::parse_row(0, &raw).unwrap();
        assert_eq!(record.node_id, 7);
        assert_eq!(record.parent_id, Some(3));
        assert_eq!(record.join_id(), Some(9));
        assert!(record.io_stats.is_none());
        assert!(record.execution_time.is_none());
    }

    #[test]
    fn test_sql_api_text_cells() {
        let raw = row(json!({
            "OPERATOR_ID": "0",
            "PARENT_OPERATORS": null,
            "OPERATOR_TYPE": "Result",
            "OPERATOR_STATISTICS": null
        }));

        let record = RowParser::parse_row(0, &raw).unwrap();
        assert_eq!(record.node_id, 0);
        assert_eq!(record.parent_id, None);
        assert!(record.io_stats.is_none());
    }

    #[test]
    fn test_missing_identifiers() {
        let no_id = row(json!({"OPERATOR_TYPE": "Result"}));
        assert_eq!(
            RowParser::parse_row(4, &no_id).unwrap_err(),
            PlanGraphError::MissingIdentifier { row: 4, field: "nodeId" }
        );

        let no_label = row(json!({"OPERATOR_ID": 1}));
        assert_eq!(
            RowParser::parse_row(0, &no_label).unwrap_err(),
            PlanGraphError::MissingIdentifier { row: 0, field: "stepLabel" }
        );
    }

    #[test]
    fn test_non_integer_node_id_is_invalid() {
        for bad in [json!("abc"), json!(1.5), json!({"id": 1})] {
            let raw = row(json!({"OPERATOR_ID": bad, "OPERATOR_TYPE": "Result"}));
            let err = RowParser::parse_row(2, &raw).unwrap_err();
            assert!(matches!(
                err,
                PlanGraphError::InvalidIdentifier { row: 2, field: "nodeId", .. }
            ));
        }

        let raw = row(json!({"OPERATOR_ID": "abc", "OPERATOR_TYPE": "Result"}));
        assert_eq!(
            RowParser::parse_row(0, &raw).unwrap_err().to_string(),
            "Row 0 has an invalid 'nodeId': \"abc\" is not an integer"
        );
    }

    #[test]
    fn test_non_text_step_label_is_invalid() {
        let raw = row(json!({"OPERATOR_ID": 1, "OPERATOR_TYPE": ["Join"]}));
        assert!(matches!(
            RowParser::parse_row(0, &raw),
            Err(PlanGraphError::InvalidIdentifier { field: "stepLabel", .. })
        ));
    }

    #[test]
    fn test_scalar_section_is_malformed() {
        let raw = row(json!({
            "OPERATOR_ID": 5,
            "OPERATOR_TYPE": "Filter",
            "OPERATOR_STATISTICS": 42
        }));

        let err = RowParser::parse_row(0, &raw).unwrap_err();
        assert!(matches!(
            err,
            PlanGraphError::MalformedRecord { node_id: 5, section: "ioStats", .. }
        ));
    }

    #[test]
    fn test_nested_scalar_is_malformed() {
        let raw = row(json!({
            "OPERATOR_ID": 6,
            "OPERATOR_TYPE": "TableScan",
            "OPERATOR_STATISTICS": {"io": "lots"}
        }));

        let err = RowParser::parse_row(0, &raw).unwrap_err();
        assert_eq!(err.node_id(), Some(6));
    }

    #[test]
    fn test_pruning_requires_both_counters() {
        let raw = row(json!({
            "OPERATOR_ID": 8,
            "OPERATOR_TYPE": "TableScan",
            "OPERATOR_STATISTICS": {"pruning": {"partitions_scanned": 3}}
        }));

        assert!(matches!(
            RowParser::parse_row(0, &raw),
            Err(PlanGraphError::MalformedRecord { node_id: 8, .. })
        ));
    }

    #[test]
    fn test_parent_shapes() {
        assert_eq!(RowParser::parse_parent(1, &json!([])).unwrap(), None);
        assert_eq!(RowParser::parse_parent(1, &json!([4, 5])).unwrap(), Some(4));
        assert_eq!(RowParser::parse_parent(1, &json!("12")).unwrap(), Some(12));
        assert_eq!(RowParser::parse_parent(1, &json!("[]")).unwrap(), None);
        assert!(RowParser::parse_parent(1, &json!({"id": 1})).is_err());
        assert!(RowParser::parse_parent(1, &json!(1.5)).is_err());
    }

    #[test]
    fn test_parse_rows_stops_at_first_error() {
        let rows = vec![
            row(json!({"OPERATOR_ID": 0, "OPERATOR_TYPE": "Result"})),
            row(json!({"OPERATOR_TYPE": "Sort"})),
        ];
        assert!(matches!(
            RowParser::parse_rows(&rows),
            Err(PlanGraphError::MissingIdentifier { row: 1, .. })
        ));
    }
}
