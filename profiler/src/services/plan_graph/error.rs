//! Plan graph error types

use crate::services::plan_graph::models::DanglingReference;
use thiserror::Error;

/// Errors raised while decoding operator rows or building the plan graph.
///
/// Every variant aborts the build; no partial graph is produced.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum PlanGraphError {
    #[error("Row {row} is missing required field '{field}'")]
    MissingIdentifier { row: usize, field: &'static str },

    #[error("Row {row} has an invalid '{field}': {reason}")]
    InvalidIdentifier { row: usize, field: &'static str, reason: String },

    #[error("Operator {node_id}: malformed {section}: {reason}")]
    MalformedRecord { node_id: i64, section: &'static str, reason: String },

    #[error("Operator id {node_id} appears more than once")]
    DuplicateNodeId { node_id: i64 },

    #[error("Dangling reference: {0}")]
    DanglingReference(DanglingReference),
}

impl PlanGraphError {
    pub fn missing(row: usize, field: &'static str) -> Self {
        Self::MissingIdentifier { row, field }
    }

    pub fn invalid(row: usize, field: &'static str, reason: impl Into<String>) -> Self {
        Self::InvalidIdentifier { row, field, reason: reason.into() }
    }

    pub fn malformed(node_id: i64, section: &'static str, reason: impl Into<String>) -> Self {
        Self::MalformedRecord { node_id, section, reason: reason.into() }
    }

    /// Operator id the error is attributed to, when one is known
    pub fn node_id(&self) -> Option<i64> {
        match self {
            Self::MissingIdentifier { .. } | Self::InvalidIdentifier { .. } => None,
            Self::MalformedRecord { node_id, .. } | Self::DuplicateNodeId { node_id } => {
                Some(*node_id)
            },
            Self::DanglingReference(reference) => Some(reference.declared_by),
        }
    }
}

pub type GraphResult<T> = Result<T, PlanGraphError>;
