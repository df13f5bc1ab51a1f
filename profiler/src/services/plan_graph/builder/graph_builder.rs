//! Plan graph builder
//!
//! Phase one declares an operator box per record (plus an optional row-count
//! oval) and collects candidate edges. Phase two hands the edges to the
//! [`EdgeValidator`] before anything is returned.
//!
//! Edges are declared bottom-up (`rowcount(parent) -> child`); the DOT writer
//! sets `dir="back"` so the plan still reads root-first.

use crate::services::plan_graph::builder::validator::EdgeValidator;
use crate::services::plan_graph::error::{GraphResult, PlanGraphError};
use crate::services::plan_graph::format::{format_percent, group_thousands};
use crate::services::plan_graph::models::{
    GraphBuild, GraphEdge, GraphNode, LabelLine, NodeRef, OperatorNode, OperatorStatsRecord,
    PendingEdge, PlanGraph, RowCountNode,
};
use serde::Deserialize;
use std::collections::HashSet;

/// Build-time switches
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct BuildOptions {
    /// Fail on dangling edge endpoints instead of dropping them
    pub strict: bool,
    /// Add `filter_condition` lines to operator boxes
    pub show_filter_condition: bool,
}

pub struct PlanGraphBuilder {
    options: BuildOptions,
}

impl PlanGraphBuilder {
    pub fn new(options: BuildOptions) -> Self {
        Self { options }
    }

    /// Build the graph for one query, records in delivery order
    pub fn build(&self, records: &[OperatorStatsRecord]) -> GraphResult<GraphBuild> {
        let mut nodes = Vec::with_capacity(records.len() * 2);
        let mut pending = Vec::new();
        let mut seen = HashSet::with_capacity(records.len());

        for record in records {
            if !seen.insert(record.node_id) {
                return Err(PlanGraphError::DuplicateNodeId { node_id: record.node_id });
            }
            nodes.push(GraphNode::Operator(self.operator_node(record, &mut pending)));

            if let Some(rows) = record.input_rows() {
                nodes.push(GraphNode::RowCount(RowCountNode { owner_id: record.node_id, rows }));
                pending.push(PendingEdge {
                    declared_by: record.node_id,
                    edge: GraphEdge::parent_flow(
                        NodeRef::Operator(record.node_id),
                        NodeRef::RowCount(record.node_id),
                    ),
                });
            }

            if let Some(parent_id) = record.parent_id {
                pending.push(PendingEdge {
                    declared_by: record.node_id,
                    edge: GraphEdge::parent_flow(
                        NodeRef::RowCount(parent_id),
                        NodeRef::Operator(record.node_id),
                    ),
                });
            }
        }

        let validator = EdgeValidator::new(&nodes);
        let (edges, warnings) = validator.validate(pending, self.options.strict)?;

        let build = GraphBuild { graph: PlanGraph { nodes, edges }, warnings };
        let summary = build.summary();
        tracing::info!(
            "Built plan graph: {} operators, {} row-count nodes, {} edges ({} dropped)",
            summary.operator_nodes,
            summary.row_count_nodes,
            summary.edges,
            summary.dropped_edges
        );

        Ok(build)
    }

    /// Operator box lines, in fixed display order. Join edges go to `pending`.
    fn operator_node(
        &self,
        record: &OperatorStatsRecord,
        pending: &mut Vec<PendingEdge>,
    ) -> OperatorNode {
        let mut lines = Vec::new();

        if let Some(attributes) = &record.attributes {
            if let Some(table_name) = &attributes.table_name {
                lines.push(LabelLine::new("table_name", table_name.as_str()));
            }
            if self.options.show_filter_condition
                && let Some(condition) = &attributes.filter_condition
            {
                lines.push(LabelLine::new("filter_condition", condition.as_str()));
            }
            if let Some(join_type) = &attributes.join_type {
                lines.push(LabelLine::new("join_type", join_type.as_str()));
            }
            if let Some(join_id) = attributes.join_id {
                pending.push(PendingEdge {
                    declared_by: record.node_id,
                    edge: GraphEdge::join_reference(
                        NodeRef::Operator(record.node_id),
                        NodeRef::Operator(join_id),
                    ),
                });
            }
        }

        // remote_disk_io is only shown alongside a reported overall_percentage,
        // and a zero overall_percentage is hidden (pruned or skipped operators)
        if let Some(execution_time) = &record.execution_time
            && let Some(overall) = execution_time.overall_percentage
        {
            if overall > 0.0 {
                lines.push(LabelLine::new("overall_percentage", format_percent(overall, 1)));
            }
            if let Some(remote) = execution_time.remote_disk_io {
                lines.push(LabelLine::new("remote_disk_io", format_percent(remote, 0)));
            }
        }

        if let Some(stats) = &record.io_stats {
            if let Some(io) = &stats.io {
                if let Some(bytes) = io.bytes_scanned {
                    lines.push(LabelLine::new("bytes_scanned", group_thousands(bytes)));
                }
                if let Some(cached) = io.percentage_scanned_from_cache {
                    lines.push(LabelLine::new(
                        "percentage_scanned_from_cache",
                        format_percent(cached, 2),
                    ));
                }
                if let Some(bytes) = io.bytes_written_to_result {
                    lines.push(LabelLine::new("bytes_written_to_result", group_thousands(bytes)));
                }
            }
            if let Some(pruning) = &stats.pruning {
                lines.push(LabelLine::new(
                    "partitions_scanned",
                    pruning.partitions_scanned.to_string(),
                ));
                lines.push(LabelLine::new(
                    "partitions_total",
                    pruning.partitions_total.to_string(),
                ));
            }
        }

        OperatorNode { node_id: record.node_id, title: record.step_label.clone(), lines }
    }
}

impl Default for PlanGraphBuilder {
    fn default() -> Self {
        Self::new(BuildOptions::default())
    }
}
