//! Plan graph data models
//!
//! Input records mirror one row of `GET_QUERY_OPERATOR_STATS`. Graph models are
//! built per call and only live long enough to be serialized.

use serde::{Deserialize, Serialize};
use std::fmt;

// ============================================================================
// Operator Statistics Records (input)
// ============================================================================

/// One operator row as delivered by the profiling source
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OperatorStatsRecord {
    pub node_id: i64,
    pub parent_id: Option<i64>,
    pub step_label: String,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub io_stats: Option<IoStatistics>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub execution_time: Option<ExecutionTimeBreakdown>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub attributes: Option<OperatorAttributes>,
}

impl OperatorStatsRecord {
    /// Record with identifiers only
    pub fn new(node_id: i64, step_label: impl Into<String>) -> Self {
        Self {
            node_id,
            parent_id: None,
            step_label: step_label.into(),
            io_stats: None,
            execution_time: None,
            attributes: None,
        }
    }

    pub fn with_parent(mut self, parent_id: i64) -> Self {
        self.parent_id = Some(parent_id);
        self
    }

    pub fn with_io_stats(mut self, io_stats: IoStatistics) -> Self {
        self.io_stats = Some(io_stats);
        self
    }

    pub fn with_execution_time(mut self, execution_time: ExecutionTimeBreakdown) -> Self {
        self.execution_time = Some(execution_time);
        self
    }

    pub fn with_attributes(mut self, attributes: OperatorAttributes) -> Self {
        self.attributes = Some(attributes);
        self
    }

    /// Rows emitted by this operator, if reported
    pub fn input_rows(&self) -> Option<u64> {
        self.io_stats.as_ref().and_then(|s| s.input_rows)
    }

    pub fn join_id(&self) -> Option<i64> {
        self.attributes.as_ref().and_then(|a| a.join_id)
    }
}

/// `OPERATOR_STATISTICS` column
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct IoStatistics {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub io: Option<IoCounters>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pruning: Option<PruningStats>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub input_rows: Option<u64>,
}

/// `OPERATOR_STATISTICS.io`
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct IoCounters {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub bytes_scanned: Option<u64>,
    /// Fraction 0.0 - 1.0
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub percentage_scanned_from_cache: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub bytes_written_to_result: Option<u64>,
}

/// `OPERATOR_STATISTICS.pruning`
///
/// Both counters are required once the section exists.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PruningStats {
    pub partitions_scanned: u64,
    pub partitions_total: u64,
}

/// `EXECUTION_TIME_BREAKDOWN` column, fractions 0.0 - 1.0
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ExecutionTimeBreakdown {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub overall_percentage: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub remote_disk_io: Option<f64>,
}

/// `OPERATOR_ATTRIBUTES` column
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct OperatorAttributes {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub table_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub join_type: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub join_id: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub filter_condition: Option<String>,
}

// ============================================================================
// Plan Graph (output)
// ============================================================================

/// Identifier of a declared graph node
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum NodeRef {
    /// Operator box, rendered as `n<id>`
    Operator(i64),
    /// Row-count oval owned by an operator, rendered as `i<id>`
    RowCount(i64),
}

impl fmt::Display for NodeRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            NodeRef::Operator(id) => write!(f, "n{}", id),
            NodeRef::RowCount(id) => write!(f, "i{}", id),
        }
    }
}

/// One `key: value` row inside an operator box
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct LabelLine {
    pub key: &'static str,
    pub value: String,
}

impl LabelLine {
    pub fn new(key: &'static str, value: impl Into<String>) -> Self {
        Self { key, value: value.into() }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct OperatorNode {
    pub node_id: i64,
    pub title: String,
    pub lines: Vec<LabelLine>,
}

impl OperatorNode {
    /// Title plus metric lines
    pub fn label_line_count(&self) -> usize {
        1 + self.lines.len()
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RowCountNode {
    pub owner_id: i64,
    pub rows: u64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub enum GraphNode {
    Operator(OperatorNode),
    RowCount(RowCountNode),
}

impl GraphNode {
    pub fn node_ref(&self) -> NodeRef {
        match self {
            GraphNode::Operator(node) => NodeRef::Operator(node.node_id),
            GraphNode::RowCount(node) => NodeRef::RowCount(node.owner_id),
        }
    }
}

/// Edge flavour, drives the per-edge style override
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum EdgeKind {
    /// Solid data-flow edge, drawn with the graph-wide defaults
    ParentFlow,
    /// Dashed forward edge from a join to the operator supplying its keys
    JoinReference,
}

impl fmt::Display for EdgeKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            EdgeKind::ParentFlow => f.write_str("parent"),
            EdgeKind::JoinReference => f.write_str("join"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub struct GraphEdge {
    pub from: NodeRef,
    pub to: NodeRef,
    pub kind: EdgeKind,
}

impl GraphEdge {
    pub fn parent_flow(from: NodeRef, to: NodeRef) -> Self {
        Self { from, to, kind: EdgeKind::ParentFlow }
    }

    pub fn join_reference(from: NodeRef, to: NodeRef) -> Self {
        Self { from, to, kind: EdgeKind::JoinReference }
    }
}

/// Edge awaiting endpoint validation, tagged with the record that produced it
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PendingEdge {
    pub declared_by: i64,
    pub edge: GraphEdge,
}

/// Fully validated plan graph, nodes and edges in emission order
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct PlanGraph {
    pub nodes: Vec<GraphNode>,
    pub edges: Vec<GraphEdge>,
}

impl PlanGraph {
    pub fn operator_count(&self) -> usize {
        self.nodes.iter().filter(|n| matches!(n, GraphNode::Operator(_))).count()
    }

    pub fn row_count_node_count(&self) -> usize {
        self.nodes.iter().filter(|n| matches!(n, GraphNode::RowCount(_))).count()
    }

    pub fn operator(&self, node_id: i64) -> Option<&OperatorNode> {
        self.nodes.iter().find_map(|n| match n {
            GraphNode::Operator(op) if op.node_id == node_id => Some(op),
            _ => None,
        })
    }
}

/// Edge endpoint that points at a node never declared in the graph
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub struct DanglingReference {
    /// Operator whose record produced the edge
    pub declared_by: i64,
    pub from: NodeRef,
    pub to: NodeRef,
    pub kind: EdgeKind,
}

impl fmt::Display for DanglingReference {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} edge {} -> {} (from operator {}) references an undeclared node",
            self.kind, self.from, self.to, self.declared_by
        )
    }
}

/// Result of one graph build
#[derive(Debug, Clone, Default)]
pub struct GraphBuild {
    pub graph: PlanGraph,
    /// Dropped edges, only populated in lenient mode
    pub warnings: Vec<DanglingReference>,
}

/// Counters logged after each build
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct GraphSummary {
    pub operator_nodes: usize,
    pub row_count_nodes: usize,
    pub edges: usize,
    pub dropped_edges: usize,
}

impl GraphBuild {
    pub fn summary(&self) -> GraphSummary {
        GraphSummary {
            operator_nodes: self.graph.operator_count(),
            row_count_nodes: self.graph.row_count_node_count(),
            edges: self.graph.edges.len(),
            dropped_edges: self.warnings.len(),
        }
    }
}
