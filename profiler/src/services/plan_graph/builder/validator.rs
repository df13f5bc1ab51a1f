//! Edge endpoint validation
//!
//! Runs after every node is declared, so forward references to records that
//! appear later in the input resolve normally.

use crate::services::plan_graph::error::{GraphResult, PlanGraphError};
use crate::services::plan_graph::models::{
    DanglingReference, GraphEdge, GraphNode, NodeRef, PendingEdge,
};
use std::collections::HashSet;

pub struct EdgeValidator {
    declared: HashSet<NodeRef>,
}

impl EdgeValidator {
    pub fn new(nodes: &[GraphNode]) -> Self {
        Self { declared: nodes.iter().map(GraphNode::node_ref).collect() }
    }

    pub fn is_declared(&self, node: NodeRef) -> bool {
        self.declared.contains(&node)
    }

    /// Keep edges whose endpoints both exist.
    ///
    /// Strict mode fails on the first dangling edge; otherwise the edge is
    /// dropped and reported back as a warning.
    pub fn validate(
        &self,
        pending: Vec<PendingEdge>,
        strict: bool,
    ) -> GraphResult<(Vec<GraphEdge>, Vec<DanglingReference>)> {
        let mut edges = Vec::with_capacity(pending.len());
        let mut warnings = Vec::new();

        for PendingEdge { declared_by, edge } in pending {
            if self.is_declared(edge.from) && self.is_declared(edge.to) {
                edges.push(edge);
                continue;
            }

            let reference =
                DanglingReference { declared_by, from: edge.from, to: edge.to, kind: edge.kind };
            if strict {
                return Err(PlanGraphError::DanglingReference(reference));
            }
            tracing::warn!("Dropping edge: {}", reference);
            warnings.push(reference);
        }

        Ok((edges, warnings))
    }
}
