//! Graphviz DOT serialization
//!
//! Output layout: global directives, then node declarations, then edge
//! declarations, all wrapped in a single `digraph G { ... }`.

use crate::services::plan_graph::format::{escape_label, group_thousands};
use crate::services::plan_graph::models::{
    EdgeKind, GraphEdge, GraphNode, OperatorNode, PlanGraph, RowCountNode,
};
use serde::Deserialize;
use std::fmt;

/// Colours and pens used by the writer
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct GraphStyle {
    pub background: String,
    pub edge_color: String,
    pub edge_pen_width: u32,
    /// Gradient fill of operator boxes
    pub operator_fill: String,
    pub operator_border: String,
    pub text_color: String,
    pub row_count_fill: String,
}

impl Default for GraphStyle {
    fn default() -> Self {
        Self {
            background: "#ffffff".to_string(),
            edge_color: "#696969".to_string(),
            edge_pen_width: 1,
            operator_fill: "#d3dcef:#ffffff".to_string(),
            operator_border: "#716f64".to_string(),
            text_color: "#000000".to_string(),
            row_count_fill: "#ffffff".to_string(),
        }
    }
}

impl GraphStyle {
    fn colours(&self) -> [(&'static str, &String); 6] {
        [
            ("background", &self.background),
            ("edge_color", &self.edge_color),
            ("operator_fill", &self.operator_fill),
            ("operator_border", &self.operator_border),
            ("text_color", &self.text_color),
            ("row_count_fill", &self.row_count_fill),
        ]
    }

    /// Names of colour settings left empty
    pub fn empty_fields(&self) -> Vec<&'static str> {
        self.colours()
            .into_iter()
            .filter(|(_, value)| value.trim().is_empty())
            .map(|(name, _)| name)
            .collect()
    }

    /// Names of colour settings that cannot sit inside a quoted DOT attribute
    pub fn unquotable_fields(&self) -> Vec<&'static str> {
        self.colours()
            .into_iter()
            .filter(|(_, value)| value.contains(['"', '\\', '<', '>', '\n']))
            .map(|(name, _)| name)
            .collect()
    }
}

pub struct DotWriter<'a> {
    style: &'a GraphStyle,
}

impl<'a> DotWriter<'a> {
    pub fn new(style: &'a GraphStyle) -> Self {
        Self { style }
    }

    pub fn write(&self, graph: &PlanGraph) -> String {
        DotDocument { writer: self, graph }.to_string()
    }

    fn fmt_dot(&self, graph: &PlanGraph, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "digraph G {{")?;
        writeln!(f, "  graph [ rankdir=\"TB\" bgcolor=\"{}\" ]", self.style.background)?;
        writeln!(
            f,
            "  edge [ penwidth=\"{}\" color=\"{}\" dir=\"back\" style=\"solid\" ]\n",
            self.style.edge_pen_width, self.style.edge_color
        )?;

        for node in &graph.nodes {
            match node {
                GraphNode::Operator(op) => self.fmt_operator(op, f)?,
                GraphNode::RowCount(rc) => self.fmt_row_count(rc, f)?,
            }
        }
        writeln!(f)?;

        for edge in &graph.edges {
            Self::fmt_edge(edge, f)?;
        }
        writeln!(f, "}}")
    }

    fn fmt_operator(&self, node: &OperatorNode, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let text_color = &self.style.text_color;

        writeln!(f, "  n{} [", node.node_id)?;
        writeln!(f, "    style=\"filled\" shape=\"record\"")?;
        writeln!(
            f,
            "    fillcolor=\"{}\" color=\"{}\" penwidth=\"1\"",
            self.style.operator_fill, self.style.operator_border
        )?;
        writeln!(
            f,
            "    label=<<table style=\"rounded\" border=\"0\" cellborder=\"0\" \
             cellspacing=\"0\" cellpadding=\"1\">"
        )?;
        writeln!(
            f,
            "      <tr><td bgcolor=\"transparent\" align=\"center\">\
             <font color=\"{}\"><b>{}</b></font></td></tr>",
            text_color,
            escape_label(&node.title)
        )?;
        for line in &node.lines {
            writeln!(
                f,
                "      <tr><td align=\"left\"><font color=\"{}\">{}: {}</font></td></tr>",
                text_color,
                line.key,
                escape_label(&line.value)
            )?;
        }
        writeln!(f, "    </table>>")?;
        writeln!(f, "  ]")
    }

    fn fmt_row_count(&self, node: &RowCountNode, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(
            f,
            "  i{} [ label=\"{}\" style=\"filled\" shape=\"oval\" fillcolor=\"{}\" ]",
            node.owner_id,
            group_thousands(node.rows),
            self.style.row_count_fill
        )
    }

    fn fmt_edge(edge: &GraphEdge, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match edge.kind {
            EdgeKind::ParentFlow => writeln!(f, "  {} -> {};", edge.from, edge.to),
            EdgeKind::JoinReference => writeln!(
                f,
                "  {} -> {} [ dir=\"forward\" style=\"dashed\" ];",
                edge.from, edge.to
            ),
        }
    }
}

/// A graph paired with the writer that renders it
struct DotDocument<'w, 'g> {
    writer: &'w DotWriter<'w>,
    graph: &'g PlanGraph,
}

impl fmt::Display for DotDocument<'_, '_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.writer.fmt_dot(self.graph, f)
    }
}
