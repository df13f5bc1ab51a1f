//! Query Plan Graph
//!
//! Turns the flat rows of Snowflake's `GET_QUERY_OPERATOR_STATS` into a
//! Graphviz DOT description of the query plan, one annotated box per operator.
//!
//! # Architecture
//!
//! ```text
//!  raw rows ──► RowParser ──► OperatorStatsRecord[]
//!                                   │
//!                                   ▼
//!                          PlanGraphBuilder
//!                    ┌──────────────┴──────────────┐
//!                    │ phase 1: declare nodes,     │
//!                    │          collect edges      │
//!                    │ phase 2: EdgeValidator      │
//!                    └──────────────┬──────────────┘
//!                                   ▼
//!                 PlanGraph ──► DotWriter ──► DOT text
//! ```
//!
//! # Usage
//!
//! ```ignore
//! use sf_query_profiler::services::plan_graph::{render_rows, BuildOptions, GraphStyle};
//!
//! let rendered = render_rows(&rows, BuildOptions::default(), &GraphStyle::default())?;
//! println!("{}", rendered.dot);
//! for warning in &rendered.warnings {
//!     eprintln!("{}", warning);
//! }
//! ```

pub mod builder;
pub mod error;
pub mod format;
pub mod models;
pub mod parser;
pub mod render;

#[cfg(test)]
mod tests;

pub use builder::{BuildOptions, PlanGraphBuilder};
pub use error::{GraphResult, PlanGraphError};
pub use models::*;
pub use parser::{RawRow, RowParser};
pub use render::{DotWriter, GraphStyle};

/// DOT text plus what the build had to say about it
#[derive(Debug, Clone)]
pub struct RenderedPlan {
    pub dot: String,
    pub summary: GraphSummary,
    pub warnings: Vec<DanglingReference>,
}

/// Parse raw rows and render them
pub fn render_rows(
    rows: &[RawRow],
    options: BuildOptions,
    style: &GraphStyle,
) -> GraphResult<RenderedPlan> {
    let records = RowParser::parse_rows(rows)?;
    render_records(&records, options, style)
}

/// Render already-typed records
pub fn render_records(
    records: &[OperatorStatsRecord],
    options: BuildOptions,
    style: &GraphStyle,
) -> GraphResult<RenderedPlan> {
    let build = PlanGraphBuilder::new(options).build(records)?;
    let dot = DotWriter::new(style).write(&build.graph);
    Ok(RenderedPlan { dot, summary: build.summary(), warnings: build.warnings })
}
