pub mod html_export;
pub mod plan_graph;
pub mod record_source;

pub use html_export::HtmlExporter;
pub use plan_graph::{BuildOptions, GraphStyle, RenderedPlan, render_records, render_rows};
pub use record_source::{FileRecordSource, RecordSource, SnowflakeRecordSource};
