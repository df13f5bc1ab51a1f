//! Plan graph construction

pub mod graph_builder;
pub mod validator;

pub use graph_builder::{BuildOptions, PlanGraphBuilder};
pub use validator::EdgeValidator;
