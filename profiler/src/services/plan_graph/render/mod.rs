//! Plan graph renderers

pub mod dot_writer;

pub use dot_writer::{DotWriter, GraphStyle};
