//! Operator row parser
//!
//! Decodes raw `GET_QUERY_OPERATOR_STATS` rows into typed records.

pub mod row_parser;

pub use row_parser::{RawRow, RowParser};
