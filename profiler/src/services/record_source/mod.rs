//! Operator-stats record sources
//!
//! A source returns the raw `GET_QUERY_OPERATOR_STATS` rows of one query, in
//! the order the profiler reported them. Decoding into typed records is left
//! to [`crate::services::plan_graph::RowParser`].

pub mod file_source;
pub mod snowflake_client;

pub use file_source::FileRecordSource;
pub use snowflake_client::SnowflakeRecordSource;

use crate::services::plan_graph::RawRow;
use crate::utils::{AppError, AppResult};
use async_trait::async_trait;
use once_cell::sync::Lazy;
use regex::Regex;

static QUERY_ID_REGEX: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^[0-9a-fA-F]{8}-[0-9a-fA-F]{4}-[0-9a-fA-F]{4}-[0-9a-fA-F]{4}-[0-9a-fA-F]{12}$")
        .unwrap()
});

#[async_trait]
pub trait RecordSource: Send + Sync {
    /// Short description for logs
    fn describe(&self) -> String;

    async fn fetch_rows(&self, query_id: &str) -> AppResult<Vec<RawRow>>;
}

/// Snowflake query ids are UUID-shaped; anything else is rejected before it
/// reaches SQL text.
pub fn validate_query_id(query_id: &str) -> AppResult<()> {
    if QUERY_ID_REGEX.is_match(query_id.trim()) {
        Ok(())
    } else {
        Err(AppError::InvalidQueryId(query_id.to_string()))
    }
}
