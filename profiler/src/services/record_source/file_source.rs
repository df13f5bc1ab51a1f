//! JSON export record source
//!
//! Accepts either a bare array of row objects or `{ "rows": [...] }`, which
//! covers exports from Snowsight, SnowSQL `-o output_format=json` and saved
//! SQL API payloads that were flattened to objects.

use crate::services::plan_graph::RawRow;
use crate::services::record_source::RecordSource;
use crate::utils::{AppError, AppResult};
use async_trait::async_trait;
use serde_json::Value;
use std::path::{Path, PathBuf};

pub struct FileRecordSource {
    path: PathBuf,
}

impl FileRecordSource {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

#[async_trait]
impl RecordSource for FileRecordSource {
    fn describe(&self) -> String {
        format!("file {}", self.path.display())
    }

    async fn fetch_rows(&self, query_id: &str) -> AppResult<Vec<RawRow>> {
        let text = tokio::fs::read_to_string(&self.path).await.map_err(|e| {
            if e.kind() == std::io::ErrorKind::NotFound {
                AppError::FileNotFound(self.path.display().to_string())
            } else {
                AppError::Io(e)
            }
        })?;

        let document: Value = serde_json::from_str(&text).map_err(|e| {
            AppError::invalid_input(format!("{} is not valid JSON: {}", self.path.display(), e))
        })?;

        let rows = rows_from_document(document)?;
        tracing::debug!(
            "Loaded {} operator rows for query {} from {}",
            rows.len(),
            query_id,
            self.path.display()
        );
        Ok(rows)
    }
}

/// Extract row objects from an exported JSON document
pub fn rows_from_document(document: Value) -> AppResult<Vec<RawRow>> {
    let items = match document {
        Value::Array(items) => items,
        Value::Object(mut map) => match map.remove("rows") {
            Some(Value::Array(items)) => items,
            _ => {
                return Err(AppError::invalid_input(
                    "expected a JSON array of rows or an object with a 'rows' array",
                ));
            },
        },
        _ => {
            return Err(AppError::invalid_input(
                "expected a JSON array of rows or an object with a 'rows' array",
            ));
        },
    };

    items
        .into_iter()
        .enumerate()
        .map(|(index, item)| match item {
            Value::Object(row) => Ok(row),
            _ => Err(AppError::invalid_input(format!("row {} is not a JSON object", index))),
        })
        .collect()
}
