use thiserror::Error;

use crate::services::plan_graph::PlanGraphError;

/// Application error with context for each failure class
///
/// Codes are grouped by concern so CLI wrappers can branch on them:
/// 1xxx configuration, 2xxx record source, 3xxx not found, 4xxx input,
/// 5xxx internal.
#[derive(Error, Debug)]
pub enum AppError {
    // Configuration errors 1xxx
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Unsupported connect mode '{mode}': {reason}")]
    UnsupportedConnectMode { mode: String, reason: String },

    // Record source errors 2xxx
    #[error("Failed to connect to Snowflake: {message}")]
    SourceConnectionFailed { message: String },

    #[error("Snowflake request timed out after {seconds}s")]
    SourceTimeout { seconds: u64 },

    #[error("Snowflake authentication failed: {0}")]
    SourceAuthFailed(String),

    // Resource errors 3xxx
    #[error("Query {query_id} not found")]
    QueryNotFound { query_id: String },

    #[error("File not found: {0}")]
    FileNotFound(String),

    // Input errors 4xxx
    #[error("Invalid query id: {0}")]
    InvalidQueryId(String),

    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("Plan graph error: {0}")]
    Graph(#[from] PlanGraphError),

    // System errors 5xxx
    #[error("Internal error: {0}")]
    InternalError(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    // Generic wrapper for other errors - auto-convert from anyhow::Error
    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

impl AppError {
    pub fn config(message: impl Into<String>) -> Self {
        Self::Config(message.into())
    }

    pub fn unsupported_connect_mode(mode: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::UnsupportedConnectMode { mode: mode.into(), reason: reason.into() }
    }

    pub fn source_connection_failed(message: impl Into<String>) -> Self {
        Self::SourceConnectionFailed { message: message.into() }
    }

    pub fn auth_failed(message: impl Into<String>) -> Self {
        Self::SourceAuthFailed(message.into())
    }

    pub fn query_not_found(query_id: impl Into<String>) -> Self {
        Self::QueryNotFound { query_id: query_id.into() }
    }

    pub fn invalid_input(message: impl Into<String>) -> Self {
        Self::InvalidInput(message.into())
    }

    pub fn internal_error(message: impl Into<String>) -> Self {
        Self::InternalError(message.into())
    }

    pub fn error_code(&self) -> i32 {
        match self {
            // Configuration errors 1xxx
            Self::Config(_) => 1001,
            Self::UnsupportedConnectMode { .. } => 1002,

            // Record source errors 2xxx
            Self::SourceConnectionFailed { .. } => 2001,
            Self::SourceTimeout { .. } => 2002,
            Self::SourceAuthFailed(_) => 2003,
            Self::Http(_) => 2004,

            // Resource errors 3xxx
            Self::QueryNotFound { .. } => 3001,
            Self::FileNotFound(_) => 3002,

            // Input errors 4xxx
            Self::InvalidQueryId(_) => 4001,
            Self::InvalidInput(_) => 4002,
            Self::Graph(PlanGraphError::MissingIdentifier { .. }) => 4101,
            Self::Graph(PlanGraphError::MalformedRecord { .. }) => 4102,
            Self::Graph(PlanGraphError::DuplicateNodeId { .. }) => 4103,
            Self::Graph(PlanGraphError::DanglingReference(_)) => 4104,
            Self::Graph(PlanGraphError::InvalidIdentifier { .. }) => 4105,

            // System errors 5xxx
            Self::InternalError(_) => 5001,
            Self::Io(_) => 5002,
            Self::Other(_) => 5001,
        }
    }

    /// Process exit status for the CLI
    pub fn exit_code(&self) -> i32 {
        match self.error_code() {
            1000..=1999 => 3,
            2000..=2999 => 4,
            3000..=3999 => 5,
            4000..=4999 => 6,
            _ => 1,
        }
    }
}

impl From<serde_json::Error> for AppError {
    fn from(err: serde_json::Error) -> Self {
        AppError::invalid_input(format!("JSON error: {}", err))
    }
}

pub type AppResult<T> = Result<T, AppError>;
