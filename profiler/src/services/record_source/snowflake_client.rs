//! Snowflake SQL API record source
//!
//! Runs `GET_QUERY_OPERATOR_STATS` through `POST /api/v2/statements` and turns
//! the positional result rows into column-keyed [`RawRow`]s.

use crate::config::{ConnectMode, SnowflakeConfig};
use crate::services::plan_graph::RawRow;
use crate::services::record_source::{RecordSource, validate_query_id};
use crate::utils::{AppError, AppResult};
use async_trait::async_trait;
use jsonwebtoken::{Algorithm, EncodingKey, Header};
use reqwest::{Client, StatusCode};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::time::{Duration, Instant};

const KEY_PAIR_TOKEN_LIFETIME_SECS: i64 = 3600;

/// Bearer credential for the SQL API
#[derive(Debug, Clone)]
pub enum SqlApiAuth {
    OAuth { token: String },
    KeyPairJwt { token: String },
}

impl SqlApiAuth {
    pub fn from_config(config: &SnowflakeConfig) -> AppResult<Self> {
        match config.connect_mode {
            ConnectMode::OAuth => {
                let token = std::env::var(&config.token_env).map_err(|_| {
                    AppError::config(format!(
                        "OAuth mode needs a token in the {} environment variable",
                        config.token_env
                    ))
                })?;
                Ok(Self::OAuth { token })
            },
            ConnectMode::KeyPair => Ok(Self::KeyPairJwt { token: key_pair_jwt(config)? }),
            ConnectMode::Password => Err(AppError::unsupported_connect_mode(
                config.connect_mode.to_string(),
                "the SQL API does not accept passwords; use oauth or key_pair",
            )),
            ConnectMode::Sso => Err(AppError::unsupported_connect_mode(
                config.connect_mode.to_string(),
                "browser SSO is not available to a non-interactive client; use oauth or key_pair",
            )),
        }
    }

    fn token(&self) -> &str {
        match self {
            Self::OAuth { token } | Self::KeyPairJwt { token } => token,
        }
    }

    fn token_type(&self) -> &'static str {
        match self {
            Self::OAuth { .. } => "OAUTH",
            Self::KeyPairJwt { .. } => "KEYPAIR_JWT",
        }
    }
}

#[derive(Debug, Serialize)]
struct KeyPairClaims {
    iss: String,
    sub: String,
    iat: i64,
    exp: i64,
}

/// Account name as it appears in JWT claims: upper case, region suffix removed
fn jwt_account(account: &str) -> String {
    let account = account.split('.').next().unwrap_or(account);
    account.to_uppercase()
}

fn key_pair_jwt(config: &SnowflakeConfig) -> AppResult<String> {
    let fingerprint = config.public_key_fingerprint.as_deref().ok_or_else(|| {
        AppError::config("key_pair mode needs snowflake.public_key_fingerprint (SHA256:...)")
    })?;

    let key_path = config.resolved_private_key_path();
    let pem = std::fs::read(&key_path).map_err(|e| {
        AppError::config(format!("cannot read private key {}: {}", key_path.display(), e))
    })?;
    let key = EncodingKey::from_rsa_pem(&pem)
        .map_err(|e| AppError::config(format!("invalid private key: {}", e)))?;

    let qualified_user = format!("{}.{}", jwt_account(&config.account), config.user.to_uppercase());
    let now = chrono::Utc::now().timestamp();
    let claims = KeyPairClaims {
        iss: format!("{}.{}", qualified_user, fingerprint),
        sub: qualified_user,
        iat: now,
        exp: now + KEY_PAIR_TOKEN_LIFETIME_SECS,
    };

    jsonwebtoken::encode(&Header::new(Algorithm::RS256), &claims, &key)
        .map_err(|e| AppError::auth_failed(format!("failed to sign JWT: {}", e)))
}

// ============================================================================
// SQL API payloads
// ============================================================================

#[derive(Debug, Serialize)]
struct StatementRequest<'a> {
    statement: String,
    timeout: u64,
    #[serde(skip_serializing_if = "Option::is_none")]
    warehouse: Option<&'a str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    database: Option<&'a str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    schema: Option<&'a str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    role: Option<&'a str>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ColumnType {
    pub name: String,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PartitionInfo {
    #[serde(default)]
    pub row_count: u64,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ResultSetMetaData {
    #[serde(default)]
    pub row_type: Vec<ColumnType>,
    #[serde(default)]
    pub partition_info: Vec<PartitionInfo>,
}

/// Body of a `200 OK` statement response
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StatementResponse {
    pub statement_handle: String,
    #[serde(default)]
    pub result_set_meta_data: ResultSetMetaData,
    #[serde(default)]
    pub data: Vec<Vec<Option<String>>>,
}

/// Body of `202 Accepted` and error responses
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct StatementStatus {
    #[serde(default)]
    statement_handle: Option<String>,
    #[serde(default)]
    statement_status_url: Option<String>,
    #[serde(default)]
    message: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
struct PartitionResponse {
    #[serde(default)]
    data: Vec<Vec<Option<String>>>,
}

/// Zip positional cells with column names; SQL NULL becomes JSON null
///
/// Every data row must carry exactly one cell per column.
pub fn rows_from_result(
    columns: &[ColumnType],
    data: Vec<Vec<Option<String>>>,
) -> AppResult<Vec<RawRow>> {
    data.into_iter()
        .enumerate()
        .map(|(index, cells)| {
            if cells.len() != columns.len() {
                return Err(AppError::invalid_input(format!(
                    "result row {} has {} cells but rowType lists {} columns",
                    index,
                    cells.len(),
                    columns.len()
                )));
            }
            Ok(columns
                .iter()
                .zip(cells)
                .map(|(column, cell)| {
                    (column.name.clone(), cell.map(Value::String).unwrap_or(Value::Null))
                })
                .collect())
        })
        .collect()
}

/// Map a failed SQL API response onto an application error
///
/// `message` is the `message` field of the error body, or the raw body.
pub fn classify_status(
    query_id: &str,
    status: StatusCode,
    message: &str,
    timeout_secs: u64,
) -> AppError {
    match status {
        StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => AppError::auth_failed(message),
        StatusCode::NOT_FOUND => AppError::query_not_found(query_id),
        StatusCode::UNPROCESSABLE_ENTITY => {
            let lowered = message.to_lowercase();
            if lowered.contains("not found")
                || lowered.contains("does not exist")
                || lowered.contains("invalid query id")
            {
                AppError::query_not_found(query_id)
            } else {
                AppError::source_connection_failed(format!("statement failed: {}", message))
            }
        },
        StatusCode::REQUEST_TIMEOUT | StatusCode::GATEWAY_TIMEOUT => {
            AppError::SourceTimeout { seconds: timeout_secs }
        },
        _ => AppError::source_connection_failed(format!("HTTP {}: {}", status, message)),
    }
}

// ============================================================================
// Client
// ============================================================================

pub struct SnowflakeRecordSource {
    http_client: Client,
    config: SnowflakeConfig,
    auth: SqlApiAuth,
}

impl SnowflakeRecordSource {
    pub fn from_config(config: &SnowflakeConfig) -> AppResult<Self> {
        if config.account.trim().is_empty() {
            return Err(AppError::config("snowflake.account is required"));
        }
        if config.user.trim().is_empty() {
            return Err(AppError::config("snowflake.user is required"));
        }

        let auth = SqlApiAuth::from_config(config)?;
        let http_client = Client::builder()
            .timeout(Duration::from_secs(config.request_timeout))
            .user_agent(concat!("sf-query-profiler/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|e| AppError::internal_error(format!("HTTP client setup failed: {}", e)))?;

        Ok(Self { http_client, config: config.clone(), auth })
    }

    pub fn get_base_url(&self) -> String {
        format!("https://{}.snowflakecomputing.com", self.config.account)
    }

    fn statement_sql(query_id: &str) -> String {
        format!("select * from table(GET_QUERY_OPERATOR_STATS('{}'))", query_id.trim())
    }

    fn authorize(&self, request: reqwest::RequestBuilder) -> reqwest::RequestBuilder {
        request
            .bearer_auth(self.auth.token())
            .header("X-Snowflake-Authorization-Token-Type", self.auth.token_type())
            .header("Accept", "application/json")
    }

    fn map_send_error(&self, err: reqwest::Error) -> AppError {
        if err.is_timeout() {
            AppError::SourceTimeout { seconds: self.config.request_timeout }
        } else if err.is_connect() {
            AppError::source_connection_failed(err.to_string())
        } else {
            AppError::Http(err)
        }
    }

    async fn submit(&self, query_id: &str) -> AppResult<reqwest::Response> {
        let url = format!(
            "{}/api/v2/statements?requestId={}",
            self.get_base_url(),
            uuid::Uuid::new_v4()
        );
        let body = StatementRequest {
            statement: Self::statement_sql(query_id),
            timeout: self.config.request_timeout,
            warehouse: self.config.warehouse.as_deref(),
            database: self.config.database.as_deref(),
            schema: self.config.schema.as_deref(),
            role: self.config.role.as_deref(),
        };

        tracing::debug!("Submitting statement: {}", body.statement);
        self.authorize(self.http_client.post(&url))
            .json(&body)
            .send()
            .await
            .map_err(|e| self.map_send_error(e))
    }

    /// Follow `202 Accepted` responses until the result is ready
    async fn wait_for_result(
        &self,
        query_id: &str,
        mut response: reqwest::Response,
    ) -> AppResult<StatementResponse> {
        let started = Instant::now();
        let deadline = Duration::from_secs(self.config.request_timeout);

        loop {
            let status = response.status();
            match status {
                StatusCode::OK => return response.json().await.map_err(AppError::from),
                StatusCode::ACCEPTED => {
                    let pending: StatementStatus = response.json().await?;
                    let status_url = match pending.statement_status_url {
                        Some(url) => url,
                        None => match pending.statement_handle {
                            Some(handle) => format!("/api/v2/statements/{}", handle),
                            None => {
                                return Err(AppError::source_connection_failed(
                                    "202 response without a statement handle",
                                ));
                            },
                        },
                    };

                    if started.elapsed() >= deadline {
                        let seconds = self.config.request_timeout;
                        return Err(AppError::SourceTimeout { seconds });
                    }
                    tokio::time::sleep(Duration::from_millis(self.config.poll_interval_ms)).await;

                    tracing::debug!("Polling statement status at {}", status_url);
                    let url = format!("{}{}", self.get_base_url(), status_url);
                    response = self
                        .authorize(self.http_client.get(&url))
                        .send()
                        .await
                        .map_err(|e| self.map_send_error(e))?;
                },
                _ => return Err(self.status_error(query_id, status, response).await),
            }
        }
    }

    async fn status_error(
        &self,
        query_id: &str,
        status: StatusCode,
        response: reqwest::Response,
    ) -> AppError {
        let text = response.text().await.unwrap_or_default();
        let message = serde_json::from_str::<StatementStatus>(&text)
            .ok()
            .and_then(|s| s.message)
            .unwrap_or(text);

        classify_status(query_id, status, &message, self.config.request_timeout)
    }

    async fn fetch_partition(
        &self,
        query_id: &str,
        handle: &str,
        partition: usize,
    ) -> AppResult<PartitionResponse> {
        let url = format!(
            "{}/api/v2/statements/{}?partition={}",
            self.get_base_url(),
            handle,
            partition
        );
        let response = self
            .authorize(self.http_client.get(&url))
            .send()
            .await
            .map_err(|e| self.map_send_error(e))?;

        if response.status() != StatusCode::OK {
            let status = response.status();
            return Err(self.status_error(query_id, status, response).await);
        }
        response.json().await.map_err(AppError::from)
    }
}

#[async_trait]
impl RecordSource for SnowflakeRecordSource {
    fn describe(&self) -> String {
        format!(
            "Snowflake account {} as {} ({})",
            self.config.account, self.config.user, self.config.connect_mode
        )
    }

    async fn fetch_rows(&self, query_id: &str) -> AppResult<Vec<RawRow>> {
        validate_query_id(query_id)?;

        let response = self.submit(query_id).await?;
        let result = self.wait_for_result(query_id, response).await?;

        let columns = result.result_set_meta_data.row_type;
        let partitions = result.result_set_meta_data.partition_info.len();
        let mut rows = rows_from_result(&columns, result.data)?;

        for partition in 1..partitions {
            let page =
                self.fetch_partition(query_id, &result.statement_handle, partition).await?;
            rows.extend(rows_from_result(&columns, page.data)?);
        }

        tracing::info!(
            "Fetched {} operator rows for query {} ({} partitions)",
            rows.len(),
            query_id,
            partitions.max(1)
        );
        Ok(rows)
    }
}
