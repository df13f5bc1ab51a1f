use serde::Deserialize;
use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};
use std::str::FromStr;

use crate::services::plan_graph::{BuildOptions, GraphStyle};

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
pub struct Config {
    pub snowflake: SnowflakeConfig,
    pub output: OutputConfig,
    pub render: BuildOptions,
    pub style: GraphStyle,
    pub logging: LoggingConfig,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct SnowflakeConfig {
    /// Account identifier, e.g. `myorg-myaccount` or `xy12345.us-east-1`
    pub account: String,
    pub user: String,
    pub warehouse: Option<String>,
    pub database: Option<String>,
    pub schema: Option<String>,
    pub role: Option<String>,
    pub connect_mode: ConnectMode,
    /// Environment variable holding the OAuth token
    pub token_env: String,
    /// PEM-encoded RSA private key for key-pair authentication
    pub private_key_path: String,
    /// `SHA256:...` fingerprint of the registered public key
    pub public_key_fingerprint: Option<String>,
    /// Per-request and overall statement timeout in seconds
    #[serde(deserialize_with = "deserialize_duration_secs")]
    pub request_timeout: u64,
    pub poll_interval_ms: u64,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct OutputConfig {
    pub dir: String,
    pub write_dot: bool,
    pub print_dot: bool,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    pub level: String,
    pub file: Option<String>,
}

/// How the SQL API request is authenticated
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ConnectMode {
    #[default]
    OAuth,
    KeyPair,
    /// Username/password; not accepted by the SQL API
    Password,
    /// Browser-based SSO; not accepted by the SQL API
    Sso,
}

impl FromStr for ConnectMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().replace('-', "_").as_str() {
            "oauth" => Ok(Self::OAuth),
            "key_pair" | "keypair" => Ok(Self::KeyPair),
            "password" | "pwd" => Ok(Self::Password),
            "sso" | "externalbrowser" => Ok(Self::Sso),
            other => Err(format!("unknown connect mode: {}", other)),
        }
    }
}

impl fmt::Display for ConnectMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::OAuth => "oauth",
            Self::KeyPair => "key_pair",
            Self::Password => "password",
            Self::Sso => "sso",
        };
        f.write_str(name)
    }
}

impl<'de> Deserialize<'de> for ConnectMode {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        let value = String::deserialize(deserializer)?;
        value.parse().map_err(serde::de::Error::custom)
    }
}

/// What `Config::load` did
///
/// Loading happens before the tracing subscriber exists, so the events are
/// kept here and emitted by [`LoadReport::log`] once logging is up.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LoadReport {
    /// File the settings came from; `None` means built-in defaults
    pub source: Option<PathBuf>,
    /// `(setting, new value)` for every applied `APP_*` override
    pub overrides: Vec<(&'static str, String)>,
    /// `APP_*` variables that were set but could not be parsed
    pub rejected: Vec<String>,
}

impl LoadReport {
    pub fn log(&self) {
        match &self.source {
            Some(path) => tracing::debug!("Loaded configuration from {}", path.display()),
            None => tracing::warn!("Configuration file not found, using defaults"),
        }
        for (setting, value) in &self.overrides {
            tracing::info!("Override {} from env: {}", setting, value);
        }
        for message in &self.rejected {
            tracing::warn!("{}", message);
        }
    }
}

impl Config {
    /// Load configuration with environment variable override support
    ///
    /// Loading order:
    /// 1. Load from the explicit path, or the first config file found
    /// 2. Override with environment variables (prefixed with APP_)
    /// 3. Validate the final configuration
    pub fn load(explicit_path: Option<&Path>) -> Result<(Self, LoadReport), anyhow::Error> {
        Self::load_with_env(explicit_path, |key| std::env::var(key).ok())
    }

    /// [`Config::load`] with a custom environment lookup
    pub fn load_with_env(
        explicit_path: Option<&Path>,
        env: impl Fn(&str) -> Option<String>,
    ) -> Result<(Self, LoadReport), anyhow::Error> {
        let mut report = LoadReport::default();

        // 1. Load from config file
        let path = match explicit_path {
            Some(path) => {
                if !path.exists() {
                    anyhow::bail!("Configuration file {} does not exist", path.display());
                }
                Some(path.to_path_buf())
            },
            None => Self::find_config_file(),
        };
        let mut config = match &path {
            Some(path) => Self::from_toml(path)?,
            None => Config::default(),
        };
        report.source = path;

        // 2. Override with environment variables
        config.apply_env_overrides(env, &mut report);

        // 3. Validate configuration
        config.validate()?;

        Ok((config, report))
    }

    /// Apply environment variable overrides
    ///
    /// Supported environment variables:
    /// - APP_SNOWFLAKE_ACCOUNT: Snowflake account identifier
    /// - APP_SNOWFLAKE_USER: Snowflake user name
    /// - APP_SNOWFLAKE_CONNECT_MODE: oauth / key_pair (password and sso are rejected later)
    /// - APP_SNOWFLAKE_REQUEST_TIMEOUT: Timeout in seconds (accepts "30s", "5m")
    /// - APP_OUTPUT_DIR: Directory for generated HTML and DOT files
    /// - APP_RENDER_STRICT: Fail on dangling edges (true/false)
    /// - APP_LOG_LEVEL: Logging level (e.g., "warn,sf_query_profiler=debug")
    fn apply_env_overrides(
        &mut self,
        env: impl Fn(&str) -> Option<String>,
        report: &mut LoadReport,
    ) {
        if let Some(account) = env("APP_SNOWFLAKE_ACCOUNT") {
            self.snowflake.account = account;
            report.overrides.push(("snowflake.account", self.snowflake.account.clone()));
        }

        if let Some(user) = env("APP_SNOWFLAKE_USER") {
            self.snowflake.user = user;
            report.overrides.push(("snowflake.user", self.snowflake.user.clone()));
        }

        if let Some(mode) = env("APP_SNOWFLAKE_CONNECT_MODE") {
            match mode.parse::<ConnectMode>() {
                Ok(val) => {
                    self.snowflake.connect_mode = val;
                    report.overrides.push(("snowflake.connect_mode", val.to_string()));
                },
                Err(e) => report.rejected.push(format!(
                    "Invalid APP_SNOWFLAKE_CONNECT_MODE '{}': {} (keep {})",
                    mode, e, self.snowflake.connect_mode
                )),
            }
        }

        if let Some(timeout) = env("APP_SNOWFLAKE_REQUEST_TIMEOUT") {
            match parse_duration_to_secs(&timeout) {
                Ok(val) => {
                    self.snowflake.request_timeout = val;
                    report.overrides.push(("snowflake.request_timeout", val.to_string()));
                },
                Err(e) => report.rejected.push(format!(
                    "Invalid APP_SNOWFLAKE_REQUEST_TIMEOUT '{}': {} (keep {})",
                    timeout, e, self.snowflake.request_timeout
                )),
            }
        }

        if let Some(dir) = env("APP_OUTPUT_DIR") {
            self.output.dir = dir;
            report.overrides.push(("output.dir", self.output.dir.clone()));
        }

        if let Some(strict) = env("APP_RENDER_STRICT") {
            match strict.trim().parse::<bool>() {
                Ok(val) => {
                    self.render.strict = val;
                    report.overrides.push(("render.strict", val.to_string()));
                },
                Err(e) => report.rejected.push(format!(
                    "Invalid APP_RENDER_STRICT '{}': {} (keep {})",
                    strict, e, self.render.strict
                )),
            }
        }

        if let Some(level) = env("APP_LOG_LEVEL") {
            self.logging.level = level;
            report.overrides.push(("logging.level", self.logging.level.clone()));
        }
    }

    /// Validate configuration
    fn validate(&self) -> Result<(), anyhow::Error> {
        if self.snowflake.request_timeout == 0 {
            anyhow::bail!("snowflake.request_timeout must be > 0");
        }
        if self.snowflake.poll_interval_ms == 0 {
            anyhow::bail!("snowflake.poll_interval_ms must be > 0");
        }

        if self.output.dir.trim().is_empty() {
            anyhow::bail!("output.dir cannot be empty");
        }

        let empty = self.style.empty_fields();
        if !empty.is_empty() {
            anyhow::bail!("style settings cannot be empty: {}", empty.join(", "));
        }
        let unquotable = self.style.unquotable_fields();
        if !unquotable.is_empty() {
            anyhow::bail!(
                "style settings cannot contain quotes, backslashes, '<', '>' or newlines: {}",
                unquotable.join(", ")
            );
        }

        Ok(())
    }

    fn find_config_file() -> Option<PathBuf> {
        let possible_paths =
            ["conf/profiler.toml", "profiler.toml", "conf/config.toml", "config.toml"];

        possible_paths.iter().map(PathBuf::from).find(|path| path.exists())
    }

    fn from_toml(path: &Path) -> Result<Self, anyhow::Error> {
        let content = fs::read_to_string(path)?;
        let config: Config = toml::from_str(&content)?;
        Ok(config)
    }
}

impl SnowflakeConfig {
    /// `private_key_path` with a leading `~` resolved against `$HOME`
    pub fn resolved_private_key_path(&self) -> PathBuf {
        match self.private_key_path.strip_prefix("~/") {
            Some(rest) => match std::env::var_os("HOME") {
                Some(home) => PathBuf::from(home).join(rest),
                None => PathBuf::from(&self.private_key_path),
            },
            None => PathBuf::from(&self.private_key_path),
        }
    }
}

impl Default for SnowflakeConfig {
    fn default() -> Self {
        Self {
            account: String::new(),
            user: String::new(),
            warehouse: None,
            database: None,
            schema: None,
            role: None,
            connect_mode: ConnectMode::default(),
            token_env: "SNOWFLAKE_TOKEN".to_string(),
            private_key_path: "~/.ssh/id_rsa_snowflake_demo".to_string(),
            public_key_fingerprint: None,
            request_timeout: 60,
            poll_interval_ms: 500,
        }
    }
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self { dir: "output".to_string(), write_dot: false, print_dot: true }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self { level: "warn,sf_query_profiler=info".to_string(), file: None }
    }
}

// =========================
// Helpers for parsing values
// =========================

fn parse_duration_to_secs(input: &str) -> Result<u64, String> {
    // Accept plain numbers (treated as seconds)
    if let Ok(val) = input.parse::<u64>() {
        return Ok(val);
    }

    let s = input.trim().to_lowercase();
    let (num_str, unit) = s.split_at(s.chars().take_while(|c| c.is_ascii_digit()).count());
    if num_str.is_empty() || unit.is_empty() {
        return Err("missing number or unit".into());
    }
    let n: u64 = num_str.parse().map_err(|_| "invalid number".to_string())?;
    let multiplier: u64 = match unit {
        "s" | "sec" | "secs" | "second" | "seconds" => 1,
        "m" | "min" | "mins" | "minute" | "minutes" => 60,
        "h" | "hr" | "hour" | "hours" => 60 * 60,
        _ => return Err(format!("unsupported unit: {}", unit)),
    };
    n.checked_mul(multiplier).ok_or_else(|| "duration too large".to_string())
}

// Custom serde deserializer to support numeric or human-friendly string values
fn deserialize_duration_secs<'de, D>(deserializer: D) -> Result<u64, D::Error>
where
    D: serde::Deserializer<'de>,
{
    struct Visitor;
    impl<'de> serde::de::Visitor<'de> for Visitor {
        type Value = u64;
        fn expecting(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
            write!(f, "a number of seconds or a string like '30s', '5m', '1h'")
        }
        fn visit_u64<E>(self, v: u64) -> Result<Self::Value, E> {
            Ok(v)
        }
        fn visit_i64<E>(self, v: i64) -> Result<Self::Value, E>
        where
            E: serde::de::Error,
        {
            if v >= 0 { Ok(v as u64) } else { Err(E::custom("negative not allowed")) }
        }
        fn visit_str<E>(self, v: &str) -> Result<Self::Value, E>
        where
            E: serde::de::Error,
        {
            parse_duration_to_secs(v).map_err(E::custom)
        }
        fn visit_string<E>(self, v: String) -> Result<Self::Value, E>
        where
            E: serde::de::Error,
        {
            parse_duration_to_secs(&v).map_err(E::custom)
        }
    }
    deserializer.deserialize_any(Visitor)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    #[test]
    fn test_parse_duration_to_secs() {
        assert_eq!(parse_duration_to_secs("45"), Ok(45));
        assert_eq!(parse_duration_to_secs("30s"), Ok(30));
        assert_eq!(parse_duration_to_secs("5m"), Ok(300));
        assert_eq!(parse_duration_to_secs("1h"), Ok(3600));
        assert!(parse_duration_to_secs("7d").is_err());
        assert!(parse_duration_to_secs("soon").is_err());
    }

    #[test]
    fn test_connect_mode_aliases() {
        assert_eq!("OAUTH".parse::<ConnectMode>(), Ok(ConnectMode::OAuth));
        assert_eq!("KEY-PAIR".parse::<ConnectMode>(), Ok(ConnectMode::KeyPair));
        assert_eq!("PWD".parse::<ConnectMode>(), Ok(ConnectMode::Password));
        assert_eq!("SSO".parse::<ConnectMode>(), Ok(ConnectMode::Sso));
        assert!("kerberos".parse::<ConnectMode>().is_err());
    }

    #[test]
    fn test_toml_sections() {
        let config: Config = toml::from_str(
            r##"
[snowflake]
account = "myorg-acct"
user = "ANALYST"
connect_mode = "KEY-PAIR"
public_key_fingerprint = "SHA256:abc="
request_timeout = "2m"

[output]
dir = "plans"
write_dot = true

[render]
strict = true

[style]
background = "#fafafa"
"##,
        )
        .unwrap();

        assert_eq!(config.snowflake.account, "myorg-acct");
        assert_eq!(config.snowflake.connect_mode, ConnectMode::KeyPair);
        assert_eq!(config.snowflake.request_timeout, 120);
        assert_eq!(config.snowflake.token_env, "SNOWFLAKE_TOKEN");
        assert_eq!(config.output.dir, "plans");
        assert!(config.output.print_dot);
        assert!(config.render.strict);
        assert!(!config.render.show_filter_condition);
        assert_eq!(config.style.background, "#fafafa");
        assert_eq!(config.style.edge_color, "#696969");
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_bundled_config_loads() {
        let config = Config::from_toml(&bundled_config()).unwrap();

        assert_eq!(config.snowflake.connect_mode, ConnectMode::OAuth);
        assert_eq!(config.snowflake.request_timeout, 60);
        assert_eq!(config.output.dir, "output");
        assert!(config.logging.file.is_none());
        assert!(config.validate().is_ok());
    }

    fn bundled_config() -> PathBuf {
        Path::new(env!("CARGO_MANIFEST_DIR")).join("conf/profiler.toml")
    }

    #[test]
    fn test_load_reports_env_overrides() {
        let env = HashMap::from([
            ("APP_OUTPUT_DIR", "/tmp/plans"),
            ("APP_RENDER_STRICT", "true"),
            ("APP_SNOWFLAKE_REQUEST_TIMEOUT", "2m"),
        ]);
        let path = bundled_config();
        let (config, report) =
            Config::load_with_env(Some(&path), |key| env.get(key).map(|v| v.to_string()))
                .unwrap();

        assert_eq!(config.output.dir, "/tmp/plans");
        assert!(config.render.strict);
        assert_eq!(config.snowflake.request_timeout, 120);
        assert_eq!(report.source, Some(path));
        assert_eq!(
            report.overrides,
            vec![
                ("snowflake.request_timeout", "120".to_string()),
                ("output.dir", "/tmp/plans".to_string()),
                ("render.strict", "true".to_string()),
            ]
        );
        assert!(report.rejected.is_empty());
    }

    #[test]
    fn test_load_reports_rejected_overrides() {
        let env = HashMap::from([
            ("APP_RENDER_STRICT", "yes please"),
            ("APP_SNOWFLAKE_CONNECT_MODE", "kerberos"),
        ]);
        let (config, report) = Config::load_with_env(Some(&bundled_config()), |key| {
            env.get(key).map(|v| v.to_string())
        })
        .unwrap();

        assert!(!config.render.strict);
        assert_eq!(config.snowflake.connect_mode, ConnectMode::OAuth);
        assert!(report.overrides.is_empty());
        assert_eq!(report.rejected.len(), 2);
        assert!(report.rejected.iter().any(|m| m.starts_with("Invalid APP_RENDER_STRICT")));
    }

    #[test]
    fn test_duration_overflow_is_an_error() {
        assert_eq!(
            parse_duration_to_secs("18446744073709551615h"),
            Err("duration too large".to_string())
        );
    }

    #[test]
    fn test_validate_rejects_quoted_style() {
        let mut config = Config::default();
        config.style.edge_color = "#000\" penwidth=\"9".to_string();
        let err = config.validate().unwrap_err();
        assert!(err.to_string().contains("edge_color"));
    }

    #[test]
    fn test_validate_rejects_blank_style() {
        let mut config = Config::default();
        config.style.text_color = String::new();
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_private_key_path_expansion() {
        let config = SnowflakeConfig {
            private_key_path: "/keys/rsa_key.p8".to_string(),
            ..Default::default()
        };
        assert_eq!(config.resolved_private_key_path(), PathBuf::from("/keys/rsa_key.p8"));
    }
}
