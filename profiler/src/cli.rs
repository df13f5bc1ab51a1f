use crate::config::Config;
use clap::{Parser, ValueEnum};
use std::path::PathBuf;

/// Render a Snowflake query profile as a Graphviz plan graph
#[derive(Debug, Parser)]
#[command(name = "sf-query-profiler", version)]
pub struct Cli {
    /// Query id to profile (as shown in Snowsight query history)
    pub query_id: String,

    /// Configuration file (defaults to conf/profiler.toml, profiler.toml, ...)
    #[arg(short, long, value_name = "PATH")]
    pub config: Option<PathBuf>,

    /// Read operator stats from a JSON export instead of querying Snowflake
    #[arg(short, long, value_name = "FILE")]
    pub input: Option<PathBuf>,

    /// HTML output path
    #[arg(short, long, value_name = "PATH")]
    pub output: Option<PathBuf>,

    /// Also write the DOT text to this path
    #[arg(long, value_name = "PATH")]
    pub dot: Option<PathBuf>,

    /// Fail instead of dropping edges to undeclared nodes
    #[arg(long)]
    pub strict: bool,

    /// Do not print the DOT text to stdout
    #[arg(short, long)]
    pub quiet: bool,

    #[arg(long, value_enum, value_name = "LEVEL")]
    pub log_level: Option<LogLevel>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum LogLevel {
    Error,
    Warn,
    Info,
    Debug,
    Trace,
}

impl LogLevel {
    /// Filter directive: our own crate at this level, dependencies at warn
    pub fn directive(self) -> String {
        let level = match self {
            Self::Error => "error",
            Self::Warn => "warn",
            Self::Info => "info",
            Self::Debug => "debug",
            Self::Trace => "trace",
        };
        format!("warn,sf_query_profiler={}", level)
    }
}

impl Cli {
    /// Command line flags win over the file and `APP_*` variables
    pub fn apply_to(&self, config: &mut Config) {
        if self.strict {
            config.render.strict = true;
        }
        if self.quiet {
            config.output.print_dot = false;
        }
        if let Some(level) = self.log_level {
            config.logging.level = level.directive();
        }
    }

    /// HTML destination: `--output`, else `<output.dir>/<account or query id>.html`
    pub fn html_path(&self, config: &Config) -> PathBuf {
        match &self.output {
            Some(path) => path.clone(),
            None => {
                PathBuf::from(&config.output.dir).join(format!("{}.html", self.file_stem(config)))
            },
        }
    }

    /// DOT destination: `--dot`, else `<output.dir>/<stem>.dot` when `output.write_dot` is set
    pub fn dot_path(&self, config: &Config) -> Option<PathBuf> {
        match &self.dot {
            Some(path) => Some(path.clone()),
            None if config.output.write_dot => Some(
                PathBuf::from(&config.output.dir).join(format!("{}.dot", self.file_stem(config))),
            ),
            None => None,
        }
    }

    fn file_stem(&self, config: &Config) -> String {
        let account = config.snowflake.account.trim();
        let stem = if account.is_empty() { self.query_id.trim() } else { account };
        let sanitized: String = stem
            .chars()
            .map(|c| {
                if c.is_ascii_alphanumeric() || matches!(c, '-' | '_' | '.') { c } else { '_' }
            })
            .collect();
        if sanitized.is_empty() { "plan".to_string() } else { sanitized }
    }
}
