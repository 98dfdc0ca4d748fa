use crate::domain::{Options, OptionsPatch};
use clap::{Parser, Subcommand, ValueEnum};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;
use thiserror::Error;
use url::Url;

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Invalid URL: {0}")]
    InvalidUrl(String),
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),
    #[error("File error: {0}")]
    FileError(#[from] std::io::Error),
    #[error("Parse error: {0}")]
    ParseError(#[from] toml::de::Error),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogLevel {
    Error,
    Warn,
    Info,
    Debug,
    Trace,
}

impl LogLevel {
    pub fn as_str(self) -> &'static str {
        match self {
            LogLevel::Error => "error",
            LogLevel::Warn => "warn",
            LogLevel::Info => "info",
            LogLevel::Debug => "debug",
            LogLevel::Trace => "trace",
        }
    }
}

#[derive(Parser, Debug, Clone)]
#[command(author, version, about, long_about = None)]
pub struct Config {
    /// Application id stamped on every record (empty disables delivery)
    #[arg(long, env = "BEACON_APP")]
    pub app: Option<String>,

    /// Keep one in N batched count/statistic records
    #[arg(long, env = "BEACON_SAMPLE", value_parser = clap::value_parser!(u32).range(1..))]
    pub sample: Option<u32>,

    /// Free-text tag attached to every record
    #[arg(long, env = "BEACON_NICKNAME")]
    pub nickname: Option<String>,

    /// Collector prefix the encoded query string is appended to
    #[arg(long, env = "BEACON_HOST")]
    pub host: Option<String>,

    /// Network type reported with readiness measurements
    #[arg(long, env = "BEACON_NETWORK")]
    pub network: Option<String>,

    /// TOML file with app/sample/nickname/host defaults
    #[arg(long, env = "BEACON_CONFIG")]
    pub config_file: Option<PathBuf>,

    /// Log level
    #[arg(long, env = "LOG_LEVEL", default_value = "warn")]
    pub log_level: LogLevel,

    /// Seconds to wait for in-flight requests before exiting
    #[arg(long, env = "BEACON_TIMEOUT_SECS", default_value = "5")]
    pub timeout_secs: u64,

    /// Print records as JSON lines instead of sending them
    #[arg(long)]
    pub dry_run: bool,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug, Clone, PartialEq)]
pub enum Command {
    /// Report an error
    Error {
        message: String,
        /// Error type (defaults to "sys")
        #[arg(long = "type")]
        error_type: Option<String>,
        /// Source file; enables the location fields
        #[arg(long)]
        file: Option<String>,
        #[arg(long, default_value_t = -1, allow_hyphen_values = true)]
        line: i64,
        #[arg(long, default_value_t = -1, allow_hyphen_values = true)]
        column: i64,
        #[arg(long)]
        stack: Option<String>,
    },
    /// Report the outcome of an API call
    Api {
        api: String,
        /// Mark the call as failed
        #[arg(long)]
        failed: bool,
        #[arg(long)]
        cost: Option<f64>,
        #[arg(long)]
        code: Option<String>,
        #[arg(long)]
        detail: Option<String>,
    },
    /// Increment a named counter
    Count { name: String },
    /// Report a named statistic
    Stat {
        name: String,
        #[arg(allow_hyphen_values = true)]
        value: f64,
    },
    /// Send a log line
    Log { message: String },
    /// Send readiness measurements for this process
    Ready,
    /// Forward stdin lines as log records until EOF or a shutdown signal
    Pipe,
}

impl Config {
    pub fn from_args<I, T>(args: I) -> Result<Self, ConfigError>
    where
        I: IntoIterator<Item = T>,
        T: Into<std::ffi::OsString> + Clone,
    {
        Self::try_parse_from(args).map_err(|e| ConfigError::InvalidConfig(e.to_string()))
    }

    /// Values given on the command line or through the environment.
    pub fn options_patch(&self) -> OptionsPatch {
        OptionsPatch {
            app: self.app.clone(),
            sample: self.sample,
            nickname: self.nickname.clone(),
            host: self.host.clone(),
        }
    }

    /// Values from the config file, or an empty patch when none is set.
    pub fn file_patch(&self) -> Result<OptionsPatch, ConfigError> {
        match &self.config_file {
            Some(path) => load_patch(path),
            None => Ok(OptionsPatch::default()),
        }
    }

    /// Defaults, then the config file, then command line and environment.
    pub fn resolve(&self) -> Result<(OptionsPatch, OptionsPatch), ConfigError> {
        let file = self.file_patch()?;
        let cli = self.options_patch();

        let mut effective = Options::from_patch(file.clone());
        effective.merge(cli.clone());
        validate(&effective)?;

        Ok((file, cli))
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

pub fn load_patch(path: &Path) -> Result<OptionsPatch, ConfigError> {
    let content = std::fs::read_to_string(path)?;
    Ok(toml::from_str(&content)?)
}

pub fn validate(options: &Options) -> Result<(), ConfigError> {
    if options.sample == 0 {
        return Err(ConfigError::InvalidConfig(
            "sample must be at least 1".to_string(),
        ));
    }
    Url::parse(&options.host)
        .map_err(|e| ConfigError::InvalidUrl(format!("{}: {e}", options.host)))?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sample_zero_rejected_on_cli() {
        let result = Config::from_args(["rask-beacon", "--sample", "0", "ready"]);
        assert!(matches!(result, Err(ConfigError::InvalidConfig(_))));
    }

    #[test]
    fn test_negative_line_accepted() {
        let config = Config::from_args([
            "rask-beacon", "error", "boom", "--file", "main.rs", "--line", "-1",
        ])
        .unwrap();
        match config.command {
            Command::Error { line, file, .. } => {
                assert_eq!(line, -1);
                assert_eq!(file.as_deref(), Some("main.rs"));
            }
            other => panic!("unexpected command: {other:?}"),
        }
    }

    #[test]
    fn test_validate_rejects_relative_host() {
        let options = Options::from_patch(OptionsPatch::new().host("/a.png?"));
        assert!(matches!(validate(&options), Err(ConfigError::InvalidUrl(_))));
        assert!(validate(&Options::default()).is_ok());
    }
}
