use super::config::LogLevel;
use thiserror::Error;
use tracing_subscriber::{EnvFilter, fmt, prelude::*};

#[derive(Error, Debug)]
pub enum LoggingError {
    #[error("Invalid filter '{filter}': {details}")]
    InvalidFilter { filter: String, details: String },
    #[error("Failed to install tracing subscriber: {0}")]
    InstallFailed(String),
}

/// Builds the `EnvFilter` directive string and installs the subscriber.
pub struct LoggingSystem {
    directives: Vec<(String, LogLevel)>,
}

impl LoggingSystem {
    pub fn new() -> Self {
        Self {
            directives: Vec::new(),
        }
    }

    pub fn add_directive(&mut self, target: &str, level: LogLevel) {
        self.directives.push((target.to_string(), level));
    }

    /// HTTP stack crates are noisy below warn.
    pub fn add_default_directives(&mut self) {
        for target in ["hyper", "hyper_util", "reqwest", "h2", "rustls"] {
            self.add_directive(target, LogLevel::Warn);
        }
    }

    pub fn build_filter_string(&self, default_level: LogLevel) -> String {
        let mut parts = Vec::with_capacity(self.directives.len() + 1);
        parts.push(default_level.as_str().to_string());
        for (target, level) in &self.directives {
            parts.push(format!("{target}={}", level.as_str()));
        }
        parts.join(",")
    }

    /// `RUST_LOG`, when set, replaces the built filter.
    pub fn initialize(&self, default_level: LogLevel) -> Result<(), LoggingError> {
        let filter = match std::env::var("RUST_LOG") {
            Ok(value) if !value.is_empty() => value,
            _ => self.build_filter_string(default_level),
        };

        let env_filter = EnvFilter::try_new(&filter).map_err(|e| LoggingError::InvalidFilter {
            filter: filter.clone(),
            details: e.to_string(),
        })?;

        tracing_subscriber::registry()
            .with(env_filter)
            .with(
                fmt::layer()
                    .with_writer(std::io::stderr)
                    .with_target(true)
                    .with_level(true)
                    .compact(),
            )
            .try_init()
            .map_err(|e| LoggingError::InstallFailed(e.to_string()))
    }
}

impl Default for LoggingSystem {
    fn default() -> Self {
        Self::new()
    }
}

pub fn setup_logging(level: LogLevel) -> Result<(), LoggingError> {
    let mut logging = LoggingSystem::new();
    logging.add_default_directives();
    logging.initialize(level)
}
