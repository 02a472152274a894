//! Process configuration.
//!
//! All configuration comes from environment variables (with matching
//! command-line flags), parsed by clap and validated into a [`Settings`]
//! value before anything else starts. Invalid values fail startup instead of
//! being silently replaced.

use std::time::Duration;

use clap::Parser;
use regex::Regex;
use thiserror::Error;

/// Default listen port.
pub const DEFAULT_PORT: u16 = 8080;

/// Ports at or below this value are rejected.
pub const MIN_PORT: u16 = 1024;

/// Default interval between scrape cycles.
pub const DEFAULT_SCRAPE_INTERVAL: Duration = Duration::from_secs(300);

/// Minimum allowed scrape interval (1 minute).
pub const MIN_SCRAPE_INTERVAL: Duration = Duration::from_secs(60);

/// Default include pattern: matches every project name.
pub const DEFAULT_INCLUDE_REGEX: &str = "^.*$";

/// Default exclude pattern: matches no real project name.
pub const DEFAULT_EXCLUDE_REGEX: &str = "^$";

/// Configuration error types.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// Listen port out of the allowed range.
    #[error("invalid port {0}: must be above {MIN_PORT}")]
    Port(u16),

    /// Scrape interval string did not parse as a duration.
    #[error("invalid scrape interval '{value}': {reason}")]
    Interval { value: String, reason: String },

    /// Project name pattern did not compile.
    #[error("invalid project name pattern '{pattern}': {source}")]
    Pattern {
        pattern: String,
        source: regex::Error,
    },
}

/// Command-line arguments, each backed by an environment variable.
#[derive(Debug, Parser)]
#[command(name = "rollbar-exporter", version, about, long_about = None)]
pub struct Cli {
    /// Log level filter (e.g. "debug", "info,rollbar_exporter=debug").
    #[arg(long, env = "LOG_LEVEL")]
    pub log_level: Option<String>,

    /// Listen port for the metrics and health endpoints.
    #[arg(long, env = "PORT", default_value_t = DEFAULT_PORT)]
    pub port: u16,

    /// Interval between scrape cycles (e.g. "5m", "90s"; minimum 1m).
    #[arg(long, env = "SCRAPE_INTERVAL", default_value = "5m")]
    pub scrape_interval: String,

    /// Per-project per-cycle cap on occurrence rows; non-positive means
    /// unlimited.
    #[arg(long, env = "MAX_ITEMS", default_value_t = 0)]
    pub max_items: i64,

    /// Regex over project names selecting which projects are scraped.
    #[arg(long, env = "INCLUDE_PROJECTS_REGEX", default_value = DEFAULT_INCLUDE_REGEX)]
    pub include_projects_regex: String,

    /// Regex over project names excluding projects from scraping.
    #[arg(long, env = "EXCLUDE_PROJECTS_REGEX", default_value = DEFAULT_EXCLUDE_REGEX)]
    pub exclude_projects_regex: String,

    /// Account-level read token, used for project and token listing.
    #[arg(long, env = "ROLLBAR_ACCOUNT_READ_TOKEN", default_value = "", hide_env_values = true)]
    pub account_read_token: String,

    /// Account-level write token, used only for token creation.
    #[arg(long, env = "ROLLBAR_ACCOUNT_WRITE_TOKEN", default_value = "", hide_env_values = true)]
    pub account_write_token: String,
}

impl Cli {
    /// Validate the raw arguments into [`Settings`].
    ///
    /// # Errors
    /// Returns `ConfigError` if the port is out of range, the interval does
    /// not parse, or a project name pattern does not compile.
    pub fn into_settings(self) -> Result<Settings, ConfigError> {
        if self.port <= MIN_PORT {
            return Err(ConfigError::Port(self.port));
        }

        let mut scrape_interval =
            humantime::parse_duration(self.scrape_interval.trim()).map_err(|e| {
                ConfigError::Interval {
                    value: self.scrape_interval.clone(),
                    reason: e.to_string(),
                }
            })?;
        if scrape_interval < MIN_SCRAPE_INTERVAL {
            tracing::warn!(
                requested = %self.scrape_interval,
                minimum = ?MIN_SCRAPE_INTERVAL,
                "scrape interval below minimum, clamping"
            );
            scrape_interval = MIN_SCRAPE_INTERVAL;
        }

        let include_projects = compile_pattern(&self.include_projects_regex)?;
        let exclude_projects = compile_pattern(&self.exclude_projects_regex)?;

        Ok(Settings {
            log_level: self.log_level,
            port: self.port,
            scrape_interval,
            max_items: self.max_items.max(0),
            include_projects,
            exclude_projects,
            account_read_token: self.account_read_token,
            account_write_token: self.account_write_token,
        })
    }
}

fn compile_pattern(pattern: &str) -> Result<Regex, ConfigError> {
    Regex::new(pattern).map_err(|source| ConfigError::Pattern {
        pattern: pattern.to_string(),
        source,
    })
}

/// Validated process configuration.
#[derive(Debug, Clone)]
pub struct Settings {
    pub log_level: Option<String>,
    pub port: u16,
    pub scrape_interval: Duration,
    /// 0 means unlimited.
    pub max_items: i64,
    pub include_projects: Regex,
    pub exclude_projects: Regex,
    pub account_read_token: String,
    pub account_write_token: String,
}
