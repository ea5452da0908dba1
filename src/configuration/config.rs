use std::fs;
use std::path::{Path, PathBuf};

use clap::Parser;
use log::debug;

use super::types::Config;
use crate::error_handling::types::ConfigError;

/// Command-line surface of the capture tool.
///
/// Every flag is optional: values missing from the command line come from the
/// `--config` TOML file if one is given, then from the built-in defaults.
///
/// # Examples
///
/// ```text
/// ncp -f /var/log/flows.log
/// ncp -v
/// ncp --config /etc/ncp.toml --grace-period-secs 5
/// ```
#[derive(Parser, Debug, Clone, Default)]
#[command(name = "ncp")]
#[command(version)]
#[command(about = "Userspace capture for the ncp kernel flow observer")]
pub struct Args {
    /// File to save decoded flows to (appended)
    #[arg(short = 'f', long = "file")]
    pub output_path: Option<PathBuf>,

    /// Display every flow instead of the throughput line
    #[arg(short = 'v', long = "display", action = clap::ArgAction::SetTrue)]
    pub display: bool,

    /// TOML configuration file
    #[arg(short = 'c', long = "config", env = "NCP_CONFIG")]
    pub config_file: Option<PathBuf>,

    /// Output buffer size in bytes
    #[arg(long)]
    pub buffer_size: Option<usize>,

    /// Netlink protocol family of the kernel module
    #[arg(long)]
    pub family: Option<i32>,

    /// Seconds to wait for the kernel's final batch at shutdown
    #[arg(long)]
    pub grace_period_secs: Option<u64>,

    /// Seconds to wait for the handshake reply
    #[arg(long)]
    pub handshake_timeout_secs: Option<u64>,

    /// Throughput report interval in milliseconds
    #[arg(long)]
    pub report_interval_ms: Option<u64>,

    /// Log level: error, warn, info, debug or trace
    #[arg(long)]
    pub log_level: Option<String>,
}

impl Config {
    /// Reads a TOML file; missing keys keep their defaults.
    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let content = fs::read_to_string(path)?;
        let config: Config =
            toml::from_str(&content).map_err(|e| ConfigError::TomlError(e.to_string()))?;
        debug!("Loaded configuration from {}", path.display());
        Ok(config)
    }

    /// Resolves defaults, then the optional file, then explicit flags, and
    /// validates the result.
    pub fn from_args(args: &Args) -> Result<Self, ConfigError> {
        let mut config = match &args.config_file {
            Some(path) => Config::from_file(path)?,
            None => Config::default(),
        };
        config.apply(args);
        config.validate()?;
        Ok(config)
    }

    fn apply(&mut self, args: &Args) {
        if let Some(path) = &args.output_path {
            self.output_path = path.clone();
        }
        if args.display {
            self.display = true;
        }
        if let Some(size) = args.buffer_size {
            self.buffer_size = size;
        }
        if let Some(family) = args.family {
            self.family = family;
        }
        if let Some(secs) = args.grace_period_secs {
            self.grace_period_secs = secs;
        }
        if let Some(secs) = args.handshake_timeout_secs {
            self.handshake_timeout_secs = secs;
        }
        if let Some(ms) = args.report_interval_ms {
            self.report_interval_ms = ms;
        }
        if let Some(level) = &args.log_level {
            self.log_level = level.clone();
        }
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.output_path.as_os_str().is_empty() {
            return Err(ConfigError::InvalidValue(
                "output path must not be empty".to_string(),
            ));
        }
        if self.buffer_size == 0 {
            return Err(ConfigError::NotInRange(
                "buffer_size must be greater than 0".to_string(),
            ));
        }
        if self.grace_period_secs == 0 {
            return Err(ConfigError::NotInRange(
                "grace_period_secs must be greater than 0".to_string(),
            ));
        }
        if self.handshake_timeout_secs == 0 {
            return Err(ConfigError::NotInRange(
                "handshake_timeout_secs must be greater than 0".to_string(),
            ));
        }
        if self.report_interval_ms == 0 {
            return Err(ConfigError::NotInRange(
                "report_interval_ms must be greater than 0".to_string(),
            ));
        }
        if self.level_filter().is_none() {
            return Err(ConfigError::InvalidValue(format!(
                "unknown log level '{}'",
                self.log_level
            )));
        }
        Ok(())
    }
}
