use std::path::PathBuf;
use std::time::Duration;

use log::LevelFilter;
use serde::Deserialize;

use crate::capture::sink::DEFAULT_BUFFER_SIZE;

/// Netlink protocol family registered by the kernel module.
pub const DEFAULT_FAMILY: i32 = 17;

/// Resolved runtime configuration.
///
/// Every field has a default, so a TOML file only needs the keys it wants to
/// change:
///
/// ```toml
/// output_path = "/var/log/ncp.log"
/// display = false
/// buffer_size = 524288
/// grace_period_secs = 30
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct Config {
    /// File the decoded lines are appended to.
    pub output_path: PathBuf,
    /// Echo every line to stdout instead of showing the throughput line.
    pub display: bool,
    /// Output buffer size in bytes.
    pub buffer_size: usize,
    pub family: i32,
    /// Upper bound on the final drain receive at shutdown.
    pub grace_period_secs: u64,
    pub handshake_timeout_secs: u64,
    pub report_interval_ms: u64,
    pub log_level: String,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            output_path: PathBuf::from("ncp.log"),
            display: false,
            buffer_size: DEFAULT_BUFFER_SIZE,
            family: DEFAULT_FAMILY,
            grace_period_secs: 30,
            handshake_timeout_secs: 10,
            report_interval_ms: 1000,
            log_level: String::from("info"),
        }
    }
}

impl Config {
    pub fn grace_period(&self) -> Duration {
        Duration::from_secs(self.grace_period_secs)
    }

    pub fn handshake_timeout(&self) -> Duration {
        Duration::from_secs(self.handshake_timeout_secs)
    }

    pub fn report_interval(&self) -> Duration {
        Duration::from_millis(self.report_interval_ms)
    }

    /// Parsed `log_level`; `None` for an unknown name.
    pub fn level_filter(&self) -> Option<LevelFilter> {
        match self.log_level.to_lowercase().as_str() {
            "error" => Some(LevelFilter::Error),
            "warn" => Some(LevelFilter::Warn),
            "info" => Some(LevelFilter::Info),
            "debug" => Some(LevelFilter::Debug),
            "trace" => Some(LevelFilter::Trace),
            _ => None,
        }
    }
}
