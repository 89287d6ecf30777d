//! Config: a typed view over the process environment, with the defaults
//! and parse-error reporting the orchestrator needs at boot.

use std::path::PathBuf;
use std::time::Duration;

use thiserror::Error;

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("{name} must be a valid port number, got {value:?}")]
    InvalidPort { name: &'static str, value: String },

    #[error("{name} must be a positive integer, got {value:?}")]
    InvalidDuration { name: &'static str, value: String },
}

#[derive(Debug, Clone)]
pub struct Config {
    pub mod_host_host: String,
    pub mod_host_port: u16,
    pub mod_host_feedback_port: u16,
    pub bridge_rep: String,
    pub bridge_pub: String,
    pub bridge_health: String,
    pub lv2_paths: Vec<PathBuf>,
    pub bundle_watch_interval: Duration,
}

impl Config {
    pub fn from_env() -> Result<Self, ConfigError> {
        Ok(Self {
            mod_host_host: env_or("MOD_HOST_HOST", "127.0.0.1"),
            mod_host_port: parse_port("MOD_HOST_PORT", "5555")?,
            mod_host_feedback_port: parse_port("MOD_HOST_FEEDBACK_PORT", "5556")?,
            bridge_rep: env_or("MODHOST_BRIDGE_REP", "tcp://127.0.0.1:6000"),
            bridge_pub: env_or("MODHOST_BRIDGE_PUB", "tcp://127.0.0.1:6001"),
            bridge_health: env_or("MODHOST_BRIDGE_HEALTH", "tcp://127.0.0.1:6002"),
            lv2_paths: lv2_paths(),
            bundle_watch_interval: parse_duration_ms("BUNDLE_WATCH_INTERVAL_MS", "2000")?,
        })
    }
}

fn env_or(name: &str, default: &str) -> String {
    std::env::var(name).unwrap_or_else(|_| default.to_string())
}

fn parse_port(name: &'static str, default: &str) -> Result<u16, ConfigError> {
    let raw = env_or(name, default);
    raw.parse().map_err(|_| ConfigError::InvalidPort { name, value: raw })
}

fn parse_duration_ms(name: &'static str, default: &str) -> Result<Duration, ConfigError> {
    let raw = env_or(name, default);
    raw.parse::<u64>()
        .map(Duration::from_millis)
        .map_err(|_| ConfigError::InvalidDuration { name, value: raw })
}

/// Colon-separated `LV2_PATH` override, or the conventional default scan
/// paths when unset.
fn lv2_paths() -> Vec<PathBuf> {
    if let Ok(raw) = std::env::var("LV2_PATH") {
        return raw.split(':').filter(|s| !s.is_empty()).map(PathBuf::from).collect();
    }
    let mut paths = vec![PathBuf::from("/usr/lib/lv2"), PathBuf::from("/usr/local/lib/lv2")];
    if let Some(home) = dirs::home_dir() {
        paths.push(home.join(".lv2"));
    }
    paths
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn invalid_port_is_reported_with_the_offending_value() {
        let err = parse_port("MOD_HOST_PORT", "not-a-port").unwrap_err();
        assert!(matches!(err, ConfigError::InvalidPort { name: "MOD_HOST_PORT", .. }));
    }

    #[test]
    fn default_port_parses_cleanly() {
        assert_eq!(parse_port("MOD_HOST_PORT", "5555").unwrap(), 5555);
    }

    #[test]
    fn bundle_watch_interval_defaults_to_two_seconds() {
        assert_eq!(parse_duration_ms("BUNDLE_WATCH_INTERVAL_MS", "2000").unwrap(), Duration::from_secs(2));
    }
}
