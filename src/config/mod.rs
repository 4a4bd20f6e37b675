//! Configuration module - environment variable parsing

use std::env;
use std::net::SocketAddr;
use std::path::PathBuf;
use std::time::Duration;

use crate::game::MatchTimings;

/// Application configuration loaded from environment variables
#[derive(Clone, Debug)]
pub struct Config {
    /// Server binding address
    pub server_addr: SocketAddr,
    /// Log level (trace, debug, info, warn, error)
    pub log_level: String,
    /// Emit JSON log lines instead of the human format
    pub log_json: bool,

    /// Directory for match snapshots; matches live in memory only when unset
    pub data_dir: Option<PathBuf>,
    /// Allowed client origins for CORS, comma-separated
    pub client_origin: Option<String>,

    /// Continuation delays and save debounce
    pub timings: MatchTimings,
}

impl Config {
    /// Load configuration from environment variables
    pub fn from_env() -> Result<Self, ConfigError> {
        // PORT wins over SERVER_ADDR for hosted deployments
        let server_addr = if let Ok(port) = env::var("PORT") {
            format!("0.0.0.0:{}", port)
        } else {
            env::var("SERVER_ADDR").unwrap_or_else(|_| "0.0.0.0:8080".to_string())
        };

        let defaults = MatchTimings::default();
        let timings = MatchTimings {
            hazard_tick: duration_ms("HAZARD_TICK_MS", defaults.hazard_tick)?,
            step_interval: duration_ms("STEP_INTERVAL_MS", defaults.step_interval)?,
            charge_fuse: duration_ms("CHARGE_FUSE_MS", defaults.charge_fuse)?,
            save_debounce: duration_ms("SAVE_DEBOUNCE_MS", defaults.save_debounce)?,
        };

        Ok(Self {
            server_addr: server_addr
                .parse()
                .map_err(|_| ConfigError::InvalidAddress)?,

            log_level: env::var("LOG_LEVEL").unwrap_or_else(|_| "info".to_string()),
            log_json: env::var("LOG_FORMAT").is_ok_and(|v| v.eq_ignore_ascii_case("json")),

            data_dir: non_empty("DATA_DIR").map(PathBuf::from),
            client_origin: non_empty("CLIENT_ORIGIN"),

            timings,
        })
    }
}

fn non_empty(key: &str) -> Option<String> {
    env::var(key).ok().filter(|v| !v.trim().is_empty())
}

fn duration_ms(key: &'static str, default: Duration) -> Result<Duration, ConfigError> {
    match non_empty(key) {
        Some(raw) => raw
            .trim()
            .parse::<u64>()
            .map(Duration::from_millis)
            .map_err(|_| ConfigError::InvalidNumber(key)),
        None => Ok(default),
    }
}

/// Configuration errors
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Invalid server address format")]
    InvalidAddress,

    #[error("Environment variable {0} must be a whole number of milliseconds")]
    InvalidNumber(&'static str),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_durations_fall_back_to_defaults() {
        let default = Duration::from_millis(1234);
        assert_eq!(
            duration_ms("DEEPDIG_TEST_UNSET_DURATION", default).unwrap(),
            default
        );
    }

    #[test]
    fn malformed_duration_is_rejected() {
        env::set_var("DEEPDIG_TEST_BAD_DURATION", "soon");
        let err = duration_ms("DEEPDIG_TEST_BAD_DURATION", Duration::ZERO).unwrap_err();
        assert!(matches!(err, ConfigError::InvalidNumber("DEEPDIG_TEST_BAD_DURATION")));
        env::remove_var("DEEPDIG_TEST_BAD_DURATION");
    }

    #[test]
    fn duration_parses_milliseconds() {
        env::set_var("DEEPDIG_TEST_GOOD_DURATION", " 250 ");
        assert_eq!(
            duration_ms("DEEPDIG_TEST_GOOD_DURATION", Duration::ZERO).unwrap(),
            Duration::from_millis(250)
        );
        env::remove_var("DEEPDIG_TEST_GOOD_DURATION");
    }
}
