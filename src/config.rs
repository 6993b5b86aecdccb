//! Environment configuration. A `.env` file is honoured through `dotenvy`.

use std::path::PathBuf;
use std::time::Duration;

/// Server-side settings.
#[derive(Debug, Clone)]
pub struct ReviewConfig {
    pub bind_address: String,
    pub db_path: String,
    /// Extraction script; takes precedence over `archive_file`.
    pub script: Option<String>,
    pub script_args: Vec<String>,
    pub archive_file: Option<PathBuf>,
    pub script_workers: usize,
    pub script_queue: usize,
    pub script_timeout: Duration,
    pub export_dir: PathBuf,
    /// `tracing` filter used when `RUST_LOG` is unset.
    pub log_level: String,
}

impl ReviewConfig {
    pub fn from_env() -> Self {
        Self {
            bind_address: env_or("REVIEW_BIND", "0.0.0.0:3002"),
            db_path: env_or("REVIEW_DB_PATH", "feedbackdb"),
            script: env_opt("REVIEW_SCRIPT"),
            script_args: env_opt("REVIEW_SCRIPT_ARGS")
                .map(|raw| raw.split_whitespace().map(str::to_string).collect())
                .unwrap_or_default(),
            archive_file: env_opt("REVIEW_ARCHIVE_FILE").map(PathBuf::from),
            script_workers: parse_env("REVIEW_SCRIPT_WORKERS", num_cpus::get()).max(1),
            script_queue: parse_env("REVIEW_SCRIPT_QUEUE", 32).max(1),
            script_timeout: Duration::from_secs(parse_env("REVIEW_SCRIPT_TIMEOUT_SECS", 60)),
            export_dir: PathBuf::from(env_or("REVIEW_EXPORT_DIR", "chat_exports")),
            log_level: env_or("REVIEW_LOG", "info"),
        }
    }
}

pub const MIN_POLL_SECS: u64 = 10;
pub const MAX_POLL_SECS: u64 = 30;

/// Settings for [`crate::client`].
#[derive(Debug, Clone)]
pub struct ClientConfig {
    pub api_url: String,
    pub poll_interval: Duration,
    pub auto_refresh: bool,
    /// Delay before the full refresh that follows a comment.
    pub refresh_delay: Duration,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            api_url: "http://127.0.0.1:3002".to_string(),
            poll_interval: Duration::from_secs(MAX_POLL_SECS),
            auto_refresh: true,
            refresh_delay: Duration::from_secs(1),
        }
    }
}

impl ClientConfig {
    pub fn from_env() -> Self {
        let defaults = Self::default();
        Self {
            api_url: env_or("REVIEW_API_URL", &defaults.api_url),
            poll_interval: clamp_poll(Duration::from_secs(parse_env("REVIEW_POLL_SECS", MAX_POLL_SECS))),
            auto_refresh: env_opt("REVIEW_AUTO_REFRESH")
                .map(|v| parse_bool(&v))
                .unwrap_or(defaults.auto_refresh),
            refresh_delay: defaults.refresh_delay,
        }
    }
}

/// Polling interval bounds, 10 to 30 seconds.
pub fn clamp_poll(interval: Duration) -> Duration {
    interval.clamp(
        Duration::from_secs(MIN_POLL_SECS),
        Duration::from_secs(MAX_POLL_SECS),
    )
}

fn env_opt(key: &str) -> Option<String> {
    dotenvy::var(key).ok().filter(|v| !v.trim().is_empty())
}

fn env_or(key: &str, default: &str) -> String {
    env_opt(key).unwrap_or_else(|| default.to_owned())
}

fn parse_env<T: std::str::FromStr>(key: &str, default: T) -> T {
    env_opt(key)
        .and_then(|v| v.trim().parse().ok())
        .unwrap_or(default)
}

fn parse_bool(raw: &str) -> bool {
    matches!(
        raw.trim().to_ascii_lowercase().as_str(),
        "1" | "true" | "yes" | "on"
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn poll_interval_is_clamped() {
        assert_eq!(clamp_poll(Duration::from_secs(1)), Duration::from_secs(10));
        assert_eq!(clamp_poll(Duration::from_secs(20)), Duration::from_secs(20));
        assert_eq!(clamp_poll(Duration::from_secs(300)), Duration::from_secs(30));
    }

    #[test]
    fn bool_words() {
        assert!(parse_bool("TRUE"));
        assert!(parse_bool(" 1 "));
        assert!(!parse_bool("off"));
        assert!(!parse_bool("nope"));
    }
}
