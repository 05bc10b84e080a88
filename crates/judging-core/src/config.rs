//! Runtime configuration for sync passes and vote handling.

use std::time::Duration;

/// Default upstream API root.
pub const DEFAULT_SOURCE_URL: &str = "https://www.khanacademy.org/api/internal/contest-judging";
/// Default per-barrier deadline for the concurrent fetches of one pass or vote.
pub const DEFAULT_FETCH_TIMEOUT: Duration = Duration::from_secs(30);
/// Default interval between daemon sync passes.
pub const DEFAULT_SYNC_INTERVAL: Duration = Duration::from_secs(300);

/// Errors reading configuration from the environment.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ConfigError {
    #[error("{var} must be a whole number of seconds, got {value:?}")]
    InvalidSeconds { var: &'static str, value: String },

    #[error("{var} must be greater than zero")]
    Zero { var: &'static str },
}

/// Core configuration shared by the CLI and the daemon.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct JudgingConfig {
    /// Base URL of the authoritative contest API (`GET {source_url}/contests`).
    pub source_url: String,
    /// Deadline for each completion barrier. `None` waits indefinitely.
    pub fetch_timeout: Option<Duration>,
    /// Interval between periodic sync passes.
    pub sync_interval: Duration,
}

impl Default for JudgingConfig {
    fn default() -> Self {
        Self {
            source_url: DEFAULT_SOURCE_URL.to_string(),
            fetch_timeout: Some(DEFAULT_FETCH_TIMEOUT),
            sync_interval: DEFAULT_SYNC_INTERVAL,
        }
    }
}

impl JudgingConfig {
    /// Create from environment variables
    ///
    /// Reads:
    /// - JUDGING_SOURCE_URL (optional)
    /// - JUDGING_FETCH_TIMEOUT_SECS (optional, default: 30, `0` disables)
    /// - JUDGING_SYNC_INTERVAL_SECS (optional, default: 300)
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|var| std::env::var(var).ok())
    }

    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let mut config = Self::default();

        if let Some(url) = lookup("JUDGING_SOURCE_URL") {
            config.source_url = url;
        }
        if let Some(raw) = lookup("JUDGING_FETCH_TIMEOUT_SECS") {
            let secs = parse_secs("JUDGING_FETCH_TIMEOUT_SECS", &raw)?;
            config.fetch_timeout = (secs > 0).then(|| Duration::from_secs(secs));
        }
        if let Some(raw) = lookup("JUDGING_SYNC_INTERVAL_SECS") {
            let secs = parse_secs("JUDGING_SYNC_INTERVAL_SECS", &raw)?;
            if secs == 0 {
                return Err(ConfigError::Zero {
                    var: "JUDGING_SYNC_INTERVAL_SECS",
                });
            }
            config.sync_interval = Duration::from_secs(secs);
        }

        Ok(config)
    }

    pub fn with_source_url(mut self, url: impl Into<String>) -> Self {
        self.source_url = url.into();
        self
    }

    pub fn with_fetch_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.fetch_timeout = timeout;
        self
    }

    pub fn with_sync_interval(mut self, interval: Duration) -> Self {
        self.sync_interval = interval;
        self
    }
}

fn parse_secs(var: &'static str, raw: &str) -> Result<u64, ConfigError> {
    raw.trim().parse().map_err(|_| ConfigError::InvalidSeconds {
        var,
        value: raw.to_string(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let vars: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |var| vars.get(var).cloned()
    }

    #[test]
    fn defaults_when_unset() {
        let config = JudgingConfig::from_lookup(lookup(&[])).unwrap();
        assert_eq!(config, JudgingConfig::default());
        assert_eq!(config.fetch_timeout, Some(Duration::from_secs(30)));
        assert_eq!(config.sync_interval, Duration::from_secs(300));
    }

    #[test]
    fn reads_overrides() {
        let config = JudgingConfig::from_lookup(lookup(&[
            ("JUDGING_SOURCE_URL", "http://localhost:8080"),
            ("JUDGING_FETCH_TIMEOUT_SECS", "5"),
            ("JUDGING_SYNC_INTERVAL_SECS", " 60 "),
        ]))
        .unwrap();
        assert_eq!(config.source_url, "http://localhost:8080");
        assert_eq!(config.fetch_timeout, Some(Duration::from_secs(5)));
        assert_eq!(config.sync_interval, Duration::from_secs(60));
    }

    #[test]
    fn zero_timeout_disables_deadline() {
        let config =
            JudgingConfig::from_lookup(lookup(&[("JUDGING_FETCH_TIMEOUT_SECS", "0")])).unwrap();
        assert_eq!(config.fetch_timeout, None);
    }

    #[test]
    fn rejects_bad_values() {
        assert_eq!(
            JudgingConfig::from_lookup(lookup(&[("JUDGING_FETCH_TIMEOUT_SECS", "soon")])),
            Err(ConfigError::InvalidSeconds {
                var: "JUDGING_FETCH_TIMEOUT_SECS",
                value: "soon".into()
            })
        );
        assert_eq!(
            JudgingConfig::from_lookup(lookup(&[("JUDGING_SYNC_INTERVAL_SECS", "0")])),
            Err(ConfigError::Zero {
                var: "JUDGING_SYNC_INTERVAL_SECS"
            })
        );
    }
}
