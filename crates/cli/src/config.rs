// crates/cli/src/config.rs
//! Environment-backed configuration.

use std::time::Duration;

/// Default interval between job state polls.
const DEFAULT_POLL_MS: u64 = 500;

/// Runtime configuration read from the environment.
#[derive(Debug, Clone)]
pub struct Config {
    /// Project override; when unset the project comes from the credentials.
    pub project: Option<String>,
    /// Job location attached to every job reference.
    pub location: String,
    /// Bucket used to stage local files before a load job.
    pub staging_bucket: Option<String>,
    pub poll_interval: Duration,
}

impl Config {
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let project = lookup("BQOPS_PROJECT").or_else(|| lookup("GOOGLE_CLOUD_PROJECT"));
        let location = lookup("BQOPS_LOCATION").unwrap_or_else(|| "US".to_string());
        let staging_bucket = lookup("BQOPS_STAGING_BUCKET");
        let poll_ms = lookup("BQOPS_POLL_MS")
            .and_then(|v| v.parse().ok())
            .unwrap_or(DEFAULT_POLL_MS);
        Self {
            project,
            location,
            staging_bucket,
            poll_interval: Duration::from_millis(poll_ms),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn config_from(pairs: &[(&str, &str)]) -> Config {
        let vars: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        Config::from_lookup(|key| vars.get(key).cloned())
    }

    #[test]
    fn test_defaults() {
        let config = config_from(&[]);
        assert!(config.project.is_none());
        assert_eq!(config.location, "US");
        assert!(config.staging_bucket.is_none());
        assert_eq!(config.poll_interval, Duration::from_millis(500));
    }

    #[test]
    fn test_project_prefers_bqops_var() {
        let config = config_from(&[
            ("BQOPS_PROJECT", "explicit"),
            ("GOOGLE_CLOUD_PROJECT", "ambient"),
        ]);
        assert_eq!(config.project.as_deref(), Some("explicit"));
    }

    #[test]
    fn test_project_falls_back_to_google_var() {
        let config = config_from(&[("GOOGLE_CLOUD_PROJECT", "ambient")]);
        assert_eq!(config.project.as_deref(), Some("ambient"));
    }

    #[test]
    fn test_poll_interval_parses_and_ignores_garbage() {
        let config = config_from(&[("BQOPS_POLL_MS", "50")]);
        assert_eq!(config.poll_interval, Duration::from_millis(50));

        let config = config_from(&[("BQOPS_POLL_MS", "soon")]);
        assert_eq!(config.poll_interval, Duration::from_millis(500));
    }
}
