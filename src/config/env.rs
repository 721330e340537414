//! Environment variable configuration
//!
//! Provides environment variable overrides for configuration.

use std::env;

/// Environment variable prefix
const ENV_PREFIX: &str = "PARALLEL_CUCUMBER";

/// Configuration from environment variables
#[derive(Clone, Debug, Default)]
pub struct EnvConfig {
    /// Queue URL from PARALLEL_CUCUMBER_QUEUE_URL
    pub queue_url: Option<String>,
    /// Queue name from PARALLEL_CUCUMBER_QUEUE_NAME
    pub queue_name: Option<String>,
    /// Worker count from PARALLEL_CUCUMBER_WORKERS
    pub workers: Option<usize>,
    /// Batch size from PARALLEL_CUCUMBER_BATCH_SIZE
    pub batch_size: Option<usize>,
    /// Worker delay from PARALLEL_CUCUMBER_WORKER_DELAY
    pub worker_delay: Option<f64>,
    /// Debug from PARALLEL_CUCUMBER_DEBUG
    pub debug: Option<bool>,
}

impl EnvConfig {
    /// Load configuration from environment variables
    pub fn load() -> Self {
        Self::from_lookup(|name| env::var(name).ok())
    }

    /// Load from an arbitrary variable lookup
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let get = |name: &str| lookup(&format!("{ENV_PREFIX}_{name}"));

        Self {
            queue_url: get("QUEUE_URL"),
            queue_name: get("QUEUE_NAME"),
            workers: get("WORKERS").and_then(|v| v.parse().ok()),
            batch_size: get("BATCH_SIZE").and_then(|v| v.parse().ok()),
            worker_delay: get("WORKER_DELAY").and_then(|v| v.parse().ok()),
            debug: get("DEBUG").map(|v| parse_bool(&v)),
        }
    }
}

/// Interpret an environment variable as boolean
fn parse_bool(value: &str) -> bool {
    matches!(
        value.to_lowercase().as_str(),
        "1" | "true" | "yes" | "on" | "enabled"
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup(vars: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let vars: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |name| vars.get(name).cloned()
    }

    #[test]
    fn test_env_config_default() {
        let config = EnvConfig::from_lookup(lookup(&[]));
        assert!(config.queue_url.is_none());
        assert!(config.workers.is_none());
        assert!(config.debug.is_none());
    }

    #[test]
    fn test_env_config_values() {
        let config = EnvConfig::from_lookup(lookup(&[
            ("PARALLEL_CUCUMBER_QUEUE_URL", "redis://10.0.0.1:6379"),
            ("PARALLEL_CUCUMBER_WORKERS", "6"),
            ("PARALLEL_CUCUMBER_WORKER_DELAY", "0.5"),
            ("PARALLEL_CUCUMBER_BATCH_SIZE", "many"),
            ("PARALLEL_CUCUMBER_DEBUG", "Yes"),
        ]));

        assert_eq!(config.queue_url.as_deref(), Some("redis://10.0.0.1:6379"));
        assert_eq!(config.workers, Some(6));
        assert_eq!(config.worker_delay, Some(0.5));
        assert_eq!(config.batch_size, None);
        assert_eq!(config.debug, Some(true));
    }

    #[test]
    fn test_parse_bool() {
        assert!(parse_bool("on"));
        assert!(parse_bool("TRUE"));
        assert!(!parse_bool("0"));
        assert!(!parse_bool("nope"));
    }
}
