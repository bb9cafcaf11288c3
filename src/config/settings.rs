use std::time::Duration;

/// Runtime configuration for the monitor process
#[derive(Debug, Clone)]
pub struct MonitorConfig {
    /// Base URL of the metrics backend, scheme and port included
    pub backend_url: String,
    /// Path of the services JSON file
    pub services_path: String,
    pub poll_interval: Duration,
    /// Delay between a breach and its single reconfirmation query
    pub recheck_cooldown: Duration,
    /// Per-request timeout for backend queries
    pub request_timeout: Duration,
    /// Maximum number of service evaluations running at once
    pub max_concurrency: usize,
    /// Bind host for the status API
    pub host: String,
    /// Status API port; the API is disabled when unset
    pub port: Option<u16>,
    /// Number of outcome records kept in memory
    pub outcome_history: usize,
}

impl Default for MonitorConfig {
    fn default() -> Self {
        Self {
            backend_url: "https://prometheus.example.com:9090".to_string(),
            services_path: "config.json".to_string(),
            poll_interval: Duration::from_secs(120),
            recheck_cooldown: Duration::from_secs(300),
            request_timeout: Duration::from_secs(30),
            max_concurrency: 16,
            host: "0.0.0.0".to_string(),
            port: None,
            outcome_history: 256,
        }
    }
}

impl MonitorConfig {
    /// Create a config from environment variables
    /// PROMWATCH_BACKEND_URL=http://localhost:9090
    /// PROMWATCH_CONFIG=config.json
    /// PROMWATCH_POLL_INTERVAL_SECS=120
    /// PROMWATCH_RECHECK_COOLDOWN_SECS=300
    /// PROMWATCH_REQUEST_TIMEOUT_SECS=30
    /// PROMWATCH_MAX_CONCURRENCY=16
    /// PROMWATCH_HOST=0.0.0.0
    /// PROMWATCH_PORT=8080
    /// PROMWATCH_OUTCOME_HISTORY=256
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build a config from an arbitrary key lookup, falling back to defaults
    pub fn from_lookup<F>(lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let defaults = Self::default();
        let secs = |key: &str, default: Duration| {
            lookup(key)
                .and_then(|v| v.trim().parse::<u64>().ok())
                .filter(|&s| s > 0)
                .map(Duration::from_secs)
                .unwrap_or(default)
        };

        Self {
            backend_url: lookup("PROMWATCH_BACKEND_URL")
                .map(|url| url.trim_end_matches('/').to_string())
                .unwrap_or(defaults.backend_url),
            services_path: lookup("PROMWATCH_CONFIG").unwrap_or(defaults.services_path),
            poll_interval: secs("PROMWATCH_POLL_INTERVAL_SECS", defaults.poll_interval),
            recheck_cooldown: secs("PROMWATCH_RECHECK_COOLDOWN_SECS", defaults.recheck_cooldown),
            request_timeout: secs("PROMWATCH_REQUEST_TIMEOUT_SECS", defaults.request_timeout),
            max_concurrency: lookup("PROMWATCH_MAX_CONCURRENCY")
                .and_then(|v| v.trim().parse::<usize>().ok())
                .filter(|&n| n > 0)
                .unwrap_or(defaults.max_concurrency),
            host: lookup("PROMWATCH_HOST").unwrap_or(defaults.host),
            port: lookup("PROMWATCH_PORT").and_then(|p| p.trim().parse().ok()),
            outcome_history: lookup("PROMWATCH_OUTCOME_HISTORY")
                .and_then(|v| v.trim().parse::<usize>().ok())
                .filter(|&n| n > 0)
                .unwrap_or(defaults.outcome_history),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup_from(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn test_defaults() {
        let config = MonitorConfig::from_lookup(|_| None);
        assert_eq!(config.backend_url, "https://prometheus.example.com:9090");
        assert_eq!(config.poll_interval, Duration::from_secs(120));
        assert_eq!(config.recheck_cooldown, Duration::from_secs(300));
        assert_eq!(config.max_concurrency, 16);
        assert_eq!(config.port, None);
    }

    #[test]
    fn test_overrides() {
        let config = MonitorConfig::from_lookup(lookup_from(&[
            ("PROMWATCH_BACKEND_URL", "http://localhost:9090/"),
            ("PROMWATCH_POLL_INTERVAL_SECS", "30"),
            ("PROMWATCH_RECHECK_COOLDOWN_SECS", "60"),
            ("PROMWATCH_MAX_CONCURRENCY", "4"),
            ("PROMWATCH_PORT", "8081"),
        ]));

        assert_eq!(config.backend_url, "http://localhost:9090");
        assert_eq!(config.poll_interval, Duration::from_secs(30));
        assert_eq!(config.recheck_cooldown, Duration::from_secs(60));
        assert_eq!(config.max_concurrency, 4);
        assert_eq!(config.port, Some(8081));
    }

    #[test]
    fn test_invalid_values_fall_back() {
        let config = MonitorConfig::from_lookup(lookup_from(&[
            ("PROMWATCH_POLL_INTERVAL_SECS", "soon"),
            ("PROMWATCH_MAX_CONCURRENCY", "0"),
        ]));

        assert_eq!(config.poll_interval, Duration::from_secs(120));
        assert_eq!(config.max_concurrency, 16);
    }
}
