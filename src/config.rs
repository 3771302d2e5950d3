//! Orchestrator configuration.

use crate::resilience::BreakerConfig;
use std::time::Duration;

/// Main orchestrator configuration.
#[derive(Debug, Clone)]
pub struct OrchestratorConfig {
    /// Base URL of the account service. `None` uses in-memory balances.
    pub account_service_url: Option<String>,
    /// Base URL of the notification service. `None` logs notifications.
    pub notification_service_url: Option<String>,
    /// Upper bound for a single remote balance call.
    pub call_timeout: Duration,
    /// Circuit breaker guarding the account service.
    pub breaker: BreakerConfig,
    /// Default log filter when `RUST_LOG` is unset.
    pub log_level: String,
}

impl Default for OrchestratorConfig {
    fn default() -> Self {
        Self {
            account_service_url: None,
            notification_service_url: None,
            call_timeout: Duration::from_secs(2),
            breaker: BreakerConfig::default(),
            log_level: "info".to_string(),
        }
    }
}

impl OrchestratorConfig {
    /// Load configuration from environment variables. Unset or unparsable
    /// values keep their defaults.
    pub fn from_env() -> Self {
        let mut config = Self::default();

        if let Ok(url) = std::env::var("ACCOUNT_SERVICE_URL") {
            config.account_service_url = Some(url);
        }

        if let Ok(url) = std::env::var("NOTIFICATION_SERVICE_URL") {
            config.notification_service_url = Some(url);
        }

        if let Some(ms) = env_parse::<u64>("CALL_TIMEOUT_MS") {
            config.call_timeout = Duration::from_millis(ms);
        }

        if let Some(size) = env_parse("BREAKER_WINDOW_SIZE") {
            config.breaker.window_size = size;
        }

        if let Some(minimum) = env_parse("BREAKER_MINIMUM_CALLS") {
            config.breaker.minimum_calls = minimum;
        }

        if let Some(rate) = env_parse("BREAKER_FAILURE_RATE") {
            config.breaker.failure_rate_threshold = rate;
        }

        if let Some(secs) = env_parse::<u64>("BREAKER_OPEN_SECS") {
            config.breaker.open_cooldown = Duration::from_secs(secs);
        }

        if let Some(calls) = env_parse("BREAKER_HALF_OPEN_CALLS") {
            config.breaker.half_open_max_calls = calls;
        }

        if let Ok(level) = std::env::var("LOG_LEVEL") {
            config.log_level = level;
        }

        config
    }

    /// Validate configuration.
    pub fn validate(&self) -> Result<(), String> {
        if self.call_timeout.is_zero() {
            return Err("Call timeout cannot be 0".to_string());
        }

        for url in [&self.account_service_url, &self.notification_service_url]
            .into_iter()
            .flatten()
        {
            if !(url.starts_with("http://") || url.starts_with("https://")) {
                return Err(format!("Service URL must be http(s): {url}"));
            }
        }

        self.breaker.validate()
    }
}

fn env_parse<T: std::str::FromStr>(key: &str) -> Option<T> {
    std::env::var(key).ok().and_then(|v| v.parse().ok())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = OrchestratorConfig::default();
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_invalid_config() {
        let mut config = OrchestratorConfig::default();
        config.call_timeout = Duration::ZERO;
        assert!(config.validate().is_err());

        let mut config = OrchestratorConfig::default();
        config.account_service_url = Some("accounts.local".to_string());
        assert!(config.validate().is_err());

        let mut config = OrchestratorConfig::default();
        config.breaker.window_size = 0;
        assert!(config.validate().is_err());
    }
}
