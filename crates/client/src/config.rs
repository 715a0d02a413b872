//! Client configuration from environment variables.

use notifykit_shared::{Environment, Identity};

use crate::ws::ReconnectConfig;

/// Feed and API endpoint configuration.
#[derive(Debug, Clone, PartialEq)]
pub struct FeedConfig {
    pub environment: Environment,
    /// Overrides the environment's feed URL
    pub feed_url: Option<String>,
    /// Overrides the environment's API URL
    pub api_url: Option<String>,
    pub reconnect: ReconnectConfig,
}

impl FeedConfig {
    /// Parse configuration from environment variables.
    ///
    /// Environment variables:
    /// - `NOTIFYKIT_ENV`: "prod" | "staging" | "dev" (default: "prod")
    /// - `NOTIFYKIT_FEED_URL`: feed WebSocket base URL override
    /// - `NOTIFYKIT_API_URL`: REST API base URL override
    /// - `NOTIFYKIT_RECONNECT_MAX_ATTEMPTS`: 0 retries forever (default: 10)
    /// - `NOTIFYKIT_RECONNECT_INITIAL_DELAY_MS`: first backoff step (default: 1000)
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let environment = lookup("NOTIFYKIT_ENV")
            .and_then(|raw| match raw.parse::<Environment>() {
                Ok(env) => Some(env),
                Err(e) => {
                    crate::log_warn!("{}, falling back to prod", e);
                    None
                }
            })
            .unwrap_or_default();

        let mut reconnect = ReconnectConfig::default();
        if let Some(max) = lookup("NOTIFYKIT_RECONNECT_MAX_ATTEMPTS").and_then(|v| v.parse().ok()) {
            reconnect.max_attempts = max;
        }
        if let Some(delay) =
            lookup("NOTIFYKIT_RECONNECT_INITIAL_DELAY_MS").and_then(|v| v.parse().ok())
        {
            reconnect.initial_delay_ms = delay;
        }

        Self {
            environment,
            feed_url: non_empty(lookup("NOTIFYKIT_FEED_URL")),
            api_url: non_empty(lookup("NOTIFYKIT_API_URL")),
            reconnect,
        }
    }

    pub fn api_base_url(&self) -> String {
        self.api_url
            .clone()
            .unwrap_or_else(|| self.environment.api_url().to_string())
    }
}

/// The wallet side of the demo: which account to follow.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct IdentityConfig {
    pub account: Option<String>,
    pub chain_id: Option<u64>,
    pub caip: bool,
    /// Channel to query through the REST API on startup
    pub channel: Option<String>,
}

impl IdentityConfig {
    /// Environment variables:
    /// - `NOTIFYKIT_ACCOUNT`: subscriber address
    /// - `NOTIFYKIT_CHAIN_ID`: network id
    /// - `NOTIFYKIT_CAIP`: "1" / "true" formats addresses as CAIP-10
    /// - `NOTIFYKIT_CHANNEL`: channel address to inspect
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        Self {
            account: non_empty(lookup("NOTIFYKIT_ACCOUNT")),
            chain_id: lookup("NOTIFYKIT_CHAIN_ID").and_then(|v| v.trim().parse().ok()),
            caip: lookup("NOTIFYKIT_CAIP")
                .map(|v| matches!(v.trim().to_lowercase().as_str(), "1" | "true" | "yes"))
                .unwrap_or(false),
            channel: non_empty(lookup("NOTIFYKIT_CHANNEL")),
        }
    }

    pub fn identity(&self, environment: Environment) -> Identity {
        Identity::new(self.account.as_deref(), environment, self.chain_id, self.caip)
    }
}

fn non_empty(value: Option<String>) -> Option<String> {
    value.map(|v| v.trim().to_string()).filter(|v| !v.is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn defaults_to_prod_without_overrides() {
        let config = FeedConfig::from_lookup(lookup(&[]));
        assert_eq!(config.environment, Environment::Prod);
        assert_eq!(config.feed_url, None);
        assert_eq!(config.reconnect, ReconnectConfig::default());
        assert_eq!(config.api_base_url(), Environment::Prod.api_url());
    }

    #[test]
    fn reads_overrides() {
        let config = FeedConfig::from_lookup(lookup(&[
            ("NOTIFYKIT_ENV", "staging"),
            ("NOTIFYKIT_FEED_URL", "ws://127.0.0.1:9000"),
            ("NOTIFYKIT_API_URL", " "),
            ("NOTIFYKIT_RECONNECT_MAX_ATTEMPTS", "0"),
            ("NOTIFYKIT_RECONNECT_INITIAL_DELAY_MS", "250"),
        ]));
        assert_eq!(config.environment, Environment::Staging);
        assert_eq!(config.feed_url.as_deref(), Some("ws://127.0.0.1:9000"));
        assert_eq!(config.api_url, None);
        assert_eq!(config.reconnect.max_attempts, 0);
        assert_eq!(config.reconnect.initial_delay_ms, 250);
    }

    #[test]
    fn unknown_environment_falls_back_to_prod() {
        let config = FeedConfig::from_lookup(lookup(&[("NOTIFYKIT_ENV", "moon")]));
        assert_eq!(config.environment, Environment::Prod);
    }

    #[test]
    fn identity_config_builds_identity() {
        let config = IdentityConfig::from_lookup(lookup(&[
            ("NOTIFYKIT_ACCOUNT", "0xA"),
            ("NOTIFYKIT_CHAIN_ID", "5"),
            ("NOTIFYKIT_CAIP", "true"),
        ]));
        let identity = config.identity(Environment::Dev);
        assert_eq!(
            identity,
            Identity::new(Some("0xA"), Environment::Dev, Some(5), true)
        );

        let anonymous = IdentityConfig::from_lookup(lookup(&[])).identity(Environment::Prod);
        assert!(!anonymous.is_complete());
    }
}
