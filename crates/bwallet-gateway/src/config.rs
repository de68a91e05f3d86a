//! Gateway connection settings.

use std::time::Duration;

use bwallet_core::constants::{DEFAULT_GATEWAY_TIMEOUT_SECS, DEFAULT_GATEWAY_URL};

#[derive(Clone)]
pub struct GatewayConfig {
    /// Base URL without a trailing slash, e.g. `https://api.blockcypher.com`.
    pub base_url: String,
    /// API token sent as the `token` query parameter.
    pub api_token: Option<String>,
    /// Upper bound on a single request, connect included.
    pub timeout: Duration,
}

impl GatewayConfig {
    pub fn new(base_url: &str) -> Self {
        Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            ..Self::default()
        }
    }

    pub fn with_token(mut self, token: Option<String>) -> Self {
        self.api_token = token.filter(|t| !t.is_empty());
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }
}

impl Default for GatewayConfig {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_GATEWAY_URL.to_string(),
            api_token: None,
            timeout: Duration::from_secs(DEFAULT_GATEWAY_TIMEOUT_SECS),
        }
    }
}

impl std::fmt::Debug for GatewayConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GatewayConfig")
            .field("base_url", &self.base_url)
            .field("api_token", &self.api_token.as_ref().map(|_| "[REDACTED]"))
            .field("timeout", &self.timeout)
            .finish()
    }
}
