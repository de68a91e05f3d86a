//! Shell configuration loaded from environment variables.

use std::time::Duration;

use anyhow::Result;
use bwallet_core::constants::{
    DEFAULT_DISCOVERY_CEILING, DEFAULT_GATEWAY_TIMEOUT_SECS, DEFAULT_GATEWAY_URL,
    DEFAULT_KEY_SEARCH_DEPTH,
};
use bwallet_gateway::GatewayConfig;
use bwallet_wallet::WalletConfig;

#[derive(Clone, Debug)]
pub struct Config {
    /// Ledger gateway connection settings, token included.
    pub gateway: GatewayConfig,
    /// Address scan limits.
    pub wallet: WalletConfig,
}

fn parse_var<T: std::str::FromStr + PartialEq + Default>(name: &str, default: T) -> Result<T> {
    match std::env::var(name) {
        Ok(raw) => parse_positive(name, &raw),
        Err(_) => Ok(default),
    }
}

fn parse_positive<T: std::str::FromStr + PartialEq + Default>(name: &str, raw: &str) -> Result<T> {
    match raw.trim().parse::<T>() {
        Ok(value) if value != T::default() => Ok(value),
        _ => anyhow::bail!("{name} must be a positive integer"),
    }
}

impl Config {
    /// Load configuration from environment variables.
    pub fn from_env() -> Result<Self> {
        let base_url = std::env::var("BWALLET_GATEWAY_URL")
            .unwrap_or_else(|_| DEFAULT_GATEWAY_URL.to_string());
        let api_token = std::env::var("BLOCKCYPHER_PUBLIC_API_KEY").ok();

        let timeout_secs: u64 = parse_var("BWALLET_TIMEOUT_SECS", DEFAULT_GATEWAY_TIMEOUT_SECS)?;
        let discovery_ceiling: u32 =
            parse_var("BWALLET_DISCOVERY_CEILING", DEFAULT_DISCOVERY_CEILING)?;
        let key_search_depth: u32 =
            parse_var("BWALLET_KEY_SEARCH_DEPTH", DEFAULT_KEY_SEARCH_DEPTH)?;

        Ok(Config {
            gateway: GatewayConfig::new(&base_url)
                .with_token(api_token)
                .with_timeout(Duration::from_secs(timeout_secs)),
            wallet: WalletConfig {
                discovery_ceiling,
                key_search_depth,
            },
        })
    }
}
