//! Error types shared across the bwallet crates.
use thiserror::Error;

use crate::coin::Coin;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum KeyError {
    #[error("invalid key: {0}")] InvalidKey(String),
    #[error("derivation failed: {0}")] Derivation(String),
    #[error("key holds no private component")] NotPrivateKey,
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum AddressError {
    #[error("invalid base58check encoding: {0}")] InvalidEncoding(String),
    #[error("invalid payload length: {0}")] InvalidLength(usize),
    #[error("version byte {version:#04x} is not a {coin} address")] WrongVersion { version: u8, coin: Coin },
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum GatewayError {
    #[error("request timed out: {0}")] Timeout(String),
    #[error("connection failed: {0}")] Network(String),
    #[error("gateway returned HTTP {status}: {body}")] Http { status: u16, body: String },
    #[error("gateway rejected request: {0}")] Rejected(String),
    #[error("unexpected gateway response: {0}")] Decode(String),
}

impl GatewayError {
    /// Whether the caller may retry the same request later.
    ///
    /// Timeouts, connection failures, rate limiting and server-side errors
    /// are transient. Rejections and malformed responses are not.
    pub fn is_retryable(&self) -> bool {
        match self {
            GatewayError::Timeout(_) | GatewayError::Network(_) => true,
            GatewayError::Http { status, .. } => *status == 429 || *status >= 500,
            GatewayError::Rejected(_) | GatewayError::Decode(_) => false,
        }
    }
}
