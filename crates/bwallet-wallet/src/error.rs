//! Wallet error types.

use bwallet_core::error::{AddressError, GatewayError, KeyError};
use bwallet_core::types::Subchain;
use thiserror::Error;

/// Errors that can occur in wallet operations.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum WalletError {
    /// Malformed serialized key, WIF or secret.
    #[error("invalid key: {0}")]
    InvalidKey(String),

    /// Child derivation failed (hardened index or invalid child).
    #[error("key derivation: {0}")]
    Derivation(String),

    /// The operation needs a private key but the root is public-only.
    #[error("operation requires a private key")]
    NotPrivateKey,

    /// Destination address failed validation for the wallet's coin.
    #[error("invalid address {address}: {source}")]
    AddressValidation {
        /// The rejected input.
        address: String,
        source: AddressError,
    },

    /// Requested amount exceeds the available balance.
    #[error("insufficient balance: have {have}, need {need}")]
    InsufficientBalance {
        /// Available balance in satoshis.
        have: u64,
        /// Requested amount in satoshis.
        need: u64,
    },

    /// Invalid monetary amount.
    #[error("invalid amount: {0}")]
    InvalidAmount(String),

    /// The transaction request is incomplete or inconsistent.
    #[error("build error: {0}")]
    Build(String),

    /// The gateway's proposed transaction does not match what was requested.
    #[error("transaction verification failed: {0}")]
    TxVerification(String),

    /// An input address is not derivable from the root within the search depth.
    #[error("no key for {address} within {depth} indices per subchain")]
    KeyNotFound {
        address: String,
        depth: u32,
    },

    /// Discovery hit the scan ceiling before collecting enough addresses.
    #[error("no unused address on subchain {subchain} below index {ceiling}")]
    DiscoveryExhausted {
        subchain: Subchain,
        ceiling: u32,
    },

    /// A gateway call failed before anything was broadcast.
    #[error("{step} failed: {source}")]
    Network {
        /// Which gateway call failed.
        step: &'static str,
        source: GatewayError,
    },

    /// The gateway rejected or failed the broadcast. Never retried.
    #[error("broadcast failed: {0}")]
    Broadcast(GatewayError),
}

impl WalletError {
    /// Wrap a gateway error raised during `step`.
    pub fn network(step: &'static str) -> impl FnOnce(GatewayError) -> WalletError {
        move |source| WalletError::Network { step, source }
    }

    /// Whether the shell can re-prompt instead of aborting the operation.
    pub fn is_recoverable(&self) -> bool {
        matches!(
            self,
            WalletError::InvalidKey(_)
                | WalletError::AddressValidation { .. }
                | WalletError::InsufficientBalance { .. }
                | WalletError::InvalidAmount(_)
        )
    }
}

impl From<KeyError> for WalletError {
    fn from(e: KeyError) -> Self {
        match e {
            KeyError::InvalidKey(msg) => WalletError::InvalidKey(msg),
            KeyError::Derivation(msg) => WalletError::Derivation(msg),
            KeyError::NotPrivateKey => WalletError::NotPrivateKey,
        }
    }
}
