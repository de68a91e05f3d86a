//! Trait interface to the remote ledger service.
//!
//! The wallet never talks to a node. Balances, history, used addresses,
//! transaction assembly and broadcast all go through a [`LedgerGateway`].
//! The HTTP implementation lives in `bwallet-gateway`; tests use an
//! in-memory one.

use async_trait::async_trait;

use crate::coin::Coin;
use crate::error::GatewayError;
use crate::types::{
    BroadcastReceipt, SignatureSet, Subchain, TxRequest, UnsignedTransaction, WalletDetails,
};

/// Remote service that tracks wallets and relays transactions.
///
/// Every call may time out; implementations must bound each request and
/// report it as [`GatewayError::Timeout`].
#[async_trait]
pub trait LedgerGateway: Send + Sync {
    /// Register an HD wallet tracking `subchains` of `master_public_key`.
    ///
    /// Idempotent: registering an already-known key returns the same name.
    async fn register_wallet(
        &self,
        coin: Coin,
        master_public_key: &str,
        subchains: &[Subchain],
    ) -> Result<String, GatewayError>;

    /// Balance, history and used addresses of a registered wallet.
    async fn wallet_details(
        &self,
        coin: Coin,
        wallet_name: &str,
    ) -> Result<WalletDetails, GatewayError>;

    /// Ask the gateway to select inputs and assemble an unsigned skeleton.
    ///
    /// The result must include the preimage of every to-sign digest.
    async fn build_unsigned_tx(
        &self,
        request: &TxRequest,
    ) -> Result<UnsignedTransaction, GatewayError>;

    /// Submit a signed skeleton. Never retried by the caller.
    async fn broadcast_signed_tx(
        &self,
        coin: Coin,
        unsigned: &UnsignedTransaction,
        signatures: &SignatureSet,
    ) -> Result<BroadcastReceipt, GatewayError>;
}
