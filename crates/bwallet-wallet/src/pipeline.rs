//! Assemble, verify, sign and broadcast, with the state recorded at each step.
//!
//! ```text
//! Building ──propose──▶ Unsigned ──sign──▶ Signed ──broadcast──▶ Broadcast
//!     │                    │                 │
//!     └────────────────────┴─────────────────┴──────────────────▶ Failed
//! ```
//!
//! Nothing is signed until the proposal passes [`verify_unsigned`], and
//! nothing is broadcast unless every input resolved to a key. A failed
//! broadcast is final; the caller decides whether to start over.

use std::fmt;

use bwallet_core::LedgerGateway;
use bwallet_core::types::{BroadcastReceipt, SignatureSet, TxRequest, UnsignedTransaction, UsedAddressSet};

use crate::builder::sign_digests;
use crate::discovery::find_paths;
use crate::error::WalletError;
use crate::keys::{HdKey, KeyPair};
use crate::verify::verify_unsigned;

/// Where a pipeline run currently stands.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PipelineState {
    Building,
    Unsigned,
    Signed,
    Broadcast { tx_hash: String },
    Failed { reason: String },
}

impl fmt::Display for PipelineState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PipelineState::Building => f.write_str("building"),
            PipelineState::Unsigned => f.write_str("unsigned"),
            PipelineState::Signed => f.write_str("signed"),
            PipelineState::Broadcast { .. } => f.write_str("broadcast"),
            PipelineState::Failed { .. } => f.write_str("failed"),
        }
    }
}

/// One run of the transaction pipeline against a gateway.
pub struct Pipeline<'g> {
    gateway: &'g dyn LedgerGateway,
    state: PipelineState,
}

impl<'g> Pipeline<'g> {
    pub fn new(gateway: &'g dyn LedgerGateway) -> Self {
        Self {
            gateway,
            state: PipelineState::Building,
        }
    }

    pub fn state(&self) -> &PipelineState {
        &self.state
    }

    fn transition(&mut self, next: PipelineState) {
        tracing::debug!(from = %self.state, to = %next, "pipeline transition");
        self.state = next;
    }

    fn fail<T>(&mut self, err: WalletError) -> Result<T, WalletError> {
        tracing::warn!(state = %self.state, error = %err, "pipeline failed");
        self.state = PipelineState::Failed {
            reason: err.to_string(),
        };
        Err(err)
    }

    /// Ask the gateway for a skeleton and verify it against `request`.
    pub async fn propose(
        &mut self,
        request: &TxRequest,
        owned: &UsedAddressSet,
    ) -> Result<UnsignedTransaction, WalletError> {
        let unsigned = match self.gateway.build_unsigned_tx(request).await {
            Ok(u) => u,
            Err(e) => return self.fail(WalletError::network("build unsigned tx")(e)),
        };
        if let Err(e) = verify_unsigned(&unsigned, request, owned) {
            return self.fail(e);
        }
        tracing::info!(
            coin = %request.coin,
            inputs = unsigned.input_addresses.len(),
            outputs = unsigned.outputs.len(),
            "proposal accepted"
        );
        self.transition(PipelineState::Unsigned);
        Ok(unsigned)
    }

    /// Sign every digest; `keypairs[i]` signs digest `i`.
    pub fn sign(
        &mut self,
        unsigned: &UnsignedTransaction,
        keypairs: &[&KeyPair],
    ) -> Result<SignatureSet, WalletError> {
        match sign_digests(unsigned, keypairs) {
            Ok(sigs) => {
                self.transition(PipelineState::Signed);
                Ok(sigs)
            }
            Err(e) => self.fail(e),
        }
    }

    /// Submit the signed skeleton. Never retried.
    pub async fn broadcast(
        &mut self,
        request: &TxRequest,
        unsigned: &UnsignedTransaction,
        signatures: &SignatureSet,
    ) -> Result<BroadcastReceipt, WalletError> {
        match self
            .gateway
            .broadcast_signed_tx(request.coin, unsigned, signatures)
            .await
        {
            Ok(receipt) => {
                tracing::info!(coin = %request.coin, tx_hash = %receipt.tx_hash, "broadcast");
                self.transition(PipelineState::Broadcast {
                    tx_hash: receipt.tx_hash.clone(),
                });
                Ok(receipt)
            }
            Err(e) => self.fail(WalletError::Broadcast(e)),
        }
    }

    /// Spend from the wallet rooted at `root`.
    ///
    /// Each input address is mapped back to its path within `search_depth`
    /// indices per subchain; an address outside that window aborts the run
    /// before anything is signed.
    pub async fn run_send(
        &mut self,
        root: &HdKey,
        request: &TxRequest,
        owned: &UsedAddressSet,
        search_depth: u32,
    ) -> Result<BroadcastReceipt, WalletError> {
        if !root.is_private() {
            return self.fail(WalletError::NotPrivateKey);
        }
        let unsigned = self.propose(request, owned).await?;

        let paths = match find_paths(root, unsigned.input_addresses.as_slice(), search_depth) {
            Ok(p) => p,
            Err(e) => return self.fail(e),
        };
        let mut keypairs = Vec::with_capacity(unsigned.input_addresses.len());
        for address in &unsigned.input_addresses {
            let Some(path) = paths.get(address) else {
                return self.fail(WalletError::KeyNotFound {
                    address: address.clone(),
                    depth: search_depth,
                });
            };
            tracing::debug!(%address, %path, "resolved input key");
            match root.derive_path(*path).and_then(|node| node.keypair()) {
                Ok(kp) => keypairs.push(kp),
                Err(e) => return self.fail(e.into()),
            }
        }

        let refs: Vec<&KeyPair> = keypairs.iter().collect();
        let signatures = self.sign(&unsigned, &refs)?;
        self.broadcast(request, &unsigned, &signatures).await
    }

    /// Spend everything held by one external key; it signs every digest.
    pub async fn run_sweep(
        &mut self,
        keypair: &KeyPair,
        request: &TxRequest,
    ) -> Result<BroadcastReceipt, WalletError> {
        let unsigned = self.propose(request, &UsedAddressSet::new()).await?;
        let refs = vec![keypair; unsigned.to_sign.len()];
        let signatures = self.sign(&unsigned, &refs)?;
        self.broadcast(request, &unsigned, &signatures).await
    }
}
