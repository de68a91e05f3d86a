//! Transaction request builder and digest signing.
//!
//! Provides a builder pattern for the wallet side of a transaction:
//! 1. Name the funding sources and the outputs
//! 2. Build a validated [`TxRequest`] for the gateway to assemble
//! 3. Sign the gateway's verified digests with the resolved keypairs

use bwallet_core::address::decode_address;
use bwallet_core::coin::Coin;
use bwallet_core::types::{
    InputSource, OutputRequest, OutputValue, SignatureSet, TxRequest, UnsignedTransaction,
};

use crate::error::WalletError;
use crate::keys::KeyPair;

/// Builder for a [`TxRequest`].
///
/// # Example
/// ```ignore
/// let request = TransactionBuilder::new(Coin::Btc)
///     .fund_from_wallet(&wallet_name)
///     .add_output(&destination, OutputValue::Amount(50_000))
///     .set_change_address(&change)
///     .build(Some(balance))?;
/// ```
#[derive(Debug, Clone)]
pub struct TransactionBuilder {
    coin: Coin,
    inputs: Vec<InputSource>,
    outputs: Vec<OutputRequest>,
    change_address: Option<String>,
}

impl TransactionBuilder {
    pub fn new(coin: Coin) -> Self {
        Self {
            coin,
            inputs: Vec::new(),
            outputs: Vec::new(),
            change_address: None,
        }
    }

    /// Spend from any address the gateway tracks for `wallet_name`.
    pub fn fund_from_wallet(&mut self, wallet_name: &str) -> &mut Self {
        self.inputs.push(InputSource::Wallet {
            wallet_name: wallet_name.to_string(),
        });
        self
    }

    /// Spend from a single address.
    pub fn fund_from_address(&mut self, address: &str) -> &mut Self {
        self.inputs.push(InputSource::Address {
            address: address.to_string(),
        });
        self
    }

    pub fn add_output(&mut self, address: &str, value: OutputValue) -> &mut Self {
        self.outputs.push(OutputRequest {
            address: address.trim().to_string(),
            value,
        });
        self
    }

    pub fn set_change_address(&mut self, address: &str) -> &mut Self {
        self.change_address = Some(address.to_string());
        self
    }

    /// Validate and produce the request.
    ///
    /// `available` is the freshly fetched spendable balance; when given, the
    /// sum of fixed-amount outputs may not exceed it. Fees are left to the
    /// gateway.
    pub fn build(&self, available: Option<u64>) -> Result<TxRequest, WalletError> {
        if self.inputs.is_empty() {
            return Err(WalletError::Build("no funding source".into()));
        }
        if self.outputs.is_empty() {
            return Err(WalletError::Build("no outputs".into()));
        }

        let mut total: u64 = 0;
        for out in &self.outputs {
            decode_address(&out.address, self.coin).map_err(|source| {
                WalletError::AddressValidation {
                    address: out.address.clone(),
                    source,
                }
            })?;
            match out.value {
                OutputValue::Amount(0) => {
                    return Err(WalletError::InvalidAmount("amount must be positive".into()));
                }
                OutputValue::Amount(v) => {
                    total = total
                        .checked_add(v)
                        .ok_or_else(|| WalletError::InvalidAmount("total amount overflow".into()))?;
                }
                OutputValue::Sweep => {}
            }
        }

        let sweep = self.outputs.iter().any(|o| o.value.is_sweep());
        if sweep && (self.outputs.len() != 1 || self.change_address.is_some()) {
            return Err(WalletError::Build(
                "a sweep has exactly one output and no change".into(),
            ));
        }

        if let Some(change) = &self.change_address {
            decode_address(change, self.coin).map_err(|source| WalletError::AddressValidation {
                address: change.clone(),
                source,
            })?;
        }

        if let Some(have) = available {
            if !sweep && total > have {
                return Err(WalletError::InsufficientBalance { have, need: total });
            }
        }

        Ok(TxRequest {
            coin: self.coin,
            inputs: self.inputs.clone(),
            outputs: self.outputs.clone(),
            change_address: self.change_address.clone(),
        })
    }
}

/// Sign every digest of a verified proposal.
///
/// `keypairs[i]` signs `unsigned.to_sign[i]`; the result keeps that order.
pub fn sign_digests(
    unsigned: &UnsignedTransaction,
    keypairs: &[&KeyPair],
) -> Result<SignatureSet, WalletError> {
    if keypairs.len() != unsigned.to_sign.len() {
        return Err(WalletError::TxVerification(format!(
            "{} keypairs for {} digests",
            keypairs.len(),
            unsigned.to_sign.len()
        )));
    }

    let mut signatures = SignatureSet::new();
    for (digest, keypair) in unsigned.to_sign.iter().zip(keypairs) {
        signatures.push(keypair.sign_digest_hex(digest)?, keypair.public_key_hex());
    }
    Ok(signatures)
}
