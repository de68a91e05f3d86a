//! Checks on a gateway-proposed transaction before anything is signed.
//!
//! The gateway selects inputs and assembles the skeleton, so the wallet
//! treats its answer as untrusted. Each to-sign digest must be the double
//! SHA-256 of a preimage the wallet can decode, and every preimage must
//! spend only the funding sources the request named and pay exactly the
//! requested outputs (plus at most one change output).
//!
//! Input values are not known here, so the fee is trusted to the gateway.
//! A proposal that omits the change output passes and that amount goes to
//! the miner.

use bitcoin::consensus::encode::deserialize;
use bitcoin::hashes::{Hash, sha256d};
use bitcoin::{OutPoint, PubkeyHash, ScriptBuf, ScriptHash, Transaction};

use bwallet_core::address::{AddressKind, decode_address};
use bwallet_core::coin::Coin;
use bwallet_core::constants::SIGHASH_ALL;
use bwallet_core::types::{
    InputSource, OutputValue, ProposedOutput, TxRequest, UnsignedTransaction, UsedAddressSet,
};

use crate::error::WalletError;

fn fail(msg: impl Into<String>) -> WalletError {
    WalletError::TxVerification(msg.into())
}

/// Output script an address pays to.
pub fn script_for_address(address: &str, coin: Coin) -> Result<ScriptBuf, WalletError> {
    let decoded = decode_address(address, coin).map_err(|source| WalletError::AddressValidation {
        address: address.to_string(),
        source,
    })?;
    Ok(match decoded.kind {
        AddressKind::P2pkh => ScriptBuf::new_p2pkh(&PubkeyHash::from_byte_array(decoded.hash)),
        AddressKind::P2sh => ScriptBuf::new_p2sh(&ScriptHash::from_byte_array(decoded.hash)),
    })
}

/// Script a gateway-supplied address pays to; decode failures are tampering.
fn gateway_script(address: &str, coin: Coin) -> Result<ScriptBuf, WalletError> {
    script_for_address(address, coin)
        .map_err(|_| fail(format!("gateway returned invalid address {address}")))
}

/// Whether `address` is one of the funding sources named in `request`.
///
/// A wallet source covers every address in `owned`, the fresh snapshot of
/// the wallet's used addresses.
fn is_funding_source(address: &str, request: &TxRequest, owned: &UsedAddressSet) -> bool {
    request.inputs.iter().any(|source| match source {
        InputSource::Wallet { .. } => owned.contains(address),
        InputSource::Address { address: named } => named == address,
    })
}

/// Check a preimage against its digest and decode the transaction it commits to.
fn decode_preimage(
    index: usize,
    preimage_hex: &str,
    digest_hex: &str,
) -> Result<Transaction, WalletError> {
    let preimage = hex::decode(preimage_hex)
        .map_err(|e| fail(format!("preimage {index} is not hex: {e}")))?;
    let digest = hex::decode(digest_hex)
        .map_err(|e| fail(format!("digest {index} is not hex: {e}")))?;

    if sha256d::Hash::hash(&preimage).to_byte_array().as_slice() != digest.as_slice() {
        return Err(fail(format!("digest {index} is not the hash of its preimage")));
    }

    let Some(split) = preimage.len().checked_sub(4) else {
        return Err(fail(format!("preimage {index} is too short")));
    };
    let (body, sighash) = preimage.split_at(split);
    if sighash != SIGHASH_ALL.to_le_bytes() {
        return Err(fail(format!("preimage {index} is not SIGHASH_ALL")));
    }

    deserialize(body).map_err(|e| fail(format!("preimage {index} does not decode: {e}")))
}

fn check_outputs(tx: &Transaction, request: &TxRequest) -> Result<(), WalletError> {
    let coin = request.coin;
    let mut remaining: Vec<(ScriptBuf, u64)> = tx
        .output
        .iter()
        .map(|o| (o.script_pubkey.clone(), o.value.to_sat()))
        .collect();

    for out in &request.outputs {
        let script = script_for_address(&out.address, coin)?;
        let position = match out.value {
            OutputValue::Amount(amount) => remaining
                .iter()
                .position(|(s, v)| *s == script && *v == amount),
            OutputValue::Sweep => remaining.iter().position(|(s, v)| *s == script && *v > 0),
        };
        match position {
            Some(p) => {
                remaining.swap_remove(p);
            }
            None => {
                return Err(fail(format!("no output pays {} as requested", out.address)));
            }
        }
    }

    if request.is_sweep() {
        if !remaining.is_empty() {
            return Err(fail("sweep proposal has extra outputs"));
        }
        return Ok(());
    }

    let change_script = request
        .change_address
        .as_deref()
        .map(|change| script_for_address(change, coin))
        .transpose()?;
    match (remaining.as_slice(), change_script) {
        ([], _) => Ok(()),
        ([(script, _)], Some(change)) if *script == change => Ok(()),
        ([_], _) => Err(fail("unexpected output that is not the change address")),
        (extra, _) => Err(fail(format!("{} unexpected outputs", extra.len()))),
    }
}

fn check_proposed_outputs(
    tx: &Transaction,
    proposed: &[ProposedOutput],
    coin: Coin,
) -> Result<(), WalletError> {
    if proposed.len() != tx.output.len() {
        return Err(fail(format!(
            "skeleton lists {} outputs, preimage has {}",
            proposed.len(),
            tx.output.len()
        )));
    }
    let mut from_skeleton = Vec::with_capacity(proposed.len());
    for out in proposed {
        let [address] = out.addresses.as_slice() else {
            return Err(fail("skeleton output must pay exactly one address"));
        };
        from_skeleton.push((gateway_script(address, coin)?, out.value));
    }
    let mut from_preimage: Vec<_> = tx
        .output
        .iter()
        .map(|o| (o.script_pubkey.clone(), o.value.to_sat()))
        .collect();
    from_skeleton.sort();
    from_preimage.sort();
    if from_skeleton != from_preimage {
        return Err(fail("skeleton outputs disagree with the signed preimage"));
    }
    Ok(())
}

/// Verify an unsigned proposal against the request that produced it.
///
/// `owned` is the used-address snapshot taken for this request; it bounds
/// which addresses a wallet-funded transaction may spend from.
pub fn verify_unsigned(
    unsigned: &UnsignedTransaction,
    request: &TxRequest,
    owned: &UsedAddressSet,
) -> Result<(), WalletError> {
    let n = unsigned.input_addresses.len();
    if n == 0 {
        return Err(fail("proposal has no inputs"));
    }
    if unsigned.to_sign.len() != n || unsigned.to_sign_tx.len() != n {
        return Err(fail(format!(
            "{n} inputs but {} digests and {} preimages",
            unsigned.to_sign.len(),
            unsigned.to_sign_tx.len()
        )));
    }

    for address in &unsigned.input_addresses {
        if !is_funding_source(address, request, owned) {
            return Err(fail(format!("input spends {address}, which was not requested")));
        }
    }

    let mut first: Option<(Vec<OutPoint>, Transaction)> = None;
    for (i, (digest, preimage)) in unsigned.to_sign.iter().zip(&unsigned.to_sign_tx).enumerate() {
        let tx = decode_preimage(i, preimage, digest)?;
        if tx.input.len() != n {
            return Err(fail(format!("preimage {i} has {} inputs, expected {n}", tx.input.len())));
        }

        let expected = gateway_script(&unsigned.input_addresses[i], request.coin)?;
        if !expected.is_p2pkh() {
            return Err(fail(format!("input {i} is not pay-to-pubkey-hash")));
        }
        for (j, input) in tx.input.iter().enumerate() {
            let ok = if j == i {
                input.script_sig == expected
            } else {
                input.script_sig.is_empty()
            };
            if !ok {
                return Err(fail(format!("preimage {i} signs input {j} with the wrong script")));
            }
        }

        let prevouts: Vec<OutPoint> = tx.input.iter().map(|input| input.previous_output).collect();
        match &first {
            None => first = Some((prevouts, tx)),
            Some((first_prevouts, first_tx)) => {
                if *first_prevouts != prevouts || first_tx.output != tx.output {
                    return Err(fail(format!("preimage {i} describes a different transaction")));
                }
            }
        }
    }

    if let Some((_, tx)) = &first {
        check_outputs(tx, request)?;
        check_proposed_outputs(tx, &unsigned.outputs, request.coin)?;
    }

    tracing::debug!(inputs = n, outputs = unsigned.outputs.len(), "proposal verified");
    Ok(())
}
