//! JSON shapes of the BlockCypher REST API and their mapping to core types.

use serde::{Deserialize, Serialize};
use serde_json::{Value, json};

use bwallet_core::constants::TX_HASH_HEX_LEN;
use bwallet_core::error::GatewayError;
use bwallet_core::types::{
    BroadcastReceipt, InputSource, ProposedOutput, SignatureSet, TxRef, TxRequest,
    UnsignedTransaction, UsedAddressSet, WalletDetails,
};

/// `POST /wallets/hd` body.
#[derive(Debug, Serialize)]
pub struct RegisterHdWallet<'a> {
    pub name: &'a str,
    pub extended_public_key: &'a str,
    pub subchain_indexes: Vec<u32>,
}

#[derive(Debug, Deserialize)]
pub struct RegisteredWallet {
    pub name: String,
}

#[derive(Debug, Default, Deserialize)]
struct WalletSection {
    #[serde(default)]
    addresses: Vec<String>,
}

#[derive(Debug, Deserialize)]
struct ChainAddress {
    address: String,
}

#[derive(Debug, Deserialize)]
struct HdChain {
    #[serde(default)]
    chain_addresses: Vec<ChainAddress>,
}

#[derive(Debug, Default, Deserialize)]
struct HdWalletSection {
    #[serde(default)]
    chains: Vec<HdChain>,
}

/// `GET /addrs/{wallet}` response.
#[derive(Debug, Deserialize)]
pub struct WalletAddrs {
    #[serde(default)]
    balance: u64,
    #[serde(default)]
    final_balance: i64,
    #[serde(default)]
    total_received: u64,
    #[serde(default)]
    total_sent: u64,
    #[serde(default)]
    final_n_tx: u64,
    #[serde(default)]
    unconfirmed_n_tx: u64,
    #[serde(default)]
    txrefs: Vec<TxRef>,
    #[serde(default)]
    unconfirmed_txrefs: Vec<TxRef>,
    #[serde(default)]
    wallet: Option<WalletSection>,
    #[serde(default)]
    hd_wallet: Option<HdWalletSection>,
}

impl WalletAddrs {
    pub fn into_details(self, wallet_name: &str) -> WalletDetails {
        let mut used: UsedAddressSet = self
            .wallet
            .unwrap_or_default()
            .addresses
            .into_iter()
            .collect();
        for chain in self.hd_wallet.unwrap_or_default().chains {
            for entry in chain.chain_addresses {
                used.insert(entry.address);
            }
        }
        WalletDetails {
            wallet_name: wallet_name.to_string(),
            balance: self.balance,
            final_balance: self.final_balance,
            total_received: self.total_received,
            total_sent: self.total_sent,
            final_tx_count: self.final_n_tx,
            unconfirmed_tx_count: self.unconfirmed_n_tx,
            used_addresses: used,
            tx_refs: self.txrefs,
            unconfirmed_tx_refs: self.unconfirmed_txrefs,
        }
    }
}

#[derive(Debug, Serialize, PartialEq)]
struct WireInput {
    #[serde(skip_serializing_if = "Option::is_none")]
    wallet_name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    wallet_token: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    addresses: Option<Vec<String>>,
}

#[derive(Debug, Serialize, PartialEq)]
struct WireOutput {
    addresses: Vec<String>,
    value: i64,
}

/// `POST /txs/new` body.
#[derive(Debug, Serialize)]
pub struct NewTx {
    inputs: Vec<WireInput>,
    outputs: Vec<WireOutput>,
    #[serde(skip_serializing_if = "Option::is_none")]
    change_address: Option<String>,
}

impl NewTx {
    /// Wallet inputs carry the API token, which owns the wallet name.
    pub fn from_request(request: &TxRequest, token: Option<&str>) -> Self {
        let inputs = request
            .inputs
            .iter()
            .map(|source| match source {
                InputSource::Wallet { wallet_name } => WireInput {
                    wallet_name: Some(wallet_name.clone()),
                    wallet_token: token.map(str::to_string),
                    addresses: None,
                },
                InputSource::Address { address } => WireInput {
                    wallet_name: None,
                    wallet_token: None,
                    addresses: Some(vec![address.clone()]),
                },
            })
            .collect();
        let outputs = request
            .outputs
            .iter()
            .map(|o| WireOutput {
                addresses: vec![o.address.clone()],
                value: o.value.to_wire(),
            })
            .collect();
        Self {
            inputs,
            outputs,
            change_address: request.change_address.clone(),
        }
    }
}

#[derive(Debug, Deserialize)]
struct SkeletonInput {
    #[serde(default)]
    addresses: Vec<String>,
}

#[derive(Debug, Deserialize)]
struct SkeletonOutput {
    #[serde(default)]
    addresses: Vec<String>,
    #[serde(default)]
    value: u64,
}

#[derive(Debug, Deserialize)]
struct SkeletonTx {
    #[serde(default)]
    inputs: Vec<SkeletonInput>,
    #[serde(default)]
    outputs: Vec<SkeletonOutput>,
}

#[derive(Debug, Deserialize)]
struct WireError {
    error: String,
}

#[derive(Debug, Deserialize)]
struct Skeleton {
    tx: SkeletonTx,
    #[serde(default)]
    tosign: Vec<String>,
    #[serde(default)]
    tosign_tx: Vec<String>,
    #[serde(default)]
    errors: Vec<WireError>,
}

/// Read a `/txs/new` response, keeping the raw skeleton for broadcast.
pub fn parse_skeleton(raw: Value) -> Result<UnsignedTransaction, GatewayError> {
    let view: Skeleton =
        serde_json::from_value(raw.clone()).map_err(|e| GatewayError::Decode(e.to_string()))?;

    if !view.errors.is_empty() {
        let joined = view
            .errors
            .into_iter()
            .map(|e| e.error)
            .collect::<Vec<_>>()
            .join("; ");
        return Err(GatewayError::Rejected(joined));
    }

    let mut input_addresses = Vec::with_capacity(view.tx.inputs.len());
    for (i, input) in view.tx.inputs.into_iter().enumerate() {
        match <[String; 1]>::try_from(input.addresses) {
            Ok([address]) => input_addresses.push(address),
            Err(other) => {
                return Err(GatewayError::Decode(format!(
                    "input {i} lists {} addresses, expected 1",
                    other.len()
                )));
            }
        }
    }

    Ok(UnsignedTransaction {
        skeleton: raw,
        input_addresses,
        outputs: view
            .tx
            .outputs
            .into_iter()
            .map(|o| ProposedOutput {
                addresses: o.addresses,
                value: o.value,
            })
            .collect(),
        to_sign: view.tosign,
        to_sign_tx: view.tosign_tx,
    })
}

/// `POST /txs/send` body: the skeleton's tx and digests plus the signatures.
pub fn signed_skeleton(unsigned: &UnsignedTransaction, signatures: &SignatureSet) -> Value {
    json!({
        "tx": unsigned.skeleton.get("tx").cloned().unwrap_or(Value::Null),
        "tosign": unsigned.to_sign,
        "signatures": signatures.signatures(),
        "pubkeys": signatures.public_keys(),
    })
}

/// Read a `/txs/send` response.
pub fn parse_broadcast(raw: &Value) -> Result<BroadcastReceipt, GatewayError> {
    if let Some(errors) = raw.get("errors").and_then(Value::as_array) {
        if !errors.is_empty() {
            let joined = errors
                .iter()
                .filter_map(|e| e.get("error").and_then(Value::as_str))
                .collect::<Vec<_>>()
                .join("; ");
            return Err(GatewayError::Rejected(joined));
        }
    }
    let hash = raw
        .get("tx")
        .and_then(|tx| tx.get("hash"))
        .and_then(Value::as_str)
        .ok_or_else(|| GatewayError::Decode("broadcast response has no tx hash".into()))?;
    let well_formed = hash.len() == TX_HASH_HEX_LEN
        && hash.bytes().all(|b| b.is_ascii_digit() || (b'a'..=b'f').contains(&b));
    if !well_formed {
        return Err(GatewayError::Decode(format!("malformed tx hash {hash:?}")));
    }
    Ok(BroadcastReceipt {
        tx_hash: hash.to_string(),
    })
}

/// Human-readable message from an error body, if it has one.
pub fn error_message(body: &str) -> Option<String> {
    let value: Value = serde_json::from_str(body).ok()?;
    if let Some(msg) = value.get("error").and_then(Value::as_str) {
        return Some(msg.to_string());
    }
    let errors = value.get("errors")?.as_array()?;
    let joined = errors
        .iter()
        .filter_map(|e| e.get("error").and_then(Value::as_str))
        .collect::<Vec<_>>()
        .join("; ");
    (!joined.is_empty()).then_some(joined)
}
