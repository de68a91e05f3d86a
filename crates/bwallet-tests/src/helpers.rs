//! Shared test helpers: keys, addresses and an in-memory ledger gateway.

use std::collections::{HashMap, HashSet};
use std::sync::{Arc, Mutex, MutexGuard};

use async_trait::async_trait;
use bitcoin::consensus::encode::serialize;
use bitcoin::hashes::{Hash, sha256d};
use bitcoin::secp256k1::ecdsa::Signature;
use bitcoin::secp256k1::{Message, PublicKey, Secp256k1};
use bitcoin::{
    Amount, OutPoint, ScriptBuf, Sequence, Transaction, TxIn, TxOut, Txid, Witness, absolute,
    transaction,
};

use bwallet_core::LedgerGateway;
use bwallet_core::coin::Coin;
use bwallet_core::constants::SIGHASH_ALL;
use bwallet_core::error::GatewayError;
use bwallet_core::types::{
    BroadcastReceipt, DerivationPath, InputSource, OutputValue, ProposedOutput, SignatureSet,
    Subchain, TxRequest, UnsignedTransaction, UsedAddressSet, WalletDetails,
    wallet_name_from_mpub,
};
use bwallet_wallet::keys::HdKey;
use bwallet_wallet::verify::script_for_address;
use bwallet_wallet::{WalletConfig, WalletSession};

/// Flat fee the mock gateway charges per transaction.
pub const MOCK_FEE: u64 = 1_000;

/// Deterministic private root for `coin`.
pub fn test_root(coin: Coin) -> HdKey {
    HdKey::from_seed(coin, &[0x07; 32]).unwrap()
}

/// Address at `m/{subchain}/{index}` of `root`.
pub fn address_at(root: &HdKey, subchain: Subchain, index: u32) -> String {
    root.derive_path(DerivationPath::new(subchain, index))
        .unwrap()
        .to_address()
}

/// Session over `gateway` with small scan limits.
pub fn session(root: HdKey, gateway: &Arc<MockGateway>) -> WalletSession {
    let config = WalletConfig {
        discovery_ceiling: 200,
        key_search_depth: 50,
    };
    WalletSession::new(root, gateway.clone(), config)
}

/// Gateway-side construction of a legacy P2PKH proposal.
///
/// Preimage `i` is the transaction with input `i`'s script set to the P2PKH
/// script of `inputs[i]` and every other input script empty, followed by
/// SIGHASH_ALL; its double SHA-256 is digest `i`.
pub fn build_proposal(coin: Coin, inputs: &[String], outputs: &[(String, u64)]) -> UnsignedTransaction {
    let tx = Transaction {
        version: transaction::Version::ONE,
        lock_time: absolute::LockTime::ZERO,
        input: inputs
            .iter()
            .enumerate()
            .map(|(i, _)| TxIn {
                previous_output: OutPoint {
                    txid: Txid::from_byte_array([i as u8 + 1; 32]),
                    vout: i as u32,
                },
                script_sig: ScriptBuf::new(),
                sequence: Sequence::MAX,
                witness: Witness::new(),
            })
            .collect(),
        output: outputs
            .iter()
            .map(|(address, value)| TxOut {
                value: Amount::from_sat(*value),
                script_pubkey: script_for_address(address, coin).unwrap(),
            })
            .collect(),
    };

    let mut to_sign = Vec::with_capacity(inputs.len());
    let mut to_sign_tx = Vec::with_capacity(inputs.len());
    for (i, address) in inputs.iter().enumerate() {
        let mut copy = tx.clone();
        copy.input[i].script_sig = script_for_address(address, coin).unwrap();
        let mut preimage = serialize(&copy);
        preimage.extend_from_slice(&SIGHASH_ALL.to_le_bytes());
        to_sign.push(hex::encode(sha256d::Hash::hash(&preimage).to_byte_array()));
        to_sign_tx.push(hex::encode(preimage));
    }

    UnsignedTransaction {
        skeleton: serde_json::json!({"tx": {"ver": 1}}),
        input_addresses: inputs.to_vec(),
        outputs: outputs
            .iter()
            .map(|(address, value)| ProposedOutput {
                addresses: vec![address.clone()],
                value: *value,
            })
            .collect(),
        to_sign,
        to_sign_tx,
    }
}

/// Check every signature against its digest and public key.
pub fn signatures_verify(unsigned: &UnsignedTransaction, signatures: &SignatureSet) -> bool {
    let secp = Secp256k1::verification_only();
    if signatures.len() != unsigned.to_sign.len() {
        return false;
    }
    unsigned
        .to_sign
        .iter()
        .zip(signatures.signatures().iter().zip(signatures.public_keys()))
        .all(|(digest, (sig, pubkey))| {
            let (Ok(digest), Ok(sig), Ok(pubkey)) =
                (hex::decode(digest), hex::decode(sig), hex::decode(pubkey))
            else {
                return false;
            };
            let (Ok(msg), Ok(sig), Ok(pk)) = (
                Message::from_digest_slice(&digest),
                Signature::from_der(&sig),
                PublicKey::from_slice(&pubkey),
            ) else {
                return false;
            };
            secp.verify_ecdsa(&msg, &sig, &pk).is_ok()
        })
}

/// A gateway call, in the order the mock received them.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GatewayCall {
    Register,
    Details,
    BuildUnsigned,
    Broadcast,
}

#[derive(Default)]
struct MockState {
    registered: HashSet<String>,
    used: Vec<String>,
    funds: HashMap<String, u64>,
    calls: Vec<GatewayCall>,
    extra_input: Option<String>,
    broadcast_error: Option<GatewayError>,
    requests: Vec<TxRequest>,
    proposals: Vec<UnsignedTransaction>,
    broadcasts: Vec<SignatureSet>,
}

/// In-memory ledger gateway.
///
/// Tracks which addresses are used and how much each can spend, selects
/// inputs in the order addresses were funded, and charges [`MOCK_FEE`].
pub struct MockGateway {
    coin: Coin,
    state: Mutex<MockState>,
}

impl MockGateway {
    pub fn new(coin: Coin) -> Arc<Self> {
        Arc::new(Self {
            coin,
            state: Mutex::new(MockState::default()),
        })
    }

    fn lock(&self) -> MutexGuard<'_, MockState> {
        self.state.lock().unwrap()
    }

    /// Mark `address` as seen by the ledger without giving it funds.
    pub fn mark_used(&self, address: &str) {
        let mut st = self.lock();
        if !st.used.iter().any(|a| a == address) {
            st.used.push(address.to_string());
        }
    }

    /// Give `address` spendable funds and mark it used.
    pub fn fund(&self, address: &str, amount: u64) {
        self.mark_used(address);
        *self.lock().funds.entry(address.to_string()).or_default() += amount;
    }

    /// Smuggle an input from `address` into every future proposal.
    pub fn inject_extra_input(&self, address: &str) {
        self.lock().extra_input = Some(address.to_string());
    }

    pub fn fail_broadcast_with(&self, err: GatewayError) {
        self.lock().broadcast_error = Some(err);
    }

    pub fn calls(&self) -> Vec<GatewayCall> {
        self.lock().calls.clone()
    }

    pub fn count(&self, call: GatewayCall) -> usize {
        self.lock().calls.iter().filter(|c| **c == call).count()
    }

    pub fn requests(&self) -> Vec<TxRequest> {
        self.lock().requests.clone()
    }

    pub fn proposals(&self) -> Vec<UnsignedTransaction> {
        self.lock().proposals.clone()
    }

    pub fn broadcasts(&self) -> Vec<SignatureSet> {
        self.lock().broadcasts.clone()
    }

    fn spendable(st: &MockState, address: &str) -> Option<(String, u64)> {
        st.funds
            .get(address)
            .filter(|v| **v > 0)
            .map(|v| (address.to_string(), *v))
    }
}

#[async_trait]
impl LedgerGateway for MockGateway {
    async fn register_wallet(
        &self,
        coin: Coin,
        master_public_key: &str,
        subchains: &[Subchain],
    ) -> Result<String, GatewayError> {
        assert_eq!(coin, self.coin);
        let name = wallet_name_from_mpub(master_public_key, subchains);
        let mut st = self.lock();
        st.calls.push(GatewayCall::Register);
        st.registered.insert(name.clone());
        Ok(name)
    }

    async fn wallet_details(
        &self,
        _coin: Coin,
        wallet_name: &str,
    ) -> Result<WalletDetails, GatewayError> {
        let mut st = self.lock();
        st.calls.push(GatewayCall::Details);
        let balance: u64 = st.funds.values().sum();
        Ok(WalletDetails {
            wallet_name: wallet_name.to_string(),
            balance,
            final_balance: balance as i64,
            total_received: balance,
            used_addresses: st.used.iter().cloned().collect::<UsedAddressSet>(),
            ..WalletDetails::default()
        })
    }

    async fn build_unsigned_tx(
        &self,
        request: &TxRequest,
    ) -> Result<UnsignedTransaction, GatewayError> {
        let mut st = self.lock();
        st.calls.push(GatewayCall::BuildUnsigned);
        st.requests.push(request.clone());

        let mut candidates: Vec<(String, u64)> = Vec::new();
        for source in &request.inputs {
            match source {
                InputSource::Wallet { .. } => {
                    candidates.extend(st.used.iter().filter_map(|a| Self::spendable(&st, a)));
                }
                InputSource::Address { address } => {
                    candidates.extend(Self::spendable(&st, address));
                }
            }
        }

        let mut outputs: Vec<(String, u64)> = Vec::new();
        let mut selected: Vec<(String, u64)> = Vec::new();
        if request.is_sweep() {
            let total: u64 = candidates.iter().map(|(_, v)| v).sum();
            if total <= MOCK_FEE {
                return Err(GatewayError::Rejected("nothing to sweep".into()));
            }
            selected = candidates;
            outputs.push((request.outputs[0].address.clone(), total - MOCK_FEE));
        } else {
            let mut need = MOCK_FEE;
            for out in &request.outputs {
                if let OutputValue::Amount(v) = out.value {
                    need += v;
                    outputs.push((out.address.clone(), v));
                }
            }
            let mut have = 0;
            for candidate in candidates {
                if have >= need {
                    break;
                }
                have += candidate.1;
                selected.push(candidate);
            }
            if have < need {
                return Err(GatewayError::Rejected(format!(
                    "Not enough funds: have {have}, need {need}"
                )));
            }
            if let (Some(change), true) = (&request.change_address, have > need) {
                outputs.push((change.clone(), have - need));
            }
        }

        let mut inputs: Vec<String> = selected.into_iter().map(|(a, _)| a).collect();
        if let Some(extra) = &st.extra_input {
            inputs.push(extra.clone());
        }
        let proposal = build_proposal(self.coin, &inputs, &outputs);
        st.proposals.push(proposal.clone());
        Ok(proposal)
    }

    async fn broadcast_signed_tx(
        &self,
        _coin: Coin,
        unsigned: &UnsignedTransaction,
        signatures: &SignatureSet,
    ) -> Result<BroadcastReceipt, GatewayError> {
        let mut st = self.lock();
        st.calls.push(GatewayCall::Broadcast);
        st.broadcasts.push(signatures.clone());
        if let Some(err) = &st.broadcast_error {
            return Err(err.clone());
        }
        if !signatures_verify(unsigned, signatures) {
            return Err(GatewayError::Rejected("signature verification failed".into()));
        }
        for address in &unsigned.input_addresses {
            st.funds.remove(address);
        }
        let joined = unsigned.to_sign.concat();
        Ok(BroadcastReceipt {
            tx_hash: hex::encode(sha256d::Hash::hash(joined.as_bytes()).to_byte_array()),
        })
    }
}
