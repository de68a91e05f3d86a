//! Core data types shared by the wallet engine and the ledger gateway.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use sha2::{Digest, Sha256};
use std::collections::HashSet;
use std::fmt;
use std::str::FromStr;

use crate::coin::Coin;
use crate::constants::{SWEEP_WIRE_VALUE, WALLET_NAME_HEX_LEN};
use crate::error::KeyError;

/// One of the two fixed top-level derivation branches.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Subchain {
    /// `m/0`: receiving addresses handed to counterparties.
    External,
    /// `m/1`: change addresses used by the wallet itself.
    Internal,
}

impl Subchain {
    /// Both subchains in search order.
    pub const ALL: [Subchain; 2] = [Subchain::External, Subchain::Internal];

    /// Child index of this subchain below the root.
    pub fn index(self) -> u32 {
        match self {
            Subchain::External => 0,
            Subchain::Internal => 1,
        }
    }

    pub fn from_index(index: u32) -> Option<Self> {
        match index {
            0 => Some(Subchain::External),
            1 => Some(Subchain::Internal),
            _ => None,
        }
    }
}

impl fmt::Display for Subchain {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.index())
    }
}

/// Location of an address below the root: `m/{subchain}/{index}`.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct DerivationPath {
    pub subchain: Subchain,
    pub index: u32,
}

impl DerivationPath {
    pub fn new(subchain: Subchain, index: u32) -> Self {
        Self { subchain, index }
    }
}

impl fmt::Display for DerivationPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "m/{}/{}", self.subchain.index(), self.index)
    }
}

impl FromStr for DerivationPath {
    type Err = KeyError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let bad = || KeyError::Derivation(format!("malformed path: {s}"));
        let mut parts = s.trim().split('/');
        if parts.next() != Some("m") {
            return Err(bad());
        }
        let subchain = parts
            .next()
            .and_then(|p| p.parse::<u32>().ok())
            .and_then(Subchain::from_index)
            .ok_or_else(bad)?;
        let index = parts
            .next()
            .and_then(|p| p.parse::<u32>().ok())
            .ok_or_else(bad)?;
        if parts.next().is_some() {
            return Err(bad());
        }
        Ok(Self { subchain, index })
    }
}

impl Serialize for DerivationPath {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.to_string())
    }
}

impl<'de> Deserialize<'de> for DerivationPath {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        s.parse().map_err(serde::de::Error::custom)
    }
}

/// An address together with the path that produced it.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct AddressRecord {
    pub address: String,
    pub path: DerivationPath,
}

/// Snapshot of addresses the ledger has seen in any transaction.
///
/// The ledger is the source of truth; a snapshot is read-only and goes
/// stale as soon as anything is broadcast.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct UsedAddressSet(HashSet<String>);

impl UsedAddressSet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn contains(&self, address: &str) -> bool {
        self.0.contains(address)
    }

    pub fn insert(&mut self, address: impl Into<String>) -> bool {
        self.0.insert(address.into())
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &String> {
        self.0.iter()
    }
}

impl<S: Into<String>> FromIterator<S> for UsedAddressSet {
    fn from_iter<I: IntoIterator<Item = S>>(iter: I) -> Self {
        Self(iter.into_iter().map(Into::into).collect())
    }
}

/// Value of a requested output.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum OutputValue {
    /// A fixed amount in satoshis.
    Amount(u64),
    /// Everything the inputs hold, minus the fee the gateway picks.
    Sweep,
}

impl OutputValue {
    /// Wire encoding: the amount, or `-1` for a sweep.
    pub fn to_wire(self) -> i64 {
        match self {
            OutputValue::Amount(v) => i64::try_from(v).unwrap_or(i64::MAX),
            OutputValue::Sweep => SWEEP_WIRE_VALUE,
        }
    }

    pub fn from_wire(value: i64) -> Option<Self> {
        if value == SWEEP_WIRE_VALUE {
            Some(OutputValue::Sweep)
        } else {
            u64::try_from(value).ok().map(OutputValue::Amount)
        }
    }

    pub fn is_sweep(self) -> bool {
        matches!(self, OutputValue::Sweep)
    }
}

impl Serialize for OutputValue {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_i64(self.to_wire())
    }
}

impl<'de> Deserialize<'de> for OutputValue {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let v = i64::deserialize(deserializer)?;
        OutputValue::from_wire(v)
            .ok_or_else(|| serde::de::Error::custom(format!("invalid output value: {v}")))
    }
}

/// A requested output: destination address and value.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct OutputRequest {
    pub address: String,
    pub value: OutputValue,
}

/// Where the funds for a transaction come from.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum InputSource {
    /// Any unspent output on the addresses the gateway tracks for this wallet.
    Wallet { wallet_name: String },
    /// Unspent outputs on one specific address.
    Address { address: String },
}

/// Logical transaction handed to the gateway for assembly.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct TxRequest {
    pub coin: Coin,
    pub inputs: Vec<InputSource>,
    pub outputs: Vec<OutputRequest>,
    pub change_address: Option<String>,
}

impl TxRequest {
    /// Whether any output asks for the whole balance.
    pub fn is_sweep(&self) -> bool {
        self.outputs.iter().any(|o| o.value.is_sweep())
    }
}

/// An output of the skeleton the gateway proposes.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProposedOutput {
    pub addresses: Vec<String>,
    pub value: u64,
}

/// Skeleton returned by the gateway, not yet signed.
///
/// `input_addresses`, `to_sign` and `to_sign_tx` are positionally aligned:
/// entry `i` of each belongs to input `i`.
#[derive(Clone, Debug, PartialEq)]
pub struct UnsignedTransaction {
    /// Opaque skeleton, echoed back verbatim on broadcast.
    pub skeleton: serde_json::Value,
    /// Address spent by each input, in input order.
    pub input_addresses: Vec<String>,
    /// Outputs the gateway says it built.
    pub outputs: Vec<ProposedOutput>,
    /// Hex digests to sign, one per input.
    pub to_sign: Vec<String>,
    /// Hex preimages whose double SHA-256 is the matching digest.
    pub to_sign_tx: Vec<String>,
}

/// Ordered signatures paired with the public keys that made them.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct SignatureSet {
    signatures: Vec<String>,
    public_keys: Vec<String>,
}

impl SignatureSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a signature and its public key (both hex).
    pub fn push(&mut self, signature_hex: String, public_key_hex: String) {
        self.signatures.push(signature_hex);
        self.public_keys.push(public_key_hex);
    }

    pub fn signatures(&self) -> &[String] {
        &self.signatures
    }

    pub fn public_keys(&self) -> &[String] {
        &self.public_keys
    }

    pub fn len(&self) -> usize {
        self.signatures.len()
    }

    pub fn is_empty(&self) -> bool {
        self.signatures.is_empty()
    }
}

/// Direction of a transaction reference relative to the wallet.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum TxDirection {
    Sent,
    Received,
}

/// One wallet-relevant transaction reported by the gateway.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct TxRef {
    pub tx_hash: String,
    #[serde(default)]
    pub value: u64,
    /// Input index when the wallet spent in this tx, `-1` otherwise.
    #[serde(default = "minus_one")]
    pub tx_input_n: i64,
    /// Output index when the wallet received in this tx, `-1` otherwise.
    #[serde(default = "minus_one")]
    pub tx_output_n: i64,
    #[serde(default)]
    pub confirmations: u64,
    #[serde(default)]
    pub confirmed: Option<DateTime<Utc>>,
}

fn minus_one() -> i64 {
    -1
}

impl TxRef {
    pub fn direction(&self) -> TxDirection {
        if self.tx_input_n >= 0 {
            TxDirection::Sent
        } else {
            TxDirection::Received
        }
    }
}

/// Balance, history and used addresses of a tracked wallet.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct WalletDetails {
    pub wallet_name: String,
    /// Confirmed balance available for spending, in satoshis.
    pub balance: u64,
    /// Balance including unconfirmed activity, in satoshis.
    pub final_balance: i64,
    pub total_received: u64,
    pub total_sent: u64,
    pub final_tx_count: u64,
    pub unconfirmed_tx_count: u64,
    pub used_addresses: UsedAddressSet,
    pub tx_refs: Vec<TxRef>,
    pub unconfirmed_tx_refs: Vec<TxRef>,
}

impl WalletDetails {
    /// Unconfirmed references first, then confirmed, as the ledger orders them.
    pub fn recent_tx_refs(&self) -> impl Iterator<Item = &TxRef> {
        self.unconfirmed_tx_refs.iter().chain(self.tx_refs.iter())
    }
}

/// Result of a successful broadcast.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct BroadcastReceipt {
    pub tx_hash: String,
}

/// Deterministic gateway wallet name for a master public key.
///
/// `"X"` followed by the first 24 hex chars of
/// `sha256(master_public_key || "0,1")` for the usual subchain set. Gateway
/// names are limited to 25 characters, so the key itself cannot be used.
pub fn wallet_name_from_mpub(master_public_key: &str, subchains: &[Subchain]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(master_public_key.as_bytes());
    if !subchains.is_empty() {
        let joined = subchains
            .iter()
            .map(|s| s.index().to_string())
            .collect::<Vec<_>>()
            .join(",");
        hasher.update(joined.as_bytes());
    }
    let digest = hex::encode(hasher.finalize());
    format!("X{}", &digest[..WALLET_NAME_HEX_LEN])
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn path_display() {
        let p = DerivationPath::new(Subchain::Internal, 9);
        assert_eq!(p.to_string(), "m/1/9");
    }

    #[test]
    fn path_parse_roundtrip() {
        let p: DerivationPath = "m/0/42".parse().unwrap();
        assert_eq!(p, DerivationPath::new(Subchain::External, 42));
        assert_eq!(p.to_string().parse::<DerivationPath>().unwrap(), p);
    }

    #[test]
    fn path_parse_rejects_bad_input() {
        for bad in ["", "m", "m/0", "m/2/1", "x/0/1", "m/0/1/2", "m/0/-1", "m/0/abc"] {
            assert!(bad.parse::<DerivationPath>().is_err(), "accepted {bad:?}");
        }
    }

    #[test]
    fn path_ordering_is_subchain_major() {
        let a = DerivationPath::new(Subchain::External, 500);
        let b = DerivationPath::new(Subchain::Internal, 0);
        assert!(a < b);
    }

    #[test]
    fn path_serde_as_string() {
        let rec = AddressRecord {
            address: "1abc".into(),
            path: DerivationPath::new(Subchain::External, 3),
        };
        let json = serde_json::to_value(&rec).unwrap();
        assert_eq!(json["path"], "m/0/3");
        let back: AddressRecord = serde_json::from_value(json).unwrap();
        assert_eq!(back, rec);
    }

    #[test]
    fn sweep_wire_value() {
        assert_eq!(OutputValue::Sweep.to_wire(), -1);
        assert_eq!(OutputValue::from_wire(-1), Some(OutputValue::Sweep));
        assert_eq!(OutputValue::from_wire(50_000), Some(OutputValue::Amount(50_000)));
        assert_eq!(OutputValue::from_wire(-2), None);
    }

    #[test]
    fn output_request_serde() {
        let out = OutputRequest { address: "1dest".into(), value: OutputValue::Sweep };
        let json = serde_json::to_string(&out).unwrap();
        assert_eq!(json, r#"{"address":"1dest","value":-1}"#);
    }

    #[test]
    fn input_source_untagged() {
        let w = InputSource::Wallet { wallet_name: "Xabc".into() };
        assert_eq!(serde_json::to_string(&w).unwrap(), r#"{"wallet_name":"Xabc"}"#);
        let a: InputSource = serde_json::from_str(r#"{"address":"1xyz"}"#).unwrap();
        assert_eq!(a, InputSource::Address { address: "1xyz".into() });
    }

    #[test]
    fn request_detects_sweep() {
        let mut req = TxRequest {
            coin: Coin::Btc,
            inputs: vec![],
            outputs: vec![OutputRequest { address: "a".into(), value: OutputValue::Amount(1) }],
            change_address: None,
        };
        assert!(!req.is_sweep());
        req.outputs[0].value = OutputValue::Sweep;
        assert!(req.is_sweep());
    }

    #[test]
    fn used_set_membership() {
        let set: UsedAddressSet = ["a", "b"].into_iter().collect();
        assert!(set.contains("a"));
        assert!(!set.contains("c"));
        assert_eq!(set.len(), 2);
    }

    #[test]
    fn signature_set_keeps_pairs_aligned() {
        let mut sigs = SignatureSet::new();
        sigs.push("s0".into(), "p0".into());
        sigs.push("s1".into(), "p1".into());
        assert_eq!(sigs.len(), 2);
        assert_eq!(sigs.signatures()[1], "s1");
        assert_eq!(sigs.public_keys()[1], "p1");
    }

    #[test]
    fn tx_ref_direction() {
        let json = r#"{"tx_hash":"ab","value":10,"tx_input_n":-1,"tx_output_n":0}"#;
        let r: TxRef = serde_json::from_str(json).unwrap();
        assert_eq!(r.direction(), TxDirection::Received);
        let json = r#"{"tx_hash":"cd","value":10,"tx_input_n":2,"tx_output_n":-1,"confirmations":3,"confirmed":"2015-04-01T12:00:00Z"}"#;
        let r: TxRef = serde_json::from_str(json).unwrap();
        assert_eq!(r.direction(), TxDirection::Sent);
        assert!(r.confirmed.is_some());
    }

    #[test]
    fn recent_refs_list_unconfirmed_first() {
        let mk = |h: &str| TxRef {
            tx_hash: h.into(),
            value: 0,
            tx_input_n: -1,
            tx_output_n: 0,
            confirmations: 0,
            confirmed: None,
        };
        let details = WalletDetails {
            tx_refs: vec![mk("old")],
            unconfirmed_tx_refs: vec![mk("new")],
            ..WalletDetails::default()
        };
        let hashes: Vec<_> = details.recent_tx_refs().map(|r| r.tx_hash.as_str()).collect();
        assert_eq!(hashes, ["new", "old"]);
    }

    #[test]
    fn wallet_name_is_deterministic() {
        let subchains = [Subchain::External, Subchain::Internal];
        let a = wallet_name_from_mpub("xpub-example", &subchains);
        let b = wallet_name_from_mpub("xpub-example", &subchains);
        assert_eq!(a, b);
        assert_eq!(a.len(), 25);
        assert!(a.starts_with('X'));
    }

    #[test]
    fn wallet_name_matches_manual_hash() {
        let expected = hex::encode(Sha256::digest(b"xpub-example0,1"));
        let name = wallet_name_from_mpub("xpub-example", &Subchain::ALL);
        assert_eq!(name, format!("X{}", &expected[..24]));
    }

    #[test]
    fn wallet_name_depends_on_subchains() {
        let a = wallet_name_from_mpub("xpub-example", &[Subchain::External]);
        let b = wallet_name_from_mpub("xpub-example", &Subchain::ALL);
        assert_ne!(a, b);
    }

    proptest! {
        #[test]
        fn path_text_roundtrips(subchain_idx in 0usize..2, index in any::<u32>()) {
            let path = DerivationPath::new(Subchain::ALL[subchain_idx], index);
            prop_assert_eq!(path.to_string().parse::<DerivationPath>().unwrap(), path);
        }
    }
}
