//! BIP-32 keys and signing keypairs.
//!
//! A session root is an [`HdKey`]: either a public-only node, which can
//! derive addresses but never yields a secret, or a private-capable node,
//! which can also export WIF keys and produce signing [`KeyPair`]s.
//! Serialization uses the coin's own BIP-32 version bytes, so the same key
//! material reads as `xpub…` on Bitcoin and `Ltub…` on Litecoin.

use std::fmt;
use std::sync::LazyLock;

use bitcoin::bip32::{ChildNumber, Xpriv, Xpub};
use bitcoin::hashes::{Hash, hash160};
use bitcoin::secp256k1::{All, Message, PublicKey, Secp256k1, SecretKey};
use bitcoin::NetworkKind;
use zeroize::{Zeroize, ZeroizeOnDrop};

use bwallet_core::address::{AddressKind, decode_wif, encode_address, encode_wif};
use bwallet_core::coin::{Coin, KeyVisibility};
use bwallet_core::error::KeyError;
use bwallet_core::types::{DerivationPath, Subchain};

use crate::error::WalletError;

/// Shared verification + signing context.
pub(crate) static SECP: LazyLock<Secp256k1<All>> = LazyLock::new(Secp256k1::new);

/// Length of a BIP-32 serialized key before the checksum.
const SERIALIZED_KEY_LEN: usize = 78;

const BTC_MAIN_XPUB: [u8; 4] = [0x04, 0x88, 0xB2, 0x1E];
const BTC_MAIN_XPRV: [u8; 4] = [0x04, 0x88, 0xAD, 0xE4];
const BTC_TEST_XPUB: [u8; 4] = [0x04, 0x35, 0x87, 0xCF];
const BTC_TEST_XPRV: [u8; 4] = [0x04, 0x35, 0x83, 0x94];

fn network_kind(coin: Coin) -> NetworkKind {
    if coin.is_testnet() { NetworkKind::Test } else { NetworkKind::Main }
}

fn child_number(index: u32) -> Result<ChildNumber, KeyError> {
    ChildNumber::from_normal_idx(index)
        .map_err(|_| KeyError::Derivation(format!("index {index} is hardened or out of range")))
}

fn p2pkh_address(coin: Coin, public_key: &[u8]) -> String {
    let hash = hash160::Hash::hash(public_key).to_byte_array();
    encode_address(coin, AddressKind::P2pkh, &hash)
}

fn encode_with_version(mut data: [u8; SERIALIZED_KEY_LEN], version: [u8; 4]) -> String {
    data[..4].copy_from_slice(&version);
    bs58::encode(data).with_check().into_string()
}

fn decode_payload(serialized: &str) -> Result<[u8; SERIALIZED_KEY_LEN], KeyError> {
    let bytes = bs58::decode(serialized.trim())
        .with_check(None)
        .into_vec()
        .map_err(|e| KeyError::InvalidKey(format!("extended key: {e}")))?;
    <[u8; SERIALIZED_KEY_LEN]>::try_from(bytes.as_slice()).map_err(|_| {
        KeyError::InvalidKey(format!("extended key: invalid length {}", bytes.len()))
    })
}

/// A private-capable BIP-32 node.
#[derive(Clone, PartialEq, Eq)]
pub struct PrivateNode {
    coin: Coin,
    xpriv: Xpriv,
}

impl PrivateNode {
    pub fn coin(&self) -> Coin {
        self.coin
    }

    /// Derive the non-hardened child at `index`.
    pub fn derive_child(&self, index: u32) -> Result<Self, KeyError> {
        let child = child_number(index)?;
        let xpriv = self
            .xpriv
            .derive_priv(&*SECP, &[child])
            .map_err(|e| KeyError::Derivation(e.to_string()))?;
        Ok(Self { coin: self.coin, xpriv })
    }

    /// The public half of this node.
    pub fn public(&self) -> PublicNode {
        PublicNode {
            coin: self.coin,
            xpub: Xpub::from_priv(&*SECP, &self.xpriv),
        }
    }

    /// Signing keypair for this node (compressed public key).
    pub fn keypair(&self) -> KeyPair {
        KeyPair::from_secret_key(&self.xpriv.private_key, true)
    }

    /// Compressed WIF of this node's secret.
    pub fn export_wif(&self) -> String {
        let mut secret = self.xpriv.private_key.secret_bytes();
        let wif = encode_wif(self.coin, &secret);
        secret.zeroize();
        wif
    }

    /// BIP-32 serialization with the coin's private version bytes.
    pub fn serialize(&self) -> String {
        encode_with_version(self.xpriv.encode(), self.coin.params().xprv_version)
    }
}

impl Drop for PrivateNode {
    fn drop(&mut self) {
        self.xpriv.private_key.non_secure_erase();
    }
}

impl fmt::Debug for PrivateNode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PrivateNode")
            .field("coin", &self.coin)
            .field("depth", &self.xpriv.depth)
            .field("key", &"[REDACTED]")
            .finish()
    }
}

/// A public-only BIP-32 node.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct PublicNode {
    coin: Coin,
    xpub: Xpub,
}

impl PublicNode {
    pub fn coin(&self) -> Coin {
        self.coin
    }

    /// Derive the non-hardened child at `index`.
    pub fn derive_child(&self, index: u32) -> Result<Self, KeyError> {
        let child = child_number(index)?;
        let xpub = self
            .xpub
            .derive_pub(&*SECP, &[child])
            .map_err(|e| KeyError::Derivation(e.to_string()))?;
        Ok(Self { coin: self.coin, xpub })
    }

    /// SEC1 compressed public key.
    pub fn public_key_bytes(&self) -> [u8; 33] {
        self.xpub.public_key.serialize()
    }

    /// P2PKH address of the compressed public key.
    pub fn address(&self) -> String {
        p2pkh_address(self.coin, &self.public_key_bytes())
    }

    /// BIP-32 serialization with the coin's public version bytes.
    pub fn serialize(&self) -> String {
        encode_with_version(self.xpub.encode(), self.coin.params().xpub_version)
    }
}

/// A session root or any node derived from it.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum HdKey {
    PublicOnly(PublicNode),
    PrivateCapable(PrivateNode),
}

impl HdKey {
    /// BIP-32 master key from seed bytes.
    pub fn from_seed(coin: Coin, seed: &[u8]) -> Result<Self, KeyError> {
        let xpriv = Xpriv::new_master(network_kind(coin), seed)
            .map_err(|e| KeyError::InvalidKey(format!("seed: {e}")))?;
        Ok(HdKey::PrivateCapable(PrivateNode { coin, xpriv }))
    }

    /// Parse a serialized extended key that must belong to `coin`.
    pub fn deserialize(serialized: &str, coin: Coin) -> Result<Self, KeyError> {
        let payload = decode_payload(serialized)?;
        let version = version_of(&payload);
        let params = coin.params();
        let visibility = if version == params.xpub_version {
            KeyVisibility::Public
        } else if version == params.xprv_version {
            KeyVisibility::Private
        } else {
            return Err(KeyError::InvalidKey(format!(
                "extended key version {} is not a {coin} key",
                hex::encode(version)
            )));
        };
        Self::from_payload(payload, coin, visibility)
    }

    /// Parse a serialized extended key, detecting the coin from its version bytes.
    pub fn deserialize_any(serialized: &str) -> Result<Self, KeyError> {
        let payload = decode_payload(serialized)?;
        let version = version_of(&payload);
        let (coin, visibility) = Coin::from_extended_key_version(version).ok_or_else(|| {
            KeyError::InvalidKey(format!(
                "unknown extended key version {}",
                hex::encode(version)
            ))
        })?;
        Self::from_payload(payload, coin, visibility)
    }

    fn from_payload(
        mut payload: [u8; SERIALIZED_KEY_LEN],
        coin: Coin,
        visibility: KeyVisibility,
    ) -> Result<Self, KeyError> {
        // The bip32 decoder only knows Bitcoin's version bytes.
        let testnet = coin.is_testnet();
        match visibility {
            KeyVisibility::Public => {
                let btc = if testnet { BTC_TEST_XPUB } else { BTC_MAIN_XPUB };
                payload[..4].copy_from_slice(&btc);
                let xpub = Xpub::decode(&payload)
                    .map_err(|e| KeyError::InvalidKey(format!("extended public key: {e}")))?;
                Ok(HdKey::PublicOnly(PublicNode { coin, xpub }))
            }
            KeyVisibility::Private => {
                let btc = if testnet { BTC_TEST_XPRV } else { BTC_MAIN_XPRV };
                payload[..4].copy_from_slice(&btc);
                let decoded = Xpriv::decode(&payload);
                payload.zeroize();
                let xpriv = decoded
                    .map_err(|e| KeyError::InvalidKey(format!("extended private key: {e}")))?;
                Ok(HdKey::PrivateCapable(PrivateNode { coin, xpriv }))
            }
        }
    }

    pub fn coin(&self) -> Coin {
        match self {
            HdKey::PublicOnly(n) => n.coin,
            HdKey::PrivateCapable(n) => n.coin,
        }
    }

    pub fn is_private(&self) -> bool {
        matches!(self, HdKey::PrivateCapable(_))
    }

    pub fn as_private(&self) -> Option<&PrivateNode> {
        match self {
            HdKey::PrivateCapable(n) => Some(n),
            HdKey::PublicOnly(_) => None,
        }
    }

    /// Public-only view of this key.
    pub fn to_public(&self) -> PublicNode {
        match self {
            HdKey::PublicOnly(n) => n.clone(),
            HdKey::PrivateCapable(n) => n.public(),
        }
    }

    /// Derive the non-hardened child at `index`, keeping the variant.
    pub fn derive_child(&self, index: u32) -> Result<Self, KeyError> {
        match self {
            HdKey::PublicOnly(n) => n.derive_child(index).map(HdKey::PublicOnly),
            HdKey::PrivateCapable(n) => n.derive_child(index).map(HdKey::PrivateCapable),
        }
    }

    /// Root of a subchain, `m/{subchain}`.
    pub fn derive_subchain(&self, subchain: Subchain) -> Result<Self, KeyError> {
        self.derive_child(subchain.index())
    }

    /// Node at `m/{subchain}/{index}`.
    pub fn derive_path(&self, path: DerivationPath) -> Result<Self, KeyError> {
        self.derive_subchain(path.subchain)?.derive_child(path.index)
    }

    /// P2PKH address of this node.
    pub fn to_address(&self) -> String {
        self.to_public().address()
    }

    pub fn public_key_hex(&self) -> String {
        hex::encode(self.to_public().public_key_bytes())
    }

    /// Compressed WIF of this node's secret.
    pub fn export_private_wif(&self) -> Result<String, KeyError> {
        self.as_private()
            .map(PrivateNode::export_wif)
            .ok_or(KeyError::NotPrivateKey)
    }

    /// Signing keypair of this node.
    pub fn keypair(&self) -> Result<KeyPair, KeyError> {
        self.as_private()
            .map(PrivateNode::keypair)
            .ok_or(KeyError::NotPrivateKey)
    }

    pub fn serialize_public(&self) -> String {
        self.to_public().serialize()
    }

    pub fn serialize_private(&self) -> Result<String, KeyError> {
        self.as_private()
            .map(PrivateNode::serialize)
            .ok_or(KeyError::NotPrivateKey)
    }
}

fn version_of(payload: &[u8; SERIALIZED_KEY_LEN]) -> [u8; 4] {
    [payload[0], payload[1], payload[2], payload[3]]
}

/// A secp256k1 signing key and its public key.
///
/// The secret is wiped on drop and never printed.
#[derive(Clone, Zeroize, ZeroizeOnDrop)]
pub struct KeyPair {
    secret: [u8; 32],
    #[zeroize(skip)]
    public: PublicKey,
    #[zeroize(skip)]
    compressed: bool,
}

impl KeyPair {
    fn from_secret_key(secret: &SecretKey, compressed: bool) -> Self {
        Self {
            secret: secret.secret_bytes(),
            public: PublicKey::from_secret_key(&*SECP, secret),
            compressed,
        }
    }

    /// Build a keypair from a raw 32-byte scalar.
    pub fn from_secret_bytes(secret: &[u8; 32], compressed: bool) -> Result<Self, KeyError> {
        let sk = SecretKey::from_slice(secret)
            .map_err(|e| KeyError::InvalidKey(format!("secret key: {e}")))?;
        Ok(Self::from_secret_key(&sk, compressed))
    }

    /// Parse an external WIF key for `coin`.
    pub fn from_wif(wif: &str, coin: Coin) -> Result<Self, KeyError> {
        let decoded = decode_wif(wif, coin)?;
        Self::from_secret_bytes(&decoded.secret, decoded.compressed)
    }

    /// Public key in the encoding its address commits to.
    pub fn public_key_bytes(&self) -> Vec<u8> {
        if self.compressed {
            self.public.serialize().to_vec()
        } else {
            self.public.serialize_uncompressed().to_vec()
        }
    }

    pub fn public_key_hex(&self) -> String {
        hex::encode(self.public_key_bytes())
    }

    pub fn address(&self, coin: Coin) -> String {
        p2pkh_address(coin, &self.public_key_bytes())
    }

    /// ECDSA-sign a 32-byte digest, returning the DER encoding.
    pub fn sign_digest(&self, digest: &[u8]) -> Result<Vec<u8>, WalletError> {
        let msg = Message::from_digest_slice(digest).map_err(|_| {
            WalletError::TxVerification(format!("digest is {} bytes, expected 32", digest.len()))
        })?;
        let mut sk = SecretKey::from_slice(&self.secret)
            .map_err(|e| WalletError::InvalidKey(e.to_string()))?;
        let sig = SECP.sign_ecdsa(&msg, &sk);
        sk.non_secure_erase();
        Ok(sig.serialize_der().to_vec())
    }

    /// Sign a hex digest, returning hex DER.
    pub fn sign_digest_hex(&self, digest_hex: &str) -> Result<String, WalletError> {
        let digest = hex::decode(digest_hex)
            .map_err(|e| WalletError::TxVerification(format!("digest is not hex: {e}")))?;
        self.sign_digest(&digest).map(hex::encode)
    }
}

impl fmt::Debug for KeyPair {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("KeyPair")
            .field("public", &self.public_key_hex())
            .field("secret", &"[REDACTED]")
            .finish()
    }
}

/// Parse an external WIF key for sweeping.
pub fn parse_wif(wif: &str, coin: Coin) -> Result<KeyPair, KeyError> {
    KeyPair::from_wif(wif, coin)
}
