//! Base58Check codecs for addresses and WIF private keys.
//!
//! Addresses are `version || hash160` (21 bytes) and WIF keys are
//! `version || secret (32 bytes) [|| 0x01 when compressed]`, both wrapped
//! in Base58Check. The version byte tells the chains apart, so every
//! decoder here takes the [`Coin`] it expects.

use crate::coin::Coin;
use crate::error::{AddressError, KeyError};

/// Length of a hash160 payload.
pub const HASH160_LEN: usize = 20;

/// Marker byte appended to a WIF key whose public key is compressed.
const WIF_COMPRESSED_FLAG: u8 = 0x01;

/// Output script family an address pays to.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum AddressKind {
    P2pkh,
    P2sh,
}

/// A decoded address: its script family and the 20-byte hash it commits to.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct DecodedAddress {
    pub kind: AddressKind,
    pub hash: [u8; HASH160_LEN],
}

/// Encode a hash160 as an address of the given kind for `coin`.
pub fn encode_address(coin: Coin, kind: AddressKind, hash: &[u8; HASH160_LEN]) -> String {
    let version = match kind {
        AddressKind::P2pkh => coin.params().p2pkh_version,
        AddressKind::P2sh => coin.params().p2sh_version,
    };
    let mut payload = Vec::with_capacity(1 + HASH160_LEN);
    payload.push(version);
    payload.extend_from_slice(hash);
    bs58::encode(payload).with_check().into_string()
}

/// Decode and validate an address for `coin`.
pub fn decode_address(address: &str, coin: Coin) -> Result<DecodedAddress, AddressError> {
    let payload = bs58::decode(address.trim())
        .with_check(None)
        .into_vec()
        .map_err(|e| AddressError::InvalidEncoding(e.to_string()))?;

    if payload.len() != 1 + HASH160_LEN {
        return Err(AddressError::InvalidLength(payload.len()));
    }

    let version = payload[0];
    let params = coin.params();
    let kind = if version == params.p2pkh_version {
        AddressKind::P2pkh
    } else if version == params.p2sh_version {
        AddressKind::P2sh
    } else {
        return Err(AddressError::WrongVersion { version, coin });
    };

    let mut hash = [0u8; HASH160_LEN];
    hash.copy_from_slice(&payload[1..]);
    Ok(DecodedAddress { kind, hash })
}

/// Whether `address` is a well-formed address on `coin`.
pub fn is_valid_address(address: &str, coin: Coin) -> bool {
    decode_address(address, coin).is_ok()
}

/// Encode a 32-byte secret as a compressed WIF key for `coin`.
pub fn encode_wif(coin: Coin, secret: &[u8; 32]) -> String {
    let mut payload = Vec::with_capacity(34);
    payload.push(coin.params().wif_version);
    payload.extend_from_slice(secret);
    payload.push(WIF_COMPRESSED_FLAG);
    bs58::encode(payload).with_check().into_string()
}

/// A secret decoded from WIF.
#[derive(Clone, PartialEq, Eq)]
pub struct WifSecret {
    pub secret: [u8; 32],
    pub compressed: bool,
}

impl std::fmt::Debug for WifSecret {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WifSecret")
            .field("secret", &"[REDACTED]")
            .field("compressed", &self.compressed)
            .finish()
    }
}

/// Decode a WIF private key for `coin`.
pub fn decode_wif(wif: &str, coin: Coin) -> Result<WifSecret, KeyError> {
    let payload = bs58::decode(wif.trim())
        .with_check(None)
        .into_vec()
        .map_err(|e| KeyError::InvalidKey(format!("WIF: {e}")))?;

    let compressed = match payload.len() {
        33 => false,
        34 if payload[33] == WIF_COMPRESSED_FLAG => true,
        34 => return Err(KeyError::InvalidKey("WIF: bad compression flag".into())),
        n => return Err(KeyError::InvalidKey(format!("WIF: invalid length {n}"))),
    };

    if payload[0] != coin.params().wif_version {
        return Err(KeyError::InvalidKey(format!(
            "WIF: version {:#04x} is not a {coin} key",
            payload[0]
        )));
    }

    let mut secret = [0u8; 32];
    secret.copy_from_slice(&payload[1..33]);
    Ok(WifSecret { secret, compressed })
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn known_genesis_address() {
        // hash160 of the genesis coinbase key
        let hash: [u8; 20] = hex::decode("62e907b15cbf27d5425399ebf6f0fb50ebb88f18")
            .unwrap()
            .try_into()
            .unwrap();
        assert_eq!(
            encode_address(Coin::Btc, AddressKind::P2pkh, &hash),
            "1A1zP1eP5QGefi2DMPTfTL5SLmv7DivfNa"
        );
    }

    #[test]
    fn decode_known_address() {
        let decoded = decode_address("1A1zP1eP5QGefi2DMPTfTL5SLmv7DivfNa", Coin::Btc).unwrap();
        assert_eq!(decoded.kind, AddressKind::P2pkh);
        assert_eq!(hex::encode(decoded.hash), "62e907b15cbf27d5425399ebf6f0fb50ebb88f18");
    }

    #[test]
    fn p2sh_address_accepted() {
        let addr = encode_address(Coin::Ltc, AddressKind::P2sh, &[7u8; 20]);
        let decoded = decode_address(&addr, Coin::Ltc).unwrap();
        assert_eq!(decoded.kind, AddressKind::P2sh);
    }

    #[test]
    fn wrong_coin_rejected() {
        let addr = encode_address(Coin::BtcTestnet, AddressKind::P2pkh, &[1u8; 20]);
        let err = decode_address(&addr, Coin::Btc).unwrap_err();
        assert_eq!(err, AddressError::WrongVersion { version: 0x6f, coin: Coin::Btc });
        assert!(is_valid_address(&addr, Coin::BtcTestnet));
    }

    #[test]
    fn bad_checksum_rejected() {
        let mut addr = encode_address(Coin::Btc, AddressKind::P2pkh, &[2u8; 20]);
        let last = addr.pop().unwrap();
        addr.push(if last == '1' { '2' } else { '1' });
        assert!(matches!(
            decode_address(&addr, Coin::Btc),
            Err(AddressError::InvalidEncoding(_))
        ));
    }

    #[test]
    fn garbage_rejected() {
        assert!(!is_valid_address("not an address", Coin::Btc));
        assert!(!is_valid_address("", Coin::Btc));
    }

    #[test]
    fn wrong_length_rejected() {
        let mut payload = vec![0x00];
        payload.extend_from_slice(&[3u8; 32]);
        let s = bs58::encode(payload).with_check().into_string();
        assert_eq!(decode_address(&s, Coin::Btc), Err(AddressError::InvalidLength(33)));
    }

    #[test]
    fn wif_known_vector() {
        // secret = 1, compressed
        let mut secret = [0u8; 32];
        secret[31] = 1;
        assert_eq!(
            encode_wif(Coin::Btc, &secret),
            "KwDiBf89QgGbjEhKnhXJuH7LrciVrZi3qYjgd9M7rFU73sVHnoWn"
        );
    }

    #[test]
    fn wif_decode_roundtrip() {
        let secret = [0x42u8; 32];
        let wif = encode_wif(Coin::Doge, &secret);
        let decoded = decode_wif(&wif, Coin::Doge).unwrap();
        assert_eq!(decoded.secret, secret);
        assert!(decoded.compressed);
    }

    #[test]
    fn wif_uncompressed_form() {
        let mut payload = vec![0x80];
        payload.extend_from_slice(&[9u8; 32]);
        let wif = bs58::encode(payload).with_check().into_string();
        let decoded = decode_wif(&wif, Coin::Btc).unwrap();
        assert!(!decoded.compressed);
    }

    #[test]
    fn wif_wrong_coin_rejected() {
        let wif = encode_wif(Coin::Btc, &[5u8; 32]);
        assert!(matches!(decode_wif(&wif, Coin::Ltc), Err(KeyError::InvalidKey(_))));
    }

    #[test]
    fn wif_debug_redacts_secret() {
        let decoded = decode_wif(&encode_wif(Coin::Btc, &[0xAB; 32]), Coin::Btc).unwrap();
        let debug = format!("{decoded:?}");
        assert!(debug.contains("REDACTED"));
        assert!(!debug.contains("ab"));
    }

    proptest! {
        #[test]
        fn decode_inverts_encode(coin_idx in 0usize..6, p2sh in any::<bool>(), hash in any::<[u8; 20]>()) {
            let coin = Coin::ALL[coin_idx];
            let kind = if p2sh { AddressKind::P2sh } else { AddressKind::P2pkh };
            let decoded = decode_address(&encode_address(coin, kind, &hash), coin).unwrap();
            prop_assert_eq!(decoded, DecodedAddress { kind, hash });
        }
    }
}
