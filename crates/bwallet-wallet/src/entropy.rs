//! Random root generation.
//!
//! The master seed is SHA-512 over 64 bytes from the OS CSPRNG followed by
//! whatever the user typed. The typed entropy can only add to the OS
//! randomness; a weak or empty string never weakens the seed.

use std::collections::HashSet;

use rand::RngCore;
use sha2::{Digest, Sha512};
use zeroize::Zeroize;

use bwallet_core::coin::Coin;
use bwallet_core::error::KeyError;

use crate::keys::HdKey;

/// Bytes drawn from the OS RNG for every new root.
const OS_ENTROPY_LEN: usize = 64;

/// Generate a new private-capable root for `coin`.
pub fn new_random_root(coin: Coin, extra_entropy: &str) -> Result<HdKey, KeyError> {
    let mut os_bytes = [0u8; OS_ENTROPY_LEN];
    rand::rngs::OsRng.fill_bytes(&mut os_bytes);

    let mut hasher = Sha512::new();
    hasher.update(os_bytes);
    hasher.update(extra_entropy.as_bytes());
    let mut seed = [0u8; 64];
    seed.copy_from_slice(&hasher.finalize());
    os_bytes.zeroize();

    let root = HdKey::from_seed(coin, &seed);
    seed.zeroize();
    tracing::debug!(%coin, extra_len = extra_entropy.len(), "generated new root");
    root
}

/// Rough upper bound on the entropy of a typed string, for display only.
///
/// Bit length of `len ^ distinct`, where `len` is the character count and
/// `distinct` the number of distinct characters. Not used for key material.
pub fn estimate_entropy_bits(text: &str) -> u32 {
    let len = text.chars().count();
    if len == 0 {
        return 0;
    }
    let distinct = text.chars().collect::<HashSet<_>>().len();
    if len == 1 {
        return 1;
    }
    ((distinct as f64) * (len as f64).log2()).floor() as u32 + 1
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn roots_are_unique() {
        let a = new_random_root(Coin::Btc, "").unwrap();
        let b = new_random_root(Coin::Btc, "").unwrap();
        assert_ne!(a.serialize_public(), b.serialize_public());
    }

    #[test]
    fn root_is_private_for_coin() {
        let root = new_random_root(Coin::Doge, "some typed noise").unwrap();
        assert!(root.is_private());
        assert_eq!(root.coin(), Coin::Doge);
        assert!(root.serialize_public().starts_with("dgub"));
    }

    #[test]
    fn estimate_matches_bit_length() {
        // 4^4 = 256 -> 9 bits
        assert_eq!(estimate_entropy_bits("abcd"), 9);
        // 10^3 = 1000 -> 10 bits
        assert_eq!(estimate_entropy_bits("aaabbbcccc"), 10);
        // 2^1 = 2 -> 2 bits
        assert_eq!(estimate_entropy_bits("zz"), 2);
    }

    #[test]
    fn estimate_edge_cases() {
        assert_eq!(estimate_entropy_bits(""), 0);
        assert_eq!(estimate_entropy_bits("x"), 1);
    }
}
