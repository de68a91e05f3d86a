//! Unused-address discovery and reverse path search.
//!
//! Addresses live at `m/{subchain}/{index}`. Discovery walks one subchain
//! upward from index 0 and collects the first `count` addresses the ledger
//! has never seen. Reverse search walks both subchains to map an address
//! back to the path (and so the key) that produced it.

use std::collections::{HashMap, HashSet};

use bwallet_core::types::{AddressRecord, DerivationPath, Subchain, UsedAddressSet};

use crate::error::WalletError;
use crate::keys::HdKey;

/// The `count` lowest-indexed addresses on `subchain` absent from `used`,
/// in ascending index order.
///
/// Scans indices `0..ceiling`. Running out of indices before `count`
/// addresses are found is [`WalletError::DiscoveryExhausted`].
pub fn unused_addresses_on_subchain(
    root: &HdKey,
    subchain: Subchain,
    count: usize,
    used: &UsedAddressSet,
    ceiling: u32,
) -> Result<Vec<AddressRecord>, WalletError> {
    if count == 0 {
        return Ok(Vec::new());
    }

    let branch = root.derive_subchain(subchain)?.to_public();
    let mut found = Vec::with_capacity(count);
    for index in 0..ceiling {
        let address = branch.derive_child(index)?.address();
        if used.contains(&address) {
            continue;
        }
        tracing::trace!(%subchain, index, "unused address");
        found.push(AddressRecord {
            address,
            path: DerivationPath::new(subchain, index),
        });
        if found.len() == count {
            return Ok(found);
        }
    }

    tracing::warn!(%subchain, ceiling, found = found.len(), "discovery ceiling reached");
    Err(WalletError::DiscoveryExhausted { subchain, ceiling })
}

/// Find the path of `address` within `depth` indices of either subchain.
///
/// Subchain 0 is searched completely before subchain 1.
pub fn find_path(
    root: &HdKey,
    address: &str,
    depth: u32,
) -> Result<Option<DerivationPath>, WalletError> {
    let mut found = find_paths(root, std::slice::from_ref(&address), depth)?;
    Ok(found.remove(address))
}

/// Find paths for many addresses in a single traversal.
///
/// Addresses not derivable within `depth` indices are absent from the map.
pub fn find_paths<S: AsRef<str>>(
    root: &HdKey,
    addresses: &[S],
    depth: u32,
) -> Result<HashMap<String, DerivationPath>, WalletError> {
    let mut wanted: HashSet<&str> = addresses.iter().map(AsRef::as_ref).collect();
    let mut found = HashMap::with_capacity(wanted.len());
    if wanted.is_empty() {
        return Ok(found);
    }

    for subchain in Subchain::ALL {
        let branch = root.derive_subchain(subchain)?.to_public();
        for index in 0..depth {
            let address = branch.derive_child(index)?.address();
            if wanted.remove(address.as_str()) {
                found.insert(address, DerivationPath::new(subchain, index));
                if wanted.is_empty() {
                    return Ok(found);
                }
            }
        }
    }

    tracing::debug!(missing = wanted.len(), depth, "reverse search left addresses unresolved");
    Ok(found)
}

#[cfg(test)]
mod tests {
    use super::*;
    use bwallet_core::coin::Coin;
    use proptest::prelude::*;

    fn root() -> HdKey {
        HdKey::from_seed(Coin::Btc, &[0x5a; 32]).unwrap()
    }

    fn address_at(root: &HdKey, subchain: Subchain, index: u32) -> String {
        root.derive_path(DerivationPath::new(subchain, index)).unwrap().to_address()
    }

    #[test]
    fn empty_used_set_yields_first_indices() {
        let root = root();
        let found =
            unused_addresses_on_subchain(&root, Subchain::External, 5, &UsedAddressSet::new(), 1000)
                .unwrap();
        let indices: Vec<_> = found.iter().map(|r| r.path.index).collect();
        assert_eq!(indices, [0, 1, 2, 3, 4]);
        assert_eq!(found[2].address, address_at(&root, Subchain::External, 2));
    }

    #[test]
    fn skips_used_addresses() {
        let root = root();
        let used: UsedAddressSet = [0, 1, 3]
            .into_iter()
            .map(|i| address_at(&root, Subchain::External, i))
            .collect();
        let found =
            unused_addresses_on_subchain(&root, Subchain::External, 3, &used, 1000).unwrap();
        let indices: Vec<_> = found.iter().map(|r| r.path.index).collect();
        assert_eq!(indices, [2, 4, 5]);
    }

    #[test]
    fn change_subchain_is_independent() {
        let root = root();
        let used: UsedAddressSet =
            [address_at(&root, Subchain::External, 0)].into_iter().collect();
        let found = unused_addresses_on_subchain(&root, Subchain::Internal, 1, &used, 1000).unwrap();
        assert_eq!(found[0].path, DerivationPath::new(Subchain::Internal, 0));
    }

    #[test]
    fn zero_count_does_not_scan() {
        let public = HdKey::PublicOnly(root().to_public());
        let found =
            unused_addresses_on_subchain(&public, Subchain::External, 0, &UsedAddressSet::new(), 0)
                .unwrap();
        assert!(found.is_empty());
    }

    #[test]
    fn ceiling_is_enforced() {
        let root = root();
        let used: UsedAddressSet =
            (0..10).map(|i| address_at(&root, Subchain::External, i)).collect();
        let err = unused_addresses_on_subchain(&root, Subchain::External, 1, &used, 10).unwrap_err();
        assert_eq!(
            err,
            WalletError::DiscoveryExhausted { subchain: Subchain::External, ceiling: 10 }
        );
    }

    #[test]
    fn reverse_search_finds_both_subchains() {
        let root = root();
        let change = address_at(&root, Subchain::Internal, 12);
        assert_eq!(
            find_path(&root, &change, 50).unwrap(),
            Some(DerivationPath::new(Subchain::Internal, 12))
        );
    }

    #[test]
    fn reverse_search_respects_depth() {
        let root = root();
        let deep = address_at(&root, Subchain::External, 30);
        assert_eq!(find_path(&root, &deep, 30).unwrap(), None);
        assert!(find_path(&root, "1BoatSLRHtKNngkdXEeobR76b53LETtpyT", 20).unwrap().is_none());
    }

    #[test]
    fn batch_search_resolves_each_address() {
        let root = root();
        let a = address_at(&root, Subchain::External, 4);
        let b = address_at(&root, Subchain::Internal, 0);
        let found = find_paths(&root, &[a.clone(), b.clone(), "unknown".to_string()], 10).unwrap();
        assert_eq!(found.len(), 2);
        assert_eq!(found[&a], DerivationPath::new(Subchain::External, 4));
        assert_eq!(found[&b], DerivationPath::new(Subchain::Internal, 0));
    }

    proptest! {
        #![proptest_config(ProptestConfig::with_cases(16))]

        #[test]
        fn discovered_addresses_are_unused_and_ascending(
            used_indices in proptest::collection::btree_set(0u32..30, 0..20),
            count in 1usize..6,
        ) {
            let root = root();
            let used: UsedAddressSet = used_indices
                .iter()
                .map(|&i| address_at(&root, Subchain::External, i))
                .collect();
            let found = unused_addresses_on_subchain(&root, Subchain::External, count, &used, 1000).unwrap();
            prop_assert_eq!(found.len(), count);
            for pair in found.windows(2) {
                prop_assert!(pair[0].path.index < pair[1].path.index);
            }
            for rec in &found {
                prop_assert!(!used.contains(&rec.address));
                prop_assert!(!used_indices.contains(&rec.path.index));
            }
        }
    }
}
