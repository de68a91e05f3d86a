//! Scan limits for discovery and key search.

use bwallet_core::constants::{DEFAULT_DISCOVERY_CEILING, DEFAULT_KEY_SEARCH_DEPTH};

/// Bounds on how far the wallet walks each subchain.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WalletConfig {
    /// Indices scanned per subchain when looking for unused addresses.
    pub discovery_ceiling: u32,
    /// Indices searched per subchain when mapping an input address to its key.
    pub key_search_depth: u32,
}

impl Default for WalletConfig {
    fn default() -> Self {
        Self {
            discovery_ceiling: DEFAULT_DISCOVERY_CEILING,
            key_search_depth: DEFAULT_KEY_SEARCH_DEPTH,
        }
    }
}
