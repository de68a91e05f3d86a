//! Wallet constants. All monetary values in satoshis (1 coin = 10^8 satoshis).

pub const SATOSHIS_PER_COIN: u64 = 100_000_000;

/// Receiving addresses shown to the user per request.
pub const RECEIVING_ADDRESS_COUNT: usize = 5;

/// Change addresses requested per send.
pub const CHANGE_ADDRESS_COUNT: usize = 1;

/// Highest address index the discovery engine scans before giving up.
pub const DEFAULT_DISCOVERY_CEILING: u32 = 1_000;

/// Indices searched per subchain when mapping an input address back to its path.
pub const DEFAULT_KEY_SEARCH_DEPTH: u32 = 1_000;

/// Indices searched per subchain when listing active addresses in public mode.
pub const ACTIVE_ADDRESS_SEARCH_DEPTH: u32 = 100;

/// Keys per subchain printed by the private key dump.
pub const PRIVATE_KEY_DUMP_COUNT: u32 = 10;

/// Hex characters of the SHA-256 taken for a gateway wallet name.
pub const WALLET_NAME_HEX_LEN: usize = 24;

/// Sighash type committed to by every to-sign preimage.
pub const SIGHASH_ALL: u32 = 1;

/// Length of a transaction hash rendered as hex.
pub const TX_HASH_HEX_LEN: usize = 64;

/// Wire value that asks the gateway to spend the entire balance.
pub const SWEEP_WIRE_VALUE: i64 = -1;

/// Default base URL of the ledger gateway.
pub const DEFAULT_GATEWAY_URL: &str = "https://api.blockcypher.com";

/// Default timeout for a single gateway request, in seconds.
pub const DEFAULT_GATEWAY_TIMEOUT_SECS: u64 = 20;

/// Convert satoshis to whole coins (display helper, never used for amounts sent).
pub fn satoshis_to_coins(satoshis: u64) -> f64 {
    satoshis as f64 / SATOSHIS_PER_COIN as f64
}
