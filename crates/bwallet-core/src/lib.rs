//! # bwallet-core
//! Coin parameters, address codecs, shared types and the ledger gateway
//! contract used by the bwallet crates.

pub mod address;
pub mod coin;
pub mod constants;
pub mod error;
pub mod traits;
pub mod types;

pub use coin::Coin;
pub use traits::LedgerGateway;
