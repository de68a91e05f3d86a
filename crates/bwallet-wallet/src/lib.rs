//! # bwallet-wallet — HD keys, address discovery and transaction signing.
//!
//! Derives addresses from a BIP-32 root, finds the next unused ones against
//! the ledger's used-address set, and runs the assemble/verify/sign/broadcast
//! pipeline against a [`LedgerGateway`](bwallet_core::LedgerGateway).
//!
//! # Modules
//!
//! - [`error`] — `WalletError` enum
//! - [`keys`] — `HdKey`, `PrivateNode`, `PublicNode`, `KeyPair`
//! - [`entropy`] — random root generation and the entropy estimate
//! - [`discovery`] — unused-address scan and reverse path search
//! - [`verify`] — checks on gateway-proposed transactions
//! - [`builder`] — transaction request builder and digest signing
//! - [`pipeline`] — state-tracked send and sweep flows
//! - [`session`] — per-root session with cached used addresses
//! - [`config`] — scan limits

pub mod builder;
pub mod config;
pub mod discovery;
pub mod entropy;
pub mod error;
pub mod keys;
pub mod pipeline;
pub mod session;
pub mod verify;

pub use builder::TransactionBuilder;
pub use config::WalletConfig;
pub use error::WalletError;
pub use keys::{HdKey, KeyPair, PrivateNode, PublicNode};
pub use pipeline::PipelineState;
pub use session::{SessionState, WalletSession};
