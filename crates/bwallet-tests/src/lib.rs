//! End-to-end wallet scenarios for bwallet.
//!
//! The integration tests under `tests/` drive a [`WalletSession`] against
//! [`helpers::MockGateway`], an in-memory ledger that selects inputs,
//! builds real preimages and checks signatures on broadcast. A misbehaving
//! gateway (extra inputs, failed broadcast) is one method call away.
//!
//! [`WalletSession`]: bwallet_wallet::WalletSession

pub mod helpers;
