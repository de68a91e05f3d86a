//! # bwallet-gateway
//! [`LedgerGateway`](bwallet_core::LedgerGateway) over the BlockCypher REST
//! API: HD wallet registration, wallet details, transaction assembly and
//! broadcast.

pub mod client;
pub mod config;
pub mod wire;

pub use client::HttpGateway;
pub use config::GatewayConfig;
