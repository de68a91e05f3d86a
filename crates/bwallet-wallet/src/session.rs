//! A wallet session: one root key against one ledger gateway.
//!
//! The session owns the root, the gateway wallet name and the last
//! used-address snapshot. Anything that depends on which addresses are used
//! (balance checks, change selection, verification) refreshes the snapshot
//! first. Pipeline operations take `&mut self`, so a session never has two
//! transactions in flight.

use std::sync::Arc;

use bwallet_core::LedgerGateway;
use bwallet_core::constants::{
    ACTIVE_ADDRESS_SEARCH_DEPTH, CHANGE_ADDRESS_COUNT, PRIVATE_KEY_DUMP_COUNT,
    RECEIVING_ADDRESS_COUNT,
};
use bwallet_core::types::{
    AddressRecord, BroadcastReceipt, DerivationPath, OutputValue, Subchain, TxRef,
    UsedAddressSet, WalletDetails, wallet_name_from_mpub,
};

use crate::builder::TransactionBuilder;
use crate::config::WalletConfig;
use crate::discovery::{find_paths, unused_addresses_on_subchain};
use crate::error::WalletError;
use crate::keys::{HdKey, parse_wif};
use crate::pipeline::{Pipeline, PipelineState};

/// What the interactive loop carries between menu choices.
#[derive(Debug, Clone)]
pub struct SessionState {
    pub root: HdKey,
    pub wallet_name: String,
    pub cached_used: UsedAddressSet,
}

/// A private key dumped for backup: path, WIF and address.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DumpedKey {
    pub path: DerivationPath,
    pub wif: String,
    pub address: String,
}

/// A used address and, when found within the search depth, its path.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ActiveAddress {
    pub address: String,
    pub path: Option<DerivationPath>,
}

/// Outcome of a send or sweep.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TxOutcome {
    pub receipt: BroadcastReceipt,
    pub final_state: PipelineState,
}

pub struct WalletSession {
    gateway: Arc<dyn LedgerGateway>,
    config: WalletConfig,
    state: SessionState,
}

impl WalletSession {
    /// Start a session; the wallet name is derived locally from the root.
    pub fn new(root: HdKey, gateway: Arc<dyn LedgerGateway>, config: WalletConfig) -> Self {
        let wallet_name = wallet_name_from_mpub(&root.serialize_public(), &Subchain::ALL);
        Self {
            gateway,
            config,
            state: SessionState {
                root,
                wallet_name,
                cached_used: UsedAddressSet::new(),
            },
        }
    }

    pub fn state(&self) -> &SessionState {
        &self.state
    }

    pub fn root(&self) -> &HdKey {
        &self.state.root
    }

    pub fn wallet_name(&self) -> &str {
        &self.state.wallet_name
    }

    pub fn master_public_key(&self) -> String {
        self.state.root.serialize_public()
    }

    /// Register the root's subchains with the gateway. Safe to repeat.
    pub async fn register(&self) -> Result<String, WalletError> {
        let root = &self.state.root;
        let name = self
            .gateway
            .register_wallet(root.coin(), &root.serialize_public(), &Subchain::ALL)
            .await
            .map_err(WalletError::network("register wallet"))?;
        if name != self.state.wallet_name {
            tracing::warn!(local = %self.state.wallet_name, remote = %name, "gateway renamed wallet");
        }
        tracing::info!(coin = %root.coin(), wallet = %name, "wallet registered");
        Ok(name)
    }

    /// Fetch wallet details and replace the used-address snapshot.
    pub async fn refresh(&mut self) -> Result<WalletDetails, WalletError> {
        let details = self
            .gateway
            .wallet_details(self.state.root.coin(), &self.state.wallet_name)
            .await
            .map_err(WalletError::network("wallet details"))?;
        tracing::debug!(
            used = details.used_addresses.len(),
            balance = details.balance,
            "refreshed wallet details"
        );
        self.state.cached_used = details.used_addresses.clone();
        Ok(details)
    }

    /// The next unused receiving addresses against a fresh snapshot.
    pub async fn receiving_addresses(&mut self) -> Result<Vec<AddressRecord>, WalletError> {
        self.refresh().await?;
        self.unused_on(Subchain::External, RECEIVING_ADDRESS_COUNT)
    }

    fn unused_on(&self, subchain: Subchain, count: usize) -> Result<Vec<AddressRecord>, WalletError> {
        unused_addresses_on_subchain(
            &self.state.root,
            subchain,
            count,
            &self.state.cached_used,
            self.config.discovery_ceiling,
        )
    }

    /// Unconfirmed then confirmed transaction references.
    pub async fn recent_transactions(&mut self) -> Result<Vec<TxRef>, WalletError> {
        let details = self.refresh().await?;
        Ok(details.recent_tx_refs().cloned().collect())
    }

    /// Send `amount` satoshis to `destination`, returning change to the wallet.
    pub async fn send(&mut self, destination: &str, amount: u64) -> Result<TxOutcome, WalletError> {
        if !self.state.root.is_private() {
            return Err(WalletError::NotPrivateKey);
        }
        let coin = self.state.root.coin();

        // Reject bad input before touching the network.
        TransactionBuilder::new(coin)
            .fund_from_wallet(&self.state.wallet_name)
            .add_output(destination, OutputValue::Amount(amount))
            .build(None)?;

        let details = self.refresh().await?;
        let change = self
            .unused_on(Subchain::Internal, CHANGE_ADDRESS_COUNT)?
            .into_iter()
            .next()
            .ok_or(WalletError::DiscoveryExhausted {
                subchain: Subchain::Internal,
                ceiling: self.config.discovery_ceiling,
            })?;
        tracing::debug!(change = %change.address, path = %change.path, "selected change address");

        let request = TransactionBuilder::new(coin)
            .fund_from_wallet(&self.state.wallet_name)
            .add_output(destination, OutputValue::Amount(amount))
            .set_change_address(&change.address)
            .build(Some(details.balance))?;

        let mut pipeline = Pipeline::new(self.gateway.as_ref());
        let receipt = pipeline
            .run_send(
                &self.state.root,
                &request,
                &self.state.cached_used,
                self.config.key_search_depth,
            )
            .await?;
        Ok(TxOutcome {
            receipt,
            final_state: pipeline.state().clone(),
        })
    }

    /// Move everything held by an external WIF key into the next receiving address.
    pub async fn sweep(&mut self, wif: &str) -> Result<TxOutcome, WalletError> {
        let coin = self.state.root.coin();
        let keypair = parse_wif(wif, coin)?;
        let source = keypair.address(coin);

        self.refresh().await?;
        let destination = self
            .unused_on(Subchain::External, 1)?
            .into_iter()
            .next()
            .ok_or(WalletError::DiscoveryExhausted {
                subchain: Subchain::External,
                ceiling: self.config.discovery_ceiling,
            })?;
        tracing::info!(%source, destination = %destination.address, "sweeping external key");

        let request = TransactionBuilder::new(coin)
            .fund_from_address(&source)
            .add_output(&destination.address, OutputValue::Sweep)
            .build(None)?;

        let mut pipeline = Pipeline::new(self.gateway.as_ref());
        let receipt = pipeline.run_sweep(&keypair, &request).await?;
        Ok(TxOutcome {
            receipt,
            final_state: pipeline.state().clone(),
        })
    }

    /// WIF keys for the first indices of both subchains.
    pub fn dump_private_keys(&self) -> Result<Vec<DumpedKey>, WalletError> {
        let root = &self.state.root;
        if !root.is_private() {
            return Err(WalletError::NotPrivateKey);
        }
        let mut keys = Vec::with_capacity(2 * PRIVATE_KEY_DUMP_COUNT as usize);
        for subchain in Subchain::ALL {
            let branch = root.derive_subchain(subchain)?;
            for index in 0..PRIVATE_KEY_DUMP_COUNT {
                let node = branch.derive_child(index)?;
                keys.push(DumpedKey {
                    path: DerivationPath::new(subchain, index),
                    wif: node.export_private_wif()?,
                    address: node.to_address(),
                });
            }
        }
        Ok(keys)
    }

    /// Every used address with its path, searched to a fixed depth.
    pub async fn active_addresses(&mut self) -> Result<Vec<ActiveAddress>, WalletError> {
        self.refresh().await?;
        let mut used: Vec<&String> = self.state.cached_used.iter().collect();
        used.sort();
        let paths = find_paths(&self.state.root, used.as_slice(), ACTIVE_ADDRESS_SEARCH_DEPTH)?;
        let mut active: Vec<ActiveAddress> = used
            .into_iter()
            .map(|address| ActiveAddress {
                address: address.clone(),
                path: paths.get(address.as_str()).copied(),
            })
            .collect();
        active.sort_by_key(|a| (a.path.is_none(), a.path));
        Ok(active)
    }
}
