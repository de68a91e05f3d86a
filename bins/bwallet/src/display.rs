//! Terminal rendering for balances, addresses and transactions.

use bwallet_core::coin::Coin;
use bwallet_core::constants::satoshis_to_coins;
use bwallet_core::types::{AddressRecord, BroadcastReceipt, TxDirection, TxRef, WalletDetails};
use bwallet_wallet::session::{ActiveAddress, DumpedKey};

/// Amount in whole coins with the ticker, e.g. `0.0005 BTC`.
pub fn amount(coin: Coin, satoshis: u64) -> String {
    format!("{} {}", satoshis_to_coins(satoshis), coin.currency_abbrev())
}

fn signed_amount(coin: Coin, satoshis: i64) -> String {
    let sign = if satoshis < 0 { "-" } else { "" };
    format!("{sign}{}", amount(coin, satoshis.unsigned_abs()))
}

pub fn balance_summary(coin: Coin, details: &WalletDetails, master_public_key: &str) {
    println!();
    println!("{} wallet {}", coin.display_name(), details.wallet_name);
    println!("  Total received: {}", amount(coin, details.total_received));
    println!("  Total sent:     {}", amount(coin, details.total_sent));
    println!("  Balance:        {}", signed_amount(coin, details.final_balance));
    if details.unconfirmed_tx_count > 0 {
        println!(
            "  Transactions:   {} ({} unconfirmed)",
            details.final_tx_count, details.unconfirmed_tx_count
        );
    } else {
        println!("  Transactions:   {}", details.final_tx_count);
    }
    println!();
    println!("More info: {}", coin.public_wallet_url(master_public_key));
}

/// Confirmed balance shown before the send amount prompt.
pub fn balance_line(coin: Coin, balance: u64) -> String {
    format!("Your current balance is {balance} satoshis ({})", amount(coin, balance))
}

/// How to reopen a wallet without its private key.
pub fn watch_only_hint(master_public_key: &str) -> String {
    format!("To open this wallet watch-only: bwallet --wallet={master_public_key}")
}

pub fn receiving_addresses(records: &[AddressRecord]) {
    println!("\nNext unused receiving addresses:");
    for record in records {
        println!("  {}  ({})", record.address, record.path);
    }
}

fn tx_line(coin: Coin, tx: &TxRef) -> String {
    let verb = match tx.direction() {
        TxDirection::Sent => "sent",
        TxDirection::Received => "received",
    };
    let when = match &tx.confirmed {
        Some(at) => at.format("%Y-%m-%d %H:%M UTC").to_string(),
        None => "unconfirmed".to_string(),
    };
    format!(
        "  {verb:>8} {}  {} confs  {when}\n           {}",
        amount(coin, tx.value),
        tx.confirmations,
        tx.tx_hash
    )
}

pub fn transactions(coin: Coin, txs: &[TxRef]) {
    if txs.is_empty() {
        println!("\nNo transactions yet.");
        return;
    }
    println!("\nRecent transactions:");
    for tx in txs {
        println!("{}", tx_line(coin, tx));
    }
}

pub fn broadcast(coin: Coin, receipt: &BroadcastReceipt) {
    println!("\nTransaction broadcast: {}", receipt.tx_hash);
    println!("Track it at {}", coin.tx_url(&receipt.tx_hash));
}

pub fn dumped_keys(keys: &[DumpedKey]) {
    println!("\nPrivate keys (keep these secret):");
    for key in keys {
        println!("  {}  {}  {}", key.path, key.address, key.wif);
    }
}

pub fn active_addresses(addresses: &[ActiveAddress]) {
    if addresses.is_empty() {
        println!("\nNo used addresses yet.");
        return;
    }
    println!("\nActive addresses:");
    for entry in addresses {
        match entry.path {
            Some(path) => println!("  {}  {}", path, entry.address),
            None => println!("  ?        {}  (deeper traversal needed)", entry.address),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn amount_uses_ticker() {
        assert_eq!(amount(Coin::Ltc, 50_000), "0.0005 LTC");
    }

    #[test]
    fn negative_balance_keeps_sign() {
        assert_eq!(signed_amount(Coin::Btc, -100_000_000), "-1 BTC");
    }

    #[test]
    fn balance_line_shows_satoshis_and_coins() {
        assert_eq!(
            balance_line(Coin::Btc, 150_000),
            "Your current balance is 150000 satoshis (0.0015 BTC)"
        );
    }

    #[test]
    fn watch_only_hint_names_public_key() {
        assert_eq!(
            watch_only_hint("xpub661MyMwAqRbc"),
            "To open this wallet watch-only: bwallet --wallet=xpub661MyMwAqRbc"
        );
    }

    #[test]
    fn unconfirmed_line() {
        let tx = TxRef {
            tx_hash: "ab".repeat(32),
            value: 1_000,
            tx_input_n: 0,
            tx_output_n: -1,
            confirmations: 0,
            confirmed: None,
        };
        let line = tx_line(Coin::Btc, &tx);
        assert!(line.contains("sent"));
        assert!(line.contains("unconfirmed"));
    }
}
