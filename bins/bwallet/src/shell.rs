//! Interactive menu loop over one wallet session.

use std::io::{self, BufRead, Write};

use anyhow::{Context, Result};
use zeroize::Zeroizing;

use bwallet_wallet::{WalletError, WalletSession};

use crate::display;

/// One entry of the main menu.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MenuChoice {
    Receive,
    Transactions,
    Send,
    Sweep,
    DumpKeys,
    Quit,
}

impl MenuChoice {
    pub fn parse(input: &str) -> Option<Self> {
        match input.trim().to_ascii_lowercase().as_str() {
            "1" => Some(MenuChoice::Receive),
            "2" => Some(MenuChoice::Transactions),
            "3" => Some(MenuChoice::Send),
            "4" => Some(MenuChoice::Sweep),
            "0" => Some(MenuChoice::DumpKeys),
            "q" | "quit" | "exit" => Some(MenuChoice::Quit),
            _ => None,
        }
    }
}

fn print_menu(private: bool) {
    println!();
    println!("  1: Show new receiving addresses");
    println!("  2: Show recent transactions");
    if private {
        println!("  3: Send funds");
    } else {
        println!("  3: Send funds (requires the master private key)");
    }
    println!("  4: Sweep funds from a private key into this wallet");
    if private {
        println!("  0: Dump private keys");
    } else {
        println!("  0: Dump active addresses");
    }
    println!("  q: Quit");
}

/// Print `label` and read one trimmed line. `None` on end of input.
pub fn read_line(label: &str) -> Result<Option<String>> {
    print!("{label}: ");
    io::stdout().flush().context("Failed to flush stdout")?;
    let mut line = String::new();
    let read = io::stdin()
        .lock()
        .read_line(&mut line)
        .context("Failed to read from stdin")?;
    if read == 0 {
        return Ok(None);
    }
    Ok(Some(line.trim().to_string()))
}

/// Run the menu until the user quits or stdin closes.
pub async fn run(session: &mut WalletSession) -> Result<()> {
    loop {
        print_menu(session.root().is_private());
        let Some(line) = read_line("What do you want to do")? else {
            return Ok(());
        };
        let Some(choice) = MenuChoice::parse(&line) else {
            println!("Unknown option {line:?}");
            continue;
        };
        tracing::debug!(?choice, "menu selection");

        let outcome = match choice {
            MenuChoice::Receive => receive(session).await,
            MenuChoice::Transactions => transactions(session).await,
            MenuChoice::Send => send(session).await,
            MenuChoice::Sweep => sweep(session).await,
            MenuChoice::DumpKeys => dump(session).await,
            MenuChoice::Quit => return Ok(()),
        };
        if let Err(e) = outcome {
            tracing::warn!(error = %e, "operation aborted");
            println!("\nOperation aborted: {e:#}");
        }
    }
}

async fn receive(session: &mut WalletSession) -> Result<()> {
    let records = session.receiving_addresses().await?;
    display::receiving_addresses(&records);
    Ok(())
}

async fn transactions(session: &mut WalletSession) -> Result<()> {
    let txs = session.recent_transactions().await?;
    display::transactions(session.root().coin(), &txs);
    Ok(())
}

async fn send(session: &mut WalletSession) -> Result<()> {
    if !session.root().is_private() {
        println!("\nThis session holds only the master public key.");
        println!("Offline transaction signing is not supported; restart with the master private key to send.");
        return Ok(());
    }
    let coin = session.root().coin();

    loop {
        let Some(destination) = read_line("Destination address (empty to cancel)")? else {
            return Ok(());
        };
        if destination.is_empty() {
            return Ok(());
        }
        let details = session.refresh().await?;
        println!("{}", display::balance_line(coin, details.balance));
        let Some(raw) = read_line("Amount in satoshis")? else {
            return Ok(());
        };
        let Ok(amount) = raw.parse::<u64>() else {
            println!("{raw:?} is not a whole number of satoshis");
            continue;
        };

        match session.send(&destination, amount).await {
            Ok(outcome) => {
                display::broadcast(coin, &outcome.receipt);
                return show_balance(session).await;
            }
            Err(e) if e.is_recoverable() => println!("{e}"),
            Err(e) => return Err(e.into()),
        }
    }
}

async fn sweep(session: &mut WalletSession) -> Result<()> {
    let coin = session.root().coin();
    loop {
        let wif = Zeroizing::new(
            rpassword::prompt_password("Private key to sweep, WIF (hidden, empty to cancel): ")
                .context("Failed to read private key")?,
        );
        if wif.trim().is_empty() {
            return Ok(());
        }
        match session.sweep(wif.trim()).await {
            Ok(outcome) => {
                display::broadcast(coin, &outcome.receipt);
                return show_balance(session).await;
            }
            Err(e @ WalletError::InvalidKey(_)) => println!("{e}"),
            Err(e) => return Err(e.into()),
        }
    }
}

async fn show_balance(session: &mut WalletSession) -> Result<()> {
    let details = session.refresh().await?;
    display::balance_summary(session.root().coin(), &details, &session.master_public_key());
    Ok(())
}

async fn dump(session: &mut WalletSession) -> Result<()> {
    if session.root().is_private() {
        let keys = session.dump_private_keys()?;
        display::dumped_keys(&keys);
    } else {
        let active = session.active_addresses().await?;
        display::active_addresses(&active);
    }
    Ok(())
}
