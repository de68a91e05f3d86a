//! bwallet — command-line HD wallet.
//!
//! With `--wallet <key>` it opens an interactive session on that extended
//! key (private or public). Without it, it generates a new master key from
//! OS randomness plus optional typed entropy, prints it and exits.

use std::sync::Arc;

use anyhow::{Context, Result};
use clap::Parser;
use zeroize::Zeroizing;

use bwallet_core::coin::Coin;
use bwallet_gateway::HttpGateway;
use bwallet_wallet::entropy::{estimate_entropy_bits, new_random_root};
use bwallet_wallet::{HdKey, WalletSession};

mod config;
mod display;
mod shell;

use config::Config;

/// Command-line HD wallet backed by a remote ledger service.
#[derive(Parser)]
#[command(name = "bwallet")]
#[command(version, about = "Command-line HD wallet backed by a remote ledger service.")]
struct Cli {
    /// Master private or public extended key to open.
    #[arg(short, long)]
    wallet: Option<String>,

    /// Log debug output to stderr.
    #[arg(short, long)]
    verbose: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let filter = if cli.verbose {
        tracing_subscriber::EnvFilter::new("debug")
    } else {
        tracing_subscriber::EnvFilter::try_from_default_env()
            .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("warn"))
    };
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();

    match cli.wallet {
        Some(key) => open_wallet(Zeroizing::new(key)).await,
        None => create_wallet(),
    }
}

/// Register the key with the gateway, print the summary and run the menu.
async fn open_wallet(key: Zeroizing<String>) -> Result<()> {
    let config = Config::from_env().context("Failed to load bwallet configuration")?;
    let root = HdKey::deserialize_any(key.trim())
        .context("--wallet is not a supported extended private or public key")?;
    let coin = root.coin();
    tracing::info!(
        %coin,
        private = root.is_private(),
        gateway = %config.gateway.base_url,
        "opening wallet"
    );
    if config.gateway.api_token.is_none() {
        tracing::warn!("BLOCKCYPHER_PUBLIC_API_KEY not set; gateway requests may be rate limited");
    }

    let gateway = HttpGateway::new(config.gateway).context("Failed to set up ledger gateway")?;
    let mut session = WalletSession::new(root, Arc::new(gateway), config.wallet);

    session
        .register()
        .await
        .context("Failed to register wallet with the ledger gateway")?;
    let details = session
        .refresh()
        .await
        .context("Failed to fetch wallet details")?;
    display::balance_summary(coin, &details, &session.master_public_key());

    if session.root().is_private() {
        println!("\n{}", display::watch_only_hint(&session.master_public_key()));
    } else {
        println!("\nOpened with a master public key: you can receive and sweep, but not send.");
    }

    shell::run(&mut session).await
}

fn choose_coin() -> Result<Coin> {
    println!("Which currency should the new wallet hold?");
    for (i, coin) in Coin::ALL.iter().enumerate() {
        println!("  {}: {} ({})", i + 1, coin.display_name(), coin.symbol());
    }
    loop {
        let Some(line) = shell::read_line("Currency [1]")? else {
            anyhow::bail!("no currency chosen");
        };
        if line.is_empty() {
            return Ok(Coin::Btc);
        }
        let by_number = line
            .parse::<usize>()
            .ok()
            .and_then(|n| n.checked_sub(1))
            .and_then(|i| Coin::ALL.get(i).copied());
        match by_number.or_else(|| line.parse::<Coin>().ok()) {
            Some(coin) => return Ok(coin),
            None => println!("{line:?} is not one of the listed currencies"),
        }
    }
}

/// Generate and print a new master key pair.
fn create_wallet() -> Result<()> {
    let coin = choose_coin()?;

    println!("\nThe wallet is seeded from your operating system's random number generator.");
    println!("You may mix in extra entropy by typing random characters (input is hidden).");
    let extra = Zeroizing::new(
        rpassword::prompt_password("Extra entropy (optional): ")
            .context("Failed to read extra entropy")?,
    );
    let bits = estimate_entropy_bits(&extra);
    if bits > 0 {
        println!("Mixed in roughly {bits} bits of extra entropy.");
    }

    let root = new_random_root(coin, &extra).context("Failed to generate master key")?;
    let private = Zeroizing::new(root.serialize_private()?);

    println!("\n=== NEW {} WALLET ===", coin.display_name().to_uppercase());
    println!("\nMaster private key (BACK THIS UP, it controls all funds):");
    println!("  {}", private.as_str());
    println!("\nMaster public key (watch-only, safe to share):");
    println!("  {}", root.serialize_public());
    println!("\nOpen it with: bwallet --wallet <master private key>");
    Ok(())
}
