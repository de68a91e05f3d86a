//! Per-coin parameters.
//!
//! Every supported chain is a Bitcoin-derived P2PKH chain. They differ only
//! in version bytes (BIP-32 serialization, addresses, WIF) and in how the
//! ledger gateway and block explorer name them.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// A chain the wallet can hold keys for.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Coin {
    /// Bitcoin mainnet.
    Btc,
    /// Bitcoin testnet3.
    BtcTestnet,
    /// Litecoin mainnet.
    Ltc,
    /// Dogecoin mainnet.
    Doge,
    /// Dash mainnet.
    Dash,
    /// BlockCypher's private test chain.
    Bcy,
}

/// Static parameters for one [`Coin`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CoinParams {
    /// Short symbol used on the command line and in gateway paths.
    pub symbol: &'static str,
    /// Human-readable chain name.
    pub display_name: &'static str,
    /// Currency ticker.
    pub currency_abbrev: &'static str,
    /// BIP-32 version bytes of a serialized extended public key.
    pub xpub_version: [u8; 4],
    /// BIP-32 version bytes of a serialized extended private key.
    pub xprv_version: [u8; 4],
    /// Version byte of a pay-to-pubkey-hash address.
    pub p2pkh_version: u8,
    /// Version byte of a pay-to-script-hash address.
    pub p2sh_version: u8,
    /// Version byte of a WIF private key.
    pub wif_version: u8,
    /// Gateway coin path segment.
    pub api_coin: &'static str,
    /// Gateway chain path segment.
    pub api_chain: &'static str,
    /// Whether the chain is a test network.
    pub testnet: bool,
}

const BTC: CoinParams = CoinParams {
    symbol: "btc",
    display_name: "Bitcoin",
    currency_abbrev: "BTC",
    xpub_version: [0x04, 0x88, 0xB2, 0x1E],
    xprv_version: [0x04, 0x88, 0xAD, 0xE4],
    p2pkh_version: 0x00,
    p2sh_version: 0x05,
    wif_version: 0x80,
    api_coin: "btc",
    api_chain: "main",
    testnet: false,
};

const BTC_TESTNET: CoinParams = CoinParams {
    symbol: "btc-testnet",
    display_name: "Bitcoin Testnet",
    currency_abbrev: "tBTC",
    xpub_version: [0x04, 0x35, 0x87, 0xCF],
    xprv_version: [0x04, 0x35, 0x83, 0x94],
    p2pkh_version: 0x6F,
    p2sh_version: 0xC4,
    wif_version: 0xEF,
    api_coin: "btc",
    api_chain: "test3",
    testnet: true,
};

const LTC: CoinParams = CoinParams {
    symbol: "ltc",
    display_name: "Litecoin",
    currency_abbrev: "LTC",
    xpub_version: [0x01, 0x9D, 0xA4, 0x62],
    xprv_version: [0x01, 0x9D, 0x9C, 0xFE],
    p2pkh_version: 0x30,
    p2sh_version: 0x32,
    wif_version: 0xB0,
    api_coin: "ltc",
    api_chain: "main",
    testnet: false,
};

const DOGE: CoinParams = CoinParams {
    symbol: "doge",
    display_name: "Dogecoin",
    currency_abbrev: "DOGE",
    xpub_version: [0x02, 0xFA, 0xCA, 0xFD],
    xprv_version: [0x02, 0xFA, 0xC3, 0x98],
    p2pkh_version: 0x1E,
    p2sh_version: 0x16,
    wif_version: 0x9E,
    api_coin: "doge",
    api_chain: "main",
    testnet: false,
};

const DASH: CoinParams = CoinParams {
    symbol: "dash",
    display_name: "Dash",
    currency_abbrev: "DASH",
    xpub_version: [0x02, 0xFE, 0x52, 0xF8],
    xprv_version: [0x02, 0xFE, 0x52, 0xCC],
    p2pkh_version: 0x4C,
    p2sh_version: 0x10,
    wif_version: 0xCC,
    api_coin: "dash",
    api_chain: "main",
    testnet: false,
};

const BCY: CoinParams = CoinParams {
    symbol: "bcy",
    display_name: "BlockCypher Testnet",
    currency_abbrev: "BCY",
    xpub_version: [0x02, 0xD4, 0x13, 0xFF],
    xprv_version: [0x02, 0xD4, 0x0F, 0xC3],
    p2pkh_version: 0x1B,
    p2sh_version: 0x1F,
    wif_version: 0x49,
    api_coin: "bcy",
    api_chain: "test",
    testnet: true,
};

/// Whether a set of BIP-32 version bytes names a public or a private key.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum KeyVisibility {
    Public,
    Private,
}

impl Coin {
    /// All supported coins, in the order the shell lists them.
    pub const ALL: [Coin; 6] = [
        Coin::Btc,
        Coin::BtcTestnet,
        Coin::Ltc,
        Coin::Doge,
        Coin::Dash,
        Coin::Bcy,
    ];

    /// Static parameters for this coin.
    pub fn params(&self) -> &'static CoinParams {
        match self {
            Coin::Btc => &BTC,
            Coin::BtcTestnet => &BTC_TESTNET,
            Coin::Ltc => &LTC,
            Coin::Doge => &DOGE,
            Coin::Dash => &DASH,
            Coin::Bcy => &BCY,
        }
    }

    pub fn symbol(&self) -> &'static str {
        self.params().symbol
    }

    pub fn display_name(&self) -> &'static str {
        self.params().display_name
    }

    pub fn currency_abbrev(&self) -> &'static str {
        self.params().currency_abbrev
    }

    pub fn is_testnet(&self) -> bool {
        self.params().testnet
    }

    /// Identify the coin and key visibility from BIP-32 version bytes.
    pub fn from_extended_key_version(version: [u8; 4]) -> Option<(Coin, KeyVisibility)> {
        Coin::ALL.into_iter().find_map(|coin| {
            let p = coin.params();
            if p.xpub_version == version {
                Some((coin, KeyVisibility::Public))
            } else if p.xprv_version == version {
                Some((coin, KeyVisibility::Private))
            } else {
                None
            }
        })
    }

    /// Gateway path prefix, e.g. `/v1/btc/main`.
    pub fn api_path(&self) -> String {
        let p = self.params();
        format!("/v1/{}/{}", p.api_coin, p.api_chain)
    }

    /// Public explorer page for an HD wallet tracked on subchains 0 and 1.
    pub fn public_wallet_url(&self, master_public_key: &str) -> String {
        format!(
            "https://live.blockcypher.com/{}/xpub/{}/0-1/",
            self.symbol(),
            master_public_key
        )
    }

    /// Public explorer page for a transaction.
    pub fn tx_url(&self, tx_hash: &str) -> String {
        format!("https://live.blockcypher.com/{}/tx/{}/", self.symbol(), tx_hash)
    }
}

impl fmt::Display for Coin {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.symbol())
    }
}

/// Error returned when parsing an unknown coin symbol.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown coin symbol: {0}")]
pub struct UnknownCoin(pub String);

impl FromStr for Coin {
    type Err = UnknownCoin;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let lower = s.trim().to_ascii_lowercase();
        Coin::ALL
            .into_iter()
            .find(|c| c.symbol() == lower)
            .ok_or(UnknownCoin(s.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    #[test]
    fn symbol_roundtrip() {
        for coin in Coin::ALL {
            assert_eq!(coin.symbol().parse::<Coin>().unwrap(), coin);
        }
    }

    #[test]
    fn parse_is_case_insensitive() {
        assert_eq!("BTC-Testnet".parse::<Coin>().unwrap(), Coin::BtcTestnet);
    }

    #[test]
    fn parse_unknown_fails() {
        let err = "xmr".parse::<Coin>().unwrap_err();
        assert_eq!(err.to_string(), "unknown coin symbol: xmr");
    }

    #[test]
    fn extended_key_versions_are_unique() {
        let mut seen = HashSet::new();
        for coin in Coin::ALL {
            assert!(seen.insert(coin.params().xpub_version), "{coin} xpub clash");
            assert!(seen.insert(coin.params().xprv_version), "{coin} xprv clash");
        }
    }

    #[test]
    fn version_lookup_distinguishes_visibility() {
        assert_eq!(
            Coin::from_extended_key_version([0x04, 0x88, 0xB2, 0x1E]),
            Some((Coin::Btc, KeyVisibility::Public))
        );
        assert_eq!(
            Coin::from_extended_key_version([0x04, 0x35, 0x83, 0x94]),
            Some((Coin::BtcTestnet, KeyVisibility::Private))
        );
        assert_eq!(Coin::from_extended_key_version([0; 4]), None);
    }

    #[test]
    fn api_path_format() {
        assert_eq!(Coin::Btc.api_path(), "/v1/btc/main");
        assert_eq!(Coin::BtcTestnet.api_path(), "/v1/btc/test3");
        assert_eq!(Coin::Bcy.api_path(), "/v1/bcy/test");
    }

    #[test]
    fn explorer_urls() {
        assert_eq!(
            Coin::Ltc.tx_url("abcd"),
            "https://live.blockcypher.com/ltc/tx/abcd/"
        );
        assert_eq!(
            Coin::Btc.public_wallet_url("xpub123"),
            "https://live.blockcypher.com/btc/xpub/xpub123/0-1/"
        );
    }

    #[test]
    fn serde_uses_symbols() {
        let json = serde_json::to_string(&Coin::BtcTestnet).unwrap();
        assert_eq!(json, "\"btc-testnet\"");
        let back: Coin = serde_json::from_str(&json).unwrap();
        assert_eq!(back, Coin::BtcTestnet);
    }
}
