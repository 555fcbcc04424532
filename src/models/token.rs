use serde::{Deserialize, Serialize};

use super::balance::AssetKey;

/// Decimals assumed for an ERC-20 without an explicit value
pub const DEFAULT_TOKEN_DECIMALS: u8 = 18;
/// Decimals of every EVM native coin we track
pub const NATIVE_DECIMALS: u8 = 18;
/// Satoshis per bitcoin, as a power of ten
pub const BITCOIN_DECIMALS: u8 = 8;
/// Price feed id used for Bitcoin wallets
pub const BITCOIN_FEED_ID: &str = "bitcoin";

/// Symbols that conventionally carry 6 decimals
const SIX_DECIMAL_SYMBOLS: [&str; 2] = ["USDT", "USDC"];

/// A tracked asset on one chain
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenDescriptor {
    /// Contract address; `None` for the chain's native coin
    pub contract_address: Option<String>,
    pub symbol: String,
    pub name: String,
    pub price_feed_id: String,
    /// Authoritative decimals when known
    #[serde(default)]
    pub decimals: Option<u8>,
    pub chain_id: u64,
}

impl TokenDescriptor {
    /// Create an ERC-20 descriptor
    pub fn erc20(
        chain_id: u64,
        contract_address: &str,
        symbol: &str,
        name: &str,
        price_feed_id: &str,
        decimals: Option<u8>,
    ) -> Self {
        Self {
            contract_address: Some(contract_address.to_string()),
            symbol: symbol.to_string(),
            name: name.to_string(),
            price_feed_id: price_feed_id.to_string(),
            decimals,
            chain_id,
        }
    }

    /// Descriptor for the native coin of a chain
    pub fn native(chain_id: u64) -> Self {
        let chain = chain_info(chain_id);
        Self {
            contract_address: None,
            symbol: chain.native_symbol.to_string(),
            name: chain.name.to_string(),
            price_feed_id: chain.native_feed_id.to_string(),
            decimals: Some(NATIVE_DECIMALS),
            chain_id,
        }
    }

    /// Decimals used for conversion: explicit value first, then the symbol table
    pub fn resolved_decimals(&self) -> u8 {
        self.decimals
            .unwrap_or_else(|| fallback_decimals(&self.symbol))
    }

    /// Lowercased contract used for deduplication
    pub fn contract_key(&self) -> Option<String> {
        self.contract_address.as_ref().map(|a| a.to_ascii_lowercase())
    }

    pub fn asset_key(&self) -> AssetKey {
        match self.contract_key() {
            Some(contract) => AssetKey::Token {
                chain_id: self.chain_id,
                contract,
            },
            None => AssetKey::Native { chain_id: self.chain_id },
        }
    }

    /// Case-insensitive contract match
    pub fn same_contract(&self, other: &TokenDescriptor) -> bool {
        self.chain_id == other.chain_id && self.contract_key() == other.contract_key()
    }
}

/// Symbol heuristic for tokens without authoritative decimals
pub fn fallback_decimals(symbol: &str) -> u8 {
    if SIX_DECIMAL_SYMBOLS
        .iter()
        .any(|s| s.eq_ignore_ascii_case(symbol))
    {
        6
    } else {
        DEFAULT_TOKEN_DECIMALS
    }
}

/// Best-effort price feed id from a token name: lowercase, whitespace runs become `-`
pub fn price_feed_id_from_name(name: &str) -> String {
    name.to_lowercase()
        .split_whitespace()
        .collect::<Vec<_>>()
        .join("-")
}

/// Static metadata about a supported EVM chain
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ChainInfo {
    pub id: u64,
    pub name: &'static str,
    pub native_symbol: &'static str,
    pub native_feed_id: &'static str,
}

const CHAINS: [ChainInfo; 6] = [
    ChainInfo { id: 1, name: "Ethereum", native_symbol: "ETH", native_feed_id: "ethereum" },
    ChainInfo { id: 56, name: "BNB Smart Chain", native_symbol: "BNB", native_feed_id: "binancecoin" },
    ChainInfo { id: 137, name: "Polygon", native_symbol: "POL", native_feed_id: "matic-network" },
    ChainInfo { id: 42161, name: "Arbitrum One", native_symbol: "ETH", native_feed_id: "ethereum" },
    ChainInfo { id: 8453, name: "Base", native_symbol: "ETH", native_feed_id: "ethereum" },
    ChainInfo { id: 11155111, name: "Sepolia", native_symbol: "ETH", native_feed_id: "ethereum" },
];

/// Chain metadata; unknown chains are treated as ETH-denominated
pub fn chain_info(chain_id: u64) -> ChainInfo {
    CHAINS
        .iter()
        .copied()
        .find(|c| c.id == chain_id)
        .unwrap_or(ChainInfo {
            id: chain_id,
            name: "Unknown EVM chain",
            native_symbol: "ETH",
            native_feed_id: "ethereum",
        })
}

/// Supported chain ids
pub fn supported_chains() -> impl Iterator<Item = u64> {
    CHAINS.iter().map(|c| c.id)
}

/// Built-in token list for a chain
pub fn default_tokens(chain_id: u64) -> Vec<TokenDescriptor> {
    let t = TokenDescriptor::erc20;
    match chain_id {
        1 => vec![
            t(1, "0xdAC17F958D2ee523a2206206994597C13D831ec7", "USDT", "Tether USD", "tether", Some(6)),
            t(1, "0xA0b86991c6218b36c1d19D4a2e9Eb0cE3606eB48", "USDC", "USD Coin", "usd-coin", Some(6)),
            t(1, "0x2260FAC5E5542a773Aa44fBCfeDf7C193bc2C599", "WBTC", "Wrapped BTC", "wrapped-bitcoin", Some(8)),
            t(1, "0x514910771AF9Ca656af840dff83E8264EcF986CA", "LINK", "Chainlink", "chainlink", Some(18)),
            t(1, "0x1f9840a85d5aF5bf1D1762F925BDADdC4201F984", "UNI", "Uniswap", "uniswap", Some(18)),
        ],
        // Binance-peg stablecoins use 18 decimals
        56 => vec![
            t(56, "0x55d398326f99059fF775485246999027B3197955", "USDT", "Tether USD", "tether", Some(18)),
            t(56, "0x8AC76a51cc950d9822D68b83fE1Ad97B32Cd580d", "USDC", "USD Coin", "usd-coin", Some(18)),
            t(56, "0x0E09FaBB73Bd3Ade0a17ECC321fD13a19e81cE82", "CAKE", "PancakeSwap", "pancakeswap-token", Some(18)),
        ],
        137 => vec![
            t(137, "0xc2132D05D31c914a87C6611C10748AEb04B58e8F", "USDT", "Tether USD", "tether", Some(6)),
            t(137, "0x3c499c542cEF5E3811e1192ce70d8cC03d5c3359", "USDC", "USD Coin", "usd-coin", Some(6)),
        ],
        42161 => vec![
            t(42161, "0xaf88d065e77c8cC2239327C5EDb3A432268e5831", "USDC", "USD Coin", "usd-coin", Some(6)),
            t(42161, "0x912CE59144191C1204E64559FE8253a0e49E6548", "ARB", "Arbitrum", "arbitrum", Some(18)),
        ],
        8453 => vec![
            t(8453, "0x833589fCD6eDb6E08f4c7C32D4f71b54bdA02913", "USDC", "USD Coin", "usd-coin", Some(6)),
        ],
        11155111 => vec![
            t(11155111, "0x779877A7B0D9E8603169DdbD7836e478b4624789", "LINK", "ChainLink Token", "chainlink", Some(18)),
        ],
        _ => Vec::new(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn decimals_fall_back_to_symbol_table() {
        let usdt = TokenDescriptor::erc20(1, "0x01", "USDT", "Tether", "tether", None);
        let shib = TokenDescriptor::erc20(1, "0x02", "SHIB", "Shiba Inu", "shiba-inu", None);
        let bsc_usdt = TokenDescriptor::erc20(56, "0x03", "USDT", "Tether", "tether", Some(18));

        assert_eq!(usdt.resolved_decimals(), 6);
        assert_eq!(shib.resolved_decimals(), 18);
        assert_eq!(bsc_usdt.resolved_decimals(), 18);
        assert_eq!(fallback_decimals("usdc"), 6);
    }

    #[test]
    fn feed_id_from_name() {
        assert_eq!(price_feed_id_from_name("Shiba Inu"), "shiba-inu");
        assert_eq!(price_feed_id_from_name("Wrapped  Liquid Staked Ether"), "wrapped-liquid-staked-ether");
        assert_eq!(price_feed_id_from_name("Chainlink"), "chainlink");
    }

    #[test]
    fn unknown_chain_defaults_to_ethereum_feed() {
        assert_eq!(chain_info(56).native_feed_id, "binancecoin");
        assert_eq!(chain_info(999_999).native_feed_id, "ethereum");
        assert!(default_tokens(999_999).is_empty());
    }

    #[test]
    fn default_tables_have_unique_contracts() {
        for chain in supported_chains() {
            let tokens = default_tokens(chain);
            for (i, a) in tokens.iter().enumerate() {
                assert_eq!(a.chain_id, chain);
                for b in &tokens[i + 1..] {
                    assert!(!a.same_contract(b), "{} duplicated on {}", a.symbol, chain);
                }
            }
        }
    }
}
