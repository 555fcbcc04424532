use std::collections::HashMap;
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

use tracing::level_filters::LevelFilter;

use crate::models::token::supported_chains;
use crate::tracker::scheduler::SchedulerConfig;

const DEFAULT_CHAIN_ID: u64 = 1;
const DEFAULT_COINGECKO_API_URL: &str = "https://api.coingecko.com/api/v3";
const DEFAULT_BITCOIN_API_URL: &str = "https://mempool.space/api";
const DEFAULT_MORALIS_API_URL: &str = "https://deep-index.moralis.io/api/v2.2";
const DEFAULT_DATA_DIR: &str = "./portfolio-data";

/// Public RPC endpoint used when none is configured for a chain
pub fn default_rpc_url(chain_id: u64) -> Option<&'static str> {
    match chain_id {
        1 => Some("https://ethereum-rpc.publicnode.com"),
        56 => Some("https://bsc-rpc.publicnode.com"),
        137 => Some("https://polygon-bor-rpc.publicnode.com"),
        42161 => Some("https://arbitrum-one-rpc.publicnode.com"),
        8453 => Some("https://base-rpc.publicnode.com"),
        11155111 => Some("https://ethereum-sepolia-rpc.publicnode.com"),
        _ => None,
    }
}

/// Runtime configuration, read from the environment
#[derive(Debug, Clone, PartialEq)]
pub struct TrackerConfig {
    pub chain_id: u64,
    /// JSON-RPC endpoint per chain id
    pub rpc_urls: HashMap<u64, String>,
    pub coingecko_api_url: String,
    pub coingecko_api_key: Option<String>,
    pub bitcoin_api_url: String,
    pub moralis_api_url: String,
    /// Token discovery is enabled only when set
    pub moralis_api_key: Option<String>,
    pub price_refresh: Duration,
    pub balance_refresh: Duration,
    pub http_timeout: Duration,
    pub import_timeout: Duration,
    pub data_dir: PathBuf,
    /// Wallets added at startup as if they had just connected
    pub wallets: Vec<String>,
    pub log_level: LevelFilter,
}

impl TrackerConfig {
    /// Load `.env` if present, then read the process environment
    pub fn from_env() -> Self {
        dotenvy::dotenv().ok();
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build a config from any key lookup. Blank values count as unset and
    /// unparseable numbers fall back to defaults.
    pub fn from_lookup<F>(lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| {
            lookup(key)
                .map(|v| v.trim().to_string())
                .filter(|v| !v.is_empty())
        };
        let secs = |key: &str, default: u64| {
            let secs = get(key)
                .and_then(|v| v.parse::<u64>().ok())
                .filter(|s| *s > 0)
                .unwrap_or(default);
            Duration::from_secs(secs)
        };

        let chain_id = get("CHAIN_ID")
            .and_then(|v| v.parse().ok())
            .unwrap_or(DEFAULT_CHAIN_ID);

        let mut rpc_urls = HashMap::new();
        for chain in supported_chains().chain(std::iter::once(chain_id)) {
            let url = get(&format!("RPC_URL_{}", chain))
                .or_else(|| default_rpc_url(chain).map(str::to_string));
            if let Some(url) = url {
                rpc_urls.insert(chain, url);
            }
        }
        if let Some(url) = get("EVM_RPC_URL") {
            rpc_urls.insert(chain_id, url);
        }

        let wallets = get("WALLETS")
            .map(|v| {
                v.split(',')
                    .map(str::trim)
                    .filter(|w| !w.is_empty())
                    .map(str::to_string)
                    .collect()
            })
            .unwrap_or_default();

        Self {
            chain_id,
            rpc_urls,
            coingecko_api_url: get("COINGECKO_API_URL").unwrap_or_else(|| DEFAULT_COINGECKO_API_URL.to_string()),
            coingecko_api_key: get("COINGECKO_API_KEY"),
            bitcoin_api_url: get("BITCOIN_API_URL").unwrap_or_else(|| DEFAULT_BITCOIN_API_URL.to_string()),
            moralis_api_url: get("MORALIS_API_URL").unwrap_or_else(|| DEFAULT_MORALIS_API_URL.to_string()),
            moralis_api_key: get("MORALIS_API_KEY"),
            price_refresh: secs("PRICE_REFRESH_SECS", 120),
            balance_refresh: secs("BALANCE_REFRESH_SECS", 30),
            http_timeout: secs("HTTP_TIMEOUT_SECS", 15),
            import_timeout: secs("IMPORT_TIMEOUT_SECS", 10),
            data_dir: get("DATA_DIR")
                .map(PathBuf::from)
                .unwrap_or_else(|| PathBuf::from(DEFAULT_DATA_DIR)),
            wallets,
            log_level: get("LOG_LEVEL")
                .and_then(|v| LevelFilter::from_str(&v).ok())
                .unwrap_or(LevelFilter::INFO),
        }
    }

    pub fn scheduler_config(&self) -> SchedulerConfig {
        SchedulerConfig {
            price_interval: self.price_refresh,
            balance_interval: self.balance_refresh,
        }
    }
}

impl Default for TrackerConfig {
    fn default() -> Self {
        Self::from_lookup(|_| None)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn from_pairs(pairs: &[(&str, &str)]) -> TrackerConfig {
        let vars: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        TrackerConfig::from_lookup(|key| vars.get(key).cloned())
    }

    #[test]
    fn defaults() {
        let config = TrackerConfig::default();
        assert_eq!(config.chain_id, 1);
        assert_eq!(config.price_refresh, Duration::from_secs(120));
        assert_eq!(config.balance_refresh, Duration::from_secs(30));
        assert_eq!(config.http_timeout, Duration::from_secs(15));
        assert_eq!(config.import_timeout, Duration::from_secs(10));
        assert_eq!(config.coingecko_api_url, DEFAULT_COINGECKO_API_URL);
        assert_eq!(config.bitcoin_api_url, DEFAULT_BITCOIN_API_URL);
        assert_eq!(config.data_dir, PathBuf::from("./portfolio-data"));
        assert_eq!(config.log_level, LevelFilter::INFO);
        assert!(config.moralis_api_key.is_none());
        assert!(config.wallets.is_empty());
        assert_eq!(config.rpc_urls.len(), 6);
    }

    #[test]
    fn overrides_and_bad_values() {
        let config = from_pairs(&[
            ("CHAIN_ID", "137"),
            ("EVM_RPC_URL", "http://localhost:8545"),
            ("RPC_URL_56", "http://bsc.local"),
            ("PRICE_REFRESH_SECS", "soon"),
            ("BALANCE_REFRESH_SECS", "0"),
            ("HTTP_TIMEOUT_SECS", "5"),
            ("COINGECKO_API_KEY", "  "),
            ("WALLETS", " 0xabc , ,bc1qxyz"),
            ("LOG_LEVEL", "debug"),
        ]);

        assert_eq!(config.chain_id, 137);
        assert_eq!(config.rpc_urls[&137], "http://localhost:8545");
        assert_eq!(config.rpc_urls[&56], "http://bsc.local");
        assert_eq!(config.price_refresh, Duration::from_secs(120));
        assert_eq!(config.balance_refresh, Duration::from_secs(30));
        assert_eq!(config.http_timeout, Duration::from_secs(5));
        assert!(config.coingecko_api_key.is_none());
        assert_eq!(config.wallets, vec!["0xabc", "bc1qxyz"]);
        assert_eq!(config.log_level, LevelFilter::DEBUG);
    }

    #[test]
    fn unknown_chain_needs_an_explicit_rpc() {
        let config = from_pairs(&[("CHAIN_ID", "999")]);
        assert!(!config.rpc_urls.contains_key(&999));

        let config = from_pairs(&[("CHAIN_ID", "999"), ("RPC_URL_999", "http://devnet")]);
        assert_eq!(config.rpc_urls[&999], "http://devnet");
    }
}
