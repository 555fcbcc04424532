use std::time::Duration;

use anyhow::{bail, Context};
use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;
use tracing::{debug, info};

use crate::models::token::{price_feed_id_from_name, TokenDescriptor};
use crate::models::wallet::{classify, AddressKind};
use crate::traits::token_discovery::TokenDiscovery;

#[derive(Debug, Deserialize)]
struct DiscoveredErc20 {
    token_address: String,
    #[serde(default)]
    symbol: Option<String>,
    #[serde(default)]
    name: Option<String>,
    #[serde(default)]
    decimals: Option<serde_json::Value>,
    #[serde(default)]
    possible_spam: bool,
}

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum Erc20Listing {
    Wrapped { result: Vec<DiscoveredErc20> },
    Plain(Vec<DiscoveredErc20>),
}

impl Erc20Listing {
    fn into_tokens(self) -> Vec<DiscoveredErc20> {
        match self {
            Erc20Listing::Wrapped { result } => result,
            Erc20Listing::Plain(tokens) => tokens,
        }
    }
}

/// Token discovery backed by the Moralis ERC-20 balances endpoint
pub struct MoralisTokenDiscovery {
    client: Client,
    api_base: String,
    api_key: String,
}

impl MoralisTokenDiscovery {
    pub fn new(api_base: &str, api_key: String, timeout: Duration) -> anyhow::Result<Self> {
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .context("failed to build discovery HTTP client")?;
        Ok(Self {
            client,
            api_base: api_base.trim_end_matches('/').to_string(),
            api_key,
        })
    }

    fn to_descriptors(chain_id: u64, listing: Erc20Listing) -> Vec<TokenDescriptor> {
        listing
            .into_tokens()
            .into_iter()
            .filter(|t| !t.possible_spam)
            .filter(|t| classify(&t.token_address) == AddressKind::Evm)
            .filter_map(|t| {
                let symbol = t.symbol.filter(|s| !s.trim().is_empty())?;
                let name = t.name.unwrap_or_else(|| symbol.clone());
                let decimals = t.decimals.as_ref().and_then(parse_decimals);
                Some(TokenDescriptor {
                    contract_address: Some(t.token_address),
                    price_feed_id: price_feed_id_from_name(&name),
                    symbol,
                    name,
                    decimals,
                    chain_id,
                })
            })
            .collect()
    }
}

/// Moralis reports decimals as a number or a numeric string
fn parse_decimals(value: &serde_json::Value) -> Option<u8> {
    match value {
        serde_json::Value::Number(n) => n.as_u64().and_then(|d| u8::try_from(d).ok()),
        serde_json::Value::String(s) => s.parse().ok(),
        _ => None,
    }
}

#[async_trait]
impl TokenDiscovery for MoralisTokenDiscovery {
    async fn discover(&self, chain_id: u64, address: &str) -> anyhow::Result<Vec<TokenDescriptor>> {
        let url = format!("{}/{}/erc20", self.api_base, address);
        let chain_hex = format!("0x{:x}", chain_id);

        let response = self
            .client
            .get(&url)
            .header("Accept", "application/json")
            .header("X-API-Key", &self.api_key)
            .query(&[("chain", chain_hex.as_str())])
            .send()
            .await
            .with_context(|| format!("token discovery request for {} failed", address))?;

        let status = response.status();
        if !status.is_success() {
            bail!("discovery API returned status {}", status);
        }

        let listing: Erc20Listing = response.json().await.context("malformed discovery response")?;
        let tokens = Self::to_descriptors(chain_id, listing);
        info!("Discovered {} token(s) for {} on chain {}", tokens.len(), address, chain_id);
        debug!("Discovered: {:?}", tokens.iter().map(|t| &t.symbol).collect::<Vec<_>>());
        Ok(tokens)
    }
}
