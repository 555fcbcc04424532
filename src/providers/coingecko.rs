use std::collections::{BTreeSet, HashMap};
use std::str::FromStr;
use std::time::Duration;

use anyhow::{bail, Context};
use async_trait::async_trait;
use bigdecimal::BigDecimal;
use reqwest::Client;
use tracing::{debug, warn};

use crate::traits::price_provider::PriceProvider;

/// `simple/price` body: `{ "bitcoin": { "usd": 65000.1 }, ... }`
type SimplePriceResponse = HashMap<String, HashMap<String, serde_json::Number>>;

/// CoinGecko simple-price provider
pub struct CoinGeckoPriceProvider {
    client: Client,
    api_base: String,
    api_key: Option<String>,
}

impl CoinGeckoPriceProvider {
    /// Create a new provider; `api_key` is sent as the demo API key header
    pub fn new(api_base: &str, api_key: Option<String>, timeout: Duration) -> anyhow::Result<Self> {
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .context("failed to build price HTTP client")?;
        Ok(Self {
            client,
            api_base: api_base.trim_end_matches('/').to_string(),
            api_key,
        })
    }

    /// Turn the raw body into exact decimal prices.
    ///
    /// Prices are parsed from the number's textual form so `0.1` stays `0.1`.
    fn parse_prices(body: SimplePriceResponse) -> HashMap<String, BigDecimal> {
        let mut prices = HashMap::with_capacity(body.len());
        for (id, quotes) in body {
            let Some(usd) = quotes.get("usd") else {
                debug!("No USD quote for {}", id);
                continue;
            };
            match BigDecimal::from_str(&usd.to_string()) {
                Ok(price) => {
                    prices.insert(id, price);
                }
                Err(e) => warn!("Unparseable price for {}: {} ({})", id, usd, e),
            }
        }
        prices
    }
}

#[async_trait]
impl PriceProvider for CoinGeckoPriceProvider {
    async fn get_usd_prices(&self, ids: &BTreeSet<String>) -> anyhow::Result<HashMap<String, BigDecimal>> {
        if ids.is_empty() {
            return Ok(HashMap::new());
        }

        let url = format!("{}/simple/price", self.api_base);
        let joined = ids.iter().cloned().collect::<Vec<_>>().join(",");

        let mut request = self
            .client
            .get(&url)
            .header("Accept", "application/json")
            .query(&[("ids", joined.as_str()), ("vs_currencies", "usd")]);
        if let Some(key) = &self.api_key {
            request = request.header("x-cg-demo-api-key", key);
        }

        let response = request
            .send()
            .await
            .with_context(|| format!("price request to {} failed", url))?;

        let status = response.status();
        if !status.is_success() {
            bail!("price API returned status {}", status);
        }

        let body: SimplePriceResponse = response.json().await.context("malformed price response")?;
        let prices = Self::parse_prices(body);
        debug!("Fetched {} of {} requested prices", prices.len(), ids.len());
        Ok(prices)
    }
}
