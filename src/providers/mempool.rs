use std::time::Duration;

use anyhow::{bail, Context};
use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;
use tracing::debug;

use crate::traits::bitcoin_provider::BitcoinBalanceProvider;

#[derive(Debug, Deserialize)]
struct TxoStats {
    funded_txo_sum: u64,
    spent_txo_sum: u64,
}

#[derive(Debug, Deserialize)]
struct AddressStats {
    chain_stats: TxoStats,
    mempool_stats: TxoStats,
}

impl AddressStats {
    /// (confirmed funded − spent) + (mempool funded − spent)
    fn balance_sats(&self) -> anyhow::Result<u64> {
        let confirmed =
            i128::from(self.chain_stats.funded_txo_sum) - i128::from(self.chain_stats.spent_txo_sum);
        let pending =
            i128::from(self.mempool_stats.funded_txo_sum) - i128::from(self.mempool_stats.spent_txo_sum);
        let total = confirmed + pending;
        if total < 0 {
            bail!("negative balance reported: {} sats", total);
        }
        u64::try_from(total).context("balance does not fit in u64")
    }
}

/// Bitcoin balances from a mempool.space-compatible address endpoint
pub struct MempoolBitcoinProvider {
    client: Client,
    api_base: String,
}

impl MempoolBitcoinProvider {
    pub fn new(api_base: &str, timeout: Duration) -> anyhow::Result<Self> {
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .context("failed to build bitcoin HTTP client")?;
        Ok(Self {
            client,
            api_base: api_base.trim_end_matches('/').to_string(),
        })
    }
}

#[async_trait]
impl BitcoinBalanceProvider for MempoolBitcoinProvider {
    async fn get_balance(&self, address: &str) -> anyhow::Result<u64> {
        let url = format!("{}/address/{}", self.api_base, address);
        let response = self
            .client
            .get(&url)
            .send()
            .await
            .with_context(|| format!("bitcoin balance request for {} failed", address))?;

        let status = response.status();
        if !status.is_success() {
            bail!("bitcoin API returned status {} for {}", status, address);
        }

        let stats: AddressStats = response.json().await.context("malformed address stats")?;
        let sats = stats.balance_sats()?;
        debug!("Bitcoin balance for {}: {} sats", address, sats);
        Ok(sats)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn stats(json: &str) -> AddressStats {
        serde_json::from_str(json).unwrap()
    }

    #[test]
    fn confirmed_only() {
        let s = stats(
            r#"{"address":"bc1q","chain_stats":{"funded_txo_count":1,"funded_txo_sum":100000000,"spent_txo_count":0,"spent_txo_sum":0,"tx_count":1},
               "mempool_stats":{"funded_txo_count":0,"funded_txo_sum":0,"spent_txo_count":0,"spent_txo_sum":0,"tx_count":0}}"#,
        );
        assert_eq!(s.balance_sats().unwrap(), 100_000_000);
    }

    #[test]
    fn mempool_spend_reduces_balance() {
        let s = stats(
            r#"{"chain_stats":{"funded_txo_sum":50000,"spent_txo_sum":10000},
               "mempool_stats":{"funded_txo_sum":2000,"spent_txo_sum":40000}}"#,
        );
        assert_eq!(s.balance_sats().unwrap(), 2_000);
    }

    #[test]
    fn negative_totals_are_rejected() {
        let s = stats(
            r#"{"chain_stats":{"funded_txo_sum":0,"spent_txo_sum":0},
               "mempool_stats":{"funded_txo_sum":0,"spent_txo_sum":1}}"#,
        );
        assert!(s.balance_sats().is_err());
    }
}
