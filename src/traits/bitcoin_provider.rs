use async_trait::async_trait;

/// Balance lookup for Bitcoin addresses
#[async_trait]
pub trait BitcoinBalanceProvider: Send + Sync {
    /// Confirmed plus mempool balance in satoshis
    async fn get_balance(&self, address: &str) -> anyhow::Result<u64>;
}
