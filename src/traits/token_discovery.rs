use async_trait::async_trait;

use crate::models::token::TokenDescriptor;

/// Finds tokens held by a wallet through an indexer
#[async_trait]
pub trait TokenDiscovery: Send + Sync {
    /// ERC-20 tokens held by `address` on `chain_id`, spam already filtered out
    async fn discover(&self, chain_id: u64, address: &str) -> anyhow::Result<Vec<TokenDescriptor>>;
}
