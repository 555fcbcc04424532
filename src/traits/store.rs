use std::collections::HashMap;

use async_trait::async_trait;

use crate::models::token::TokenDescriptor;

/// Custom tokens persisted per chain id
pub type CustomTokens = HashMap<u64, Vec<TokenDescriptor>>;

/// Persistence for the wallet list, the selection and custom tokens.
///
/// Each is an independent blob; missing blobs load as empty.
#[async_trait]
pub trait PortfolioStore: Send + Sync {
    async fn load_wallets(&self) -> anyhow::Result<Vec<String>>;
    async fn save_wallets(&self, wallets: &[String]) -> anyhow::Result<()>;

    async fn load_selection(&self) -> anyhow::Result<Vec<String>>;
    async fn save_selection(&self, selected: &[String]) -> anyhow::Result<()>;

    async fn load_custom_tokens(&self) -> anyhow::Result<CustomTokens>;
    async fn save_custom_tokens(&self, tokens: &CustomTokens) -> anyhow::Result<()>;
}
