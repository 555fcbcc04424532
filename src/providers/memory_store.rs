use async_trait::async_trait;
use tokio::sync::RwLock;

use crate::traits::store::{CustomTokens, PortfolioStore};

/// Non-persistent store for tests and embedding
#[derive(Default)]
pub struct MemoryStore {
    wallets: RwLock<Vec<String>>,
    selected: RwLock<Vec<String>>,
    custom_tokens: RwLock<CustomTokens>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Store pre-populated as if a previous session had saved it
    pub fn seeded(wallets: Vec<String>, selected: Vec<String>, custom_tokens: CustomTokens) -> Self {
        Self {
            wallets: RwLock::new(wallets),
            selected: RwLock::new(selected),
            custom_tokens: RwLock::new(custom_tokens),
        }
    }
}

#[async_trait]
impl PortfolioStore for MemoryStore {
    async fn load_wallets(&self) -> anyhow::Result<Vec<String>> {
        Ok(self.wallets.read().await.clone())
    }

    async fn save_wallets(&self, wallets: &[String]) -> anyhow::Result<()> {
        *self.wallets.write().await = wallets.to_vec();
        Ok(())
    }

    async fn load_selection(&self) -> anyhow::Result<Vec<String>> {
        Ok(self.selected.read().await.clone())
    }

    async fn save_selection(&self, selected: &[String]) -> anyhow::Result<()> {
        *self.selected.write().await = selected.to_vec();
        Ok(())
    }

    async fn load_custom_tokens(&self) -> anyhow::Result<CustomTokens> {
        Ok(self.custom_tokens.read().await.clone())
    }

    async fn save_custom_tokens(&self, tokens: &CustomTokens) -> anyhow::Result<()> {
        *self.custom_tokens.write().await = tokens.clone();
        Ok(())
    }
}
