use std::path::{Path, PathBuf};

use anyhow::Context;
use async_trait::async_trait;
use serde::de::DeserializeOwned;
use serde::Serialize;
use tracing::debug;

use crate::traits::store::{CustomTokens, PortfolioStore};

const WALLETS_KEY: &str = "wallets";
const SELECTION_KEY: &str = "selected_wallets";
const CUSTOM_TOKENS_KEY: &str = "custom_tokens";

/// Stores each blob as `<dir>/<key>.json`
pub struct JsonFileStore {
    dir: PathBuf,
}

impl JsonFileStore {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    fn path_for(&self, key: &str) -> PathBuf {
        self.dir.join(format!("{}.json", key))
    }

    async fn load<T: DeserializeOwned + Default>(&self, key: &str) -> anyhow::Result<T> {
        let path = self.path_for(key);
        let bytes = match tokio::fs::read(&path).await {
            Ok(bytes) => bytes,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                debug!("No stored {} at {}, starting empty", key, path.display());
                return Ok(T::default());
            }
            Err(e) => return Err(e).with_context(|| format!("failed to read {}", path.display())),
        };
        serde_json::from_slice(&bytes).with_context(|| format!("corrupt {} in {}", key, path.display()))
    }

    /// Write to a temp file then rename so a crash never leaves half a blob
    async fn save<T: Serialize + ?Sized>(&self, key: &str, value: &T) -> anyhow::Result<()> {
        tokio::fs::create_dir_all(&self.dir)
            .await
            .with_context(|| format!("failed to create {}", self.dir.display()))?;

        let path = self.path_for(key);
        let tmp = self.dir.join(format!(".{}.json.tmp", key));
        let json = serde_json::to_vec_pretty(value)?;

        tokio::fs::write(&tmp, json)
            .await
            .with_context(|| format!("failed to write {}", tmp.display()))?;
        tokio::fs::rename(&tmp, &path)
            .await
            .with_context(|| format!("failed to replace {}", path.display()))?;
        debug!("Saved {} to {}", key, path.display());
        Ok(())
    }
}

#[async_trait]
impl PortfolioStore for JsonFileStore {
    async fn load_wallets(&self) -> anyhow::Result<Vec<String>> {
        self.load(WALLETS_KEY).await
    }

    async fn save_wallets(&self, wallets: &[String]) -> anyhow::Result<()> {
        self.save(WALLETS_KEY, wallets).await
    }

    async fn load_selection(&self) -> anyhow::Result<Vec<String>> {
        self.load(SELECTION_KEY).await
    }

    async fn save_selection(&self, selected: &[String]) -> anyhow::Result<()> {
        self.save(SELECTION_KEY, selected).await
    }

    async fn load_custom_tokens(&self) -> anyhow::Result<CustomTokens> {
        self.load(CUSTOM_TOKENS_KEY).await
    }

    async fn save_custom_tokens(&self, tokens: &CustomTokens) -> anyhow::Result<()> {
        self.save(CUSTOM_TOKENS_KEY, tokens).await
    }
}
