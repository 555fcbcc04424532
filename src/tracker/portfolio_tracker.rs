use std::sync::Arc;
use std::time::Duration;

use anyhow::bail;
use tokio::sync::{watch, Mutex};
use tracing::{debug, info, warn};

use crate::error::PortfolioError;
use crate::models::portfolio::PortfolioSnapshot;
use crate::models::token::{chain_info, TokenDescriptor};
use crate::models::wallet::{classify, AddressKind, WalletBook};
use crate::traits::{PortfolioEventHandler, PortfolioStore, TokenDiscovery};
use crate::tracker::aggregator::{AggregationInput, PortfolioAggregator};
use crate::tracker::scheduler::{RefreshScheduler, SchedulerConfig};
use crate::tracker::token_registry::TokenRegistry;

/// Optional knobs for [`PortfolioTracker::load`]
#[derive(Clone)]
pub struct TrackerOptions {
    pub schedule: SchedulerConfig,
    pub import_timeout: Duration,
    pub discovery: Option<Arc<dyn TokenDiscovery>>,
}

impl Default for TrackerOptions {
    fn default() -> Self {
        Self {
            schedule: SchedulerConfig::default(),
            import_timeout: Duration::from_secs(10),
            discovery: None,
        }
    }
}

struct TrackerState {
    chain_id: u64,
    book: WalletBook,
}

/// Main portfolio tracker.
///
/// Owns the wallet book and token registry, persists them on every change
/// and keeps the refresh scheduler's input in sync.
pub struct PortfolioTracker {
    state: Mutex<TrackerState>,
    registry: Arc<TokenRegistry>,
    aggregator: Arc<PortfolioAggregator>,
    store: Arc<dyn PortfolioStore>,
    discovery: Option<Arc<dyn TokenDiscovery>>,
    scheduler: RefreshScheduler,
}

impl PortfolioTracker {
    /// Restore persisted wallets, selection and custom tokens, then build the
    /// scheduler. Unreadable blobs are logged and start empty.
    pub async fn load(
        chain_id: u64,
        aggregator: PortfolioAggregator,
        store: Arc<dyn PortfolioStore>,
        handler: Arc<dyn PortfolioEventHandler>,
        options: TrackerOptions,
    ) -> Self {
        let wallets = store.load_wallets().await.unwrap_or_else(|e| {
            warn!("Failed to load wallets, starting empty: {:#}", e);
            Vec::new()
        });
        let selection = store.load_selection().await.unwrap_or_else(|e| {
            warn!("Failed to load wallet selection, starting empty: {:#}", e);
            Vec::new()
        });
        let custom = store.load_custom_tokens().await.unwrap_or_else(|e| {
            warn!("Failed to load custom tokens, starting empty: {:#}", e);
            Default::default()
        });

        let book = WalletBook::from_parts(wallets, selection);
        let registry = TokenRegistry::new().with_import_timeout(options.import_timeout);
        registry.load_custom(custom);

        info!(
            "Loaded {} wallet(s), {} selected, on {} (chain {})",
            book.len(),
            book.selection().len(),
            chain_info(chain_id).name,
            chain_id
        );

        let aggregator = Arc::new(aggregator);
        let input = AggregationInput::new(chain_id, book.selected_wallets(), &registry);
        let scheduler = RefreshScheduler::new(aggregator.clone(), input, handler, options.schedule);

        Self {
            state: Mutex::new(TrackerState { chain_id, book }),
            registry: Arc::new(registry),
            aggregator,
            store,
            discovery: options.discovery,
            scheduler,
        }
    }

    pub async fn chain_id(&self) -> u64 {
        self.state.lock().await.chain_id
    }

    /// Copy of the wallet list and selection
    pub async fn wallets(&self) -> WalletBook {
        self.state.lock().await.book.clone()
    }

    /// Tokens tracked on the active chain
    pub async fn tokens(&self) -> Vec<TokenDescriptor> {
        let chain_id = self.chain_id().await;
        self.registry.resolve(chain_id)
    }

    pub fn registry(&self) -> &TokenRegistry {
        &self.registry
    }

    pub fn scheduler(&self) -> &RefreshScheduler {
        &self.scheduler
    }

    /// Add a wallet; it starts selected. Returns false if it was already tracked.
    pub async fn add_wallet(&self, address: &str) -> Result<bool, PortfolioError> {
        let mut state = self.state.lock().await;
        if !state.book.add(address)? {
            debug!("Wallet {} already tracked", address.trim());
            return Ok(false);
        }
        info!("Added wallet {}", address.trim());
        self.persist_wallets(&state.book).await;
        self.republish(&state);
        Ok(true)
    }

    pub async fn remove_wallet(&self, address: &str) -> bool {
        let mut state = self.state.lock().await;
        if !state.book.remove(address) {
            return false;
        }
        info!("Removed wallet {}", address.trim());
        self.persist_wallets(&state.book).await;
        self.republish(&state);
        true
    }

    /// Flip a wallet's selection. Returns the new state, or None if unknown.
    pub async fn toggle_wallet(&self, address: &str) -> Option<bool> {
        let mut state = self.state.lock().await;
        let selected = state.book.toggle(address)?;
        debug!("Wallet {} selected: {}", address.trim(), selected);
        self.persist_wallets(&state.book).await;
        self.republish(&state);
        Some(selected)
    }

    pub async fn select_all(&self) {
        let mut state = self.state.lock().await;
        state.book.select_all();
        self.persist_wallets(&state.book).await;
        self.republish(&state);
    }

    /// A wallet connected through an external signer: track it and, when an
    /// indexer is configured, discover the tokens it holds
    pub async fn on_wallet_connected(&self, address: &str) -> Result<bool, PortfolioError> {
        let added = self.add_wallet(address).await?;
        if self.discovery.is_some() && classify(address.trim()) == AddressKind::Evm {
            if let Err(e) = self.discover_tokens(address.trim()).await {
                warn!("Token discovery for {} failed: {:#}", address.trim(), e);
            }
        }
        Ok(added)
    }

    /// Import an ERC-20 on the active chain by reading its metadata
    pub async fn import_token(&self, address: &str) -> Result<TokenDescriptor, PortfolioError> {
        let chain_id = self.chain_id().await;
        let before = self.registry.custom_tokens();
        let token = self
            .registry
            .import_token(self.aggregator.balance_provider().as_ref(), chain_id, address)
            .await?;

        if self.registry.custom_tokens() != before {
            self.persist_tokens().await;
            self.republish(&*self.state.lock().await);
        }
        Ok(token)
    }

    /// Drop a custom token from the active chain. Built-in tokens stay.
    pub async fn remove_custom_token(&self, address: &str) -> bool {
        let state = self.state.lock().await;
        if !self.registry.remove_custom(state.chain_id, address.trim()) {
            return false;
        }
        info!("Removed custom token {} on chain {}", address.trim(), state.chain_id);
        self.persist_tokens().await;
        self.republish(&state);
        true
    }

    /// Ask the indexer for tokens held by a wallet and track the new ones.
    /// Returns how many were added.
    pub async fn discover_tokens(&self, wallet: &str) -> anyhow::Result<usize> {
        let discovery = match &self.discovery {
            Some(discovery) => discovery.clone(),
            None => bail!("token discovery is not configured"),
        };
        let chain_id = self.chain_id().await;

        let found = discovery.discover(chain_id, wallet).await?;
        let added = found
            .into_iter()
            .filter(|token| token.chain_id == chain_id)
            .filter(|token| self.registry.register_custom(token.clone()))
            .count();

        if added > 0 {
            info!("Tracking {} newly discovered token(s) on chain {}", added, chain_id);
            self.persist_tokens().await;
            self.republish(&*self.state.lock().await);
        }
        Ok(added)
    }

    /// Switch the active chain and revalue
    pub async fn switch_chain(&self, chain_id: u64) {
        let mut state = self.state.lock().await;
        if state.chain_id == chain_id {
            return;
        }
        info!(
            "Switching from chain {} to {} ({})",
            state.chain_id,
            chain_id,
            chain_info(chain_id).name
        );
        state.chain_id = chain_id;
        self.republish(&state);
    }

    /// Spawn the periodic refreshes
    pub fn start(&self) {
        self.scheduler.start();
    }

    pub async fn shutdown(&self) {
        self.scheduler.shutdown().await;
    }

    pub async fn refresh_now(&self) -> Option<Arc<PortfolioSnapshot>> {
        self.scheduler.refresh_now().await
    }

    pub fn request_refresh(&self) -> bool {
        self.scheduler.request_refresh()
    }

    pub fn subscribe(&self) -> watch::Receiver<Option<Arc<PortfolioSnapshot>>> {
        self.scheduler.subscribe()
    }

    pub fn latest(&self) -> Option<Arc<PortfolioSnapshot>> {
        self.scheduler.latest()
    }

    fn republish(&self, state: &TrackerState) {
        let input = AggregationInput::new(state.chain_id, state.book.selected_wallets(), &self.registry);
        self.scheduler.set_input(input);
    }

    async fn persist_wallets(&self, book: &WalletBook) {
        if let Err(e) = self.store.save_wallets(book.wallets()).await {
            warn!("Failed to save wallets: {:#}", e);
        }
        if let Err(e) = self.store.save_selection(book.selection()).await {
            warn!("Failed to save wallet selection: {:#}", e);
        }
    }

    async fn persist_tokens(&self) {
        if let Err(e) = self.store.save_custom_tokens(&self.registry.custom_tokens()).await {
            warn!("Failed to save custom tokens: {:#}", e);
        }
    }
}
