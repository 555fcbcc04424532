use std::sync::Arc;

use anyhow::Context;
use tracing::{error, info, warn};

use multichain_portfolio::models::token::chain_info;
use multichain_portfolio::traits::TokenDiscovery;
use multichain_portfolio::utils::format_usd;
use multichain_portfolio::{
    CoinGeckoPriceProvider, CompositeEventHandler, ConsoleEventHandler, EvmRpcBalanceProvider, JsonFileStore,
    MempoolBitcoinProvider, MoralisTokenDiscovery, PortfolioAggregator, PortfolioTracker, TrackerConfig,
    TrackerOptions, VERSION,
};

fn main() -> anyhow::Result<()> {
    let config = TrackerConfig::from_env();

    // Initialize logging
    tracing_subscriber::fmt()
        .with_level(true)
        .with_target(false)
        .with_max_level(config.log_level)
        .with_file(true)
        .with_line_number(true)
        .init();

    tokio::runtime::Runtime::new()?.block_on(run(config))
}

async fn run(config: TrackerConfig) -> anyhow::Result<()> {
    info!("Initializing multichain portfolio tracker v{}...", VERSION);
    info!(
        "Chain: {} ({})",
        chain_info(config.chain_id).name,
        config.chain_id
    );
    match config.rpc_urls.get(&config.chain_id) {
        Some(url) => info!("RPC URL: {}", url),
        None => warn!(
            "No RPC URL for chain {}; set EVM_RPC_URL to read EVM balances",
            config.chain_id
        ),
    }
    info!("Data directory: {}", config.data_dir.display());

    let balances = EvmRpcBalanceProvider::new(config.rpc_urls.clone(), config.http_timeout)
        .context("failed to create RPC provider")?;
    let prices = CoinGeckoPriceProvider::new(
        &config.coingecko_api_url,
        config.coingecko_api_key.clone(),
        config.http_timeout,
    )
    .context("failed to create price provider")?;
    let bitcoin = MempoolBitcoinProvider::new(&config.bitcoin_api_url, config.http_timeout)
        .context("failed to create bitcoin provider")?;

    let discovery: Option<Arc<dyn TokenDiscovery>> = match &config.moralis_api_key {
        Some(key) => {
            info!("Token discovery enabled");
            Some(Arc::new(
                MoralisTokenDiscovery::new(&config.moralis_api_url, key.clone(), config.http_timeout)
                    .context("failed to create discovery provider")?,
            ))
        }
        None => {
            warn!("Token discovery disabled. Set MORALIS_API_KEY in .env file to enable.");
            None
        }
    };

    let handler = CompositeEventHandler::new().with_handler(Arc::new(ConsoleEventHandler::new()));
    let aggregator = PortfolioAggregator::new(Arc::new(balances), Arc::new(prices), Arc::new(bitcoin));

    let tracker = PortfolioTracker::load(
        config.chain_id,
        aggregator,
        Arc::new(JsonFileStore::new(config.data_dir.clone())),
        Arc::new(handler),
        TrackerOptions {
            schedule: config.scheduler_config(),
            import_timeout: config.import_timeout,
            discovery,
        },
    )
    .await;

    for wallet in &config.wallets {
        if let Err(e) = tracker.on_wallet_connected(wallet).await {
            error!("Skipping configured wallet: {}", e);
        }
    }

    let book = tracker.wallets().await;
    if book.is_empty() {
        warn!("No wallets tracked. Set WALLETS in .env file to add some.");
    }

    tracker.start();
    info!("Portfolio tracker is running. Press Ctrl+C to stop.");

    // Keep the program running
    tokio::signal::ctrl_c().await?;

    info!("Shutting down...");
    tracker.shutdown().await;
    if let Some(snapshot) = tracker.latest() {
        info!(
            "Last valuation: {} across {} holding(s)",
            format_usd(&snapshot.total_usd),
            snapshot.holding_count()
        );
    }

    Ok(())
}
