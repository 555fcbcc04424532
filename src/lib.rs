//! Multichain Portfolio Library
//!
//! Values a set of EVM and Bitcoin wallets in USD. Token balances are read
//! with batched JSON-RPC calls, prices come from one batched oracle request,
//! and a scheduler keeps the valuation fresh on independent price and
//! balance cadences.

// Public modules - these are the API surface
pub mod config;
pub mod error;
pub mod handlers;
pub mod models;
pub mod providers;
pub mod tracker;
pub mod traits;
pub mod utils;

// Re-export commonly used items for easier access
pub use config::TrackerConfig;
pub use error::PortfolioError;
pub use models::{
    balance::{AssetKey, BalanceResult, CallOutcome, ContractCall},
    portfolio::{HoldingChange, PortfolioDiff, PortfolioSnapshot},
    price::PriceSnapshot,
    token::TokenDescriptor,
    wallet::{classify, AddressKind, WalletBook},
};
pub use traits::{
    BalanceProvider, BitcoinBalanceProvider, PortfolioEventHandler, PortfolioStore, PriceProvider,
    TokenDiscovery,
};
pub use providers::{
    CoinGeckoPriceProvider, EvmRpcBalanceProvider, JsonFileStore, MempoolBitcoinProvider, MemoryStore,
    MoralisTokenDiscovery,
};
pub use handlers::{CompositeEventHandler, ConsoleEventHandler};
pub use tracker::{
    AggregationInput, PortfolioAggregator, PortfolioTracker, RefreshKind, RefreshScheduler, SchedulerConfig,
    TokenRegistry, TrackerOptions,
};

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Result type alias for library functions
pub type Result<T> = std::result::Result<T, anyhow::Error>;
