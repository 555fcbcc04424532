//! Data providers for fetching balances, prices and token lists, plus stores

pub mod coingecko;
pub mod evm_rpc;
pub mod json_store;
pub mod mempool;
pub mod memory_store;
pub mod mock;
pub mod moralis;

// Re-export for convenience
pub use coingecko::CoinGeckoPriceProvider;
pub use evm_rpc::EvmRpcBalanceProvider;
pub use json_store::JsonFileStore;
pub use mempool::MempoolBitcoinProvider;
pub use memory_store::MemoryStore;
pub use mock::{StaticBalanceProvider, StaticBitcoinProvider, StaticPriceProvider};
pub use moralis::MoralisTokenDiscovery;
