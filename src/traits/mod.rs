//! Core traits for the portfolio tracker

pub mod balance_provider;
pub mod bitcoin_provider;
pub mod event_handler;
pub mod price_provider;
pub mod store;
pub mod token_discovery;

// Re-export for convenience
pub use balance_provider::BalanceProvider;
pub use bitcoin_provider::BitcoinBalanceProvider;
pub use event_handler::PortfolioEventHandler;
pub use price_provider::PriceProvider;
pub use store::{CustomTokens, PortfolioStore};
pub use token_discovery::TokenDiscovery;
