//! Data models for the portfolio tracker

pub mod balance;
pub mod portfolio;
pub mod price;
pub mod token;
pub mod wallet;

// Re-export for convenience
pub use balance::{AssetKey, BalanceEntry, BalanceResult, BalanceSheet, CallOutcome, CallValue, ContractCall, ContractMethod};
pub use portfolio::{HoldingChange, HoldingKey, PortfolioDiff, PortfolioSnapshot};
pub use price::PriceSnapshot;
pub use token::{chain_info, default_tokens, ChainInfo, TokenDescriptor};
pub use wallet::{classify, AddressKind, Wallet, WalletBook};
