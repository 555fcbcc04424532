//! Valuation, scheduling and the tracker facade

pub mod aggregator;
pub mod portfolio_tracker;
pub mod scheduler;
pub mod token_registry;

// Re-export for convenience
pub use aggregator::{AggregationInput, PortfolioAggregator};
pub use portfolio_tracker::{PortfolioTracker, TrackerOptions};
pub use scheduler::{RefreshKind, RefreshScheduler, SchedulerConfig};
pub use token_registry::{merge_tokens, TokenRegistry};
