use async_trait::async_trait;

use crate::error::PortfolioError;
use crate::models::portfolio::{PortfolioDiff, PortfolioSnapshot};

/// Handler for published portfolio snapshots
#[async_trait]
pub trait PortfolioEventHandler: Send + Sync {
    /// Called once per published snapshot with its diff against the previous one
    async fn handle_snapshot(&self, snapshot: &PortfolioSnapshot, diff: &PortfolioDiff);

    /// Called for degradations such as an unreachable provider
    async fn handle_error(&self, error: &PortfolioError);
}
